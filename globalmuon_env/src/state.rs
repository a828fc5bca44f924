//! Track states on reference surfaces.
//!
//! A state carries five local parameters and their 5×5 covariance:
//!
//! | index | parameter | meaning                                   |
//! |-------|-----------|-------------------------------------------|
//! | 0     | q/p       | signed curvature (charge over momentum)   |
//! | 1     | φ         | azimuth of the momentum direction         |
//! | 2     | θ         | polar angle of the momentum direction     |
//! | 3     | u         | `R·φ_pos` on a cylinder, `x` on a disk    |
//! | 4     | v         | `z` on a cylinder, `y` on a disk          |
//!
//! Global position and momentum are derived, never stored, so the two views
//! cannot drift apart.

use nalgebra::{Matrix5, Vector3, Vector5};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::types::{wrap_angle, Surface};

pub type StateVector = Vector5<f64>;
pub type StateCovariance = Matrix5<f64>;

pub const IDX_QOP: usize = 0;
pub const IDX_PHI: usize = 1;
pub const IDX_THETA: usize = 2;
pub const IDX_U: usize = 3;
pub const IDX_V: usize = 4;

/// Pseudorapidity of a vector.
pub fn pseudorapidity(v: &Vector3<f64>) -> f64 {
    let theta = v.xy().norm().atan2(v.z);
    -(theta / 2.0).tan().ln()
}

/// Azimuth of a vector in (-π, π].
pub fn azimuth(v: &Vector3<f64>) -> f64 {
    v.y.atan2(v.x)
}

/// Immutable track state on a reference surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrackState")]
pub struct TrackState {
    surface: Surface,
    parameters: StateVector,
    covariance: StateCovariance,
}

/// Unchecked wire form; deserialized states go through [`TrackState::new`].
#[derive(Deserialize)]
struct RawTrackState {
    surface: Surface,
    parameters: StateVector,
    covariance: StateCovariance,
}

impl TryFrom<RawTrackState> for TrackState {
    type Error = EnvError;

    fn try_from(raw: RawTrackState) -> Result<Self, Self::Error> {
        Self::new(raw.surface, raw.parameters, raw.covariance)
    }
}

impl TrackState {
    /// Build a state from local parameters.
    ///
    /// Fails when a parameter is non-finite or the curvature is zero
    /// (the momentum would be undefined).
    pub fn new(
        surface: Surface,
        parameters: StateVector,
        covariance: StateCovariance,
    ) -> Result<Self, EnvError> {
        if parameters.iter().any(|p| !p.is_finite()) {
            return Err(EnvError::invalid_state("non-finite parameter"));
        }
        if parameters[IDX_QOP] == 0.0 {
            return Err(EnvError::invalid_state("zero curvature"));
        }
        if covariance.iter().any(|c| !c.is_finite()) {
            return Err(EnvError::invalid_state("non-finite covariance"));
        }
        Ok(Self { surface, parameters, covariance })
    }

    /// Build a state from a global position and momentum on `surface`.
    ///
    /// The position is assumed to lie on the surface; only its azimuth and z
    /// (cylinder) or x/y (disk) are used.
    pub fn from_global(
        surface: Surface,
        position: Vector3<f64>,
        momentum: Vector3<f64>,
        charge: i8,
        covariance: StateCovariance,
    ) -> Result<Self, EnvError> {
        let p = momentum.norm();
        if p <= 0.0 || !p.is_finite() {
            return Err(EnvError::invalid_state("momentum must be positive and finite"));
        }
        if charge == 0 {
            return Err(EnvError::invalid_state("neutral tracks have no curvature"));
        }

        let (u, v) = match surface {
            Surface::Cylinder { radius } => (radius * azimuth(&position), position.z),
            Surface::Disk { .. } => (position.x, position.y),
        };
        let parameters = Vector5::new(
            f64::from(charge.signum()) / p,
            azimuth(&momentum),
            momentum.xy().norm().atan2(momentum.z),
            u,
            v,
        );
        Self::new(surface, parameters, covariance)
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn parameters(&self) -> &StateVector {
        &self.parameters
    }

    pub fn covariance(&self) -> &StateCovariance {
        &self.covariance
    }

    #[inline]
    pub fn q_over_p(&self) -> f64 {
        self.parameters[IDX_QOP]
    }

    #[inline]
    pub fn charge(&self) -> i8 {
        if self.q_over_p() < 0.0 { -1 } else { 1 }
    }

    /// Position on the surface in global coordinates.
    pub fn global_position(&self) -> Vector3<f64> {
        let u = self.parameters[IDX_U];
        let v = self.parameters[IDX_V];
        match self.surface {
            Surface::Cylinder { radius } => {
                let phi = u / radius;
                Vector3::new(radius * phi.cos(), radius * phi.sin(), v)
            }
            Surface::Disk { z } => Vector3::new(u, v, z),
        }
    }

    /// Unit vector along the momentum.
    pub fn direction(&self) -> Vector3<f64> {
        let phi = self.parameters[IDX_PHI];
        let theta = self.parameters[IDX_THETA];
        Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    }

    pub fn global_momentum(&self) -> Vector3<f64> {
        self.direction() * self.momentum_magnitude()
    }

    #[inline]
    pub fn momentum_magnitude(&self) -> f64 {
        1.0 / self.q_over_p().abs()
    }

    pub fn transverse_momentum(&self) -> f64 {
        self.momentum_magnitude() * self.parameters[IDX_THETA].sin()
    }

    pub fn eta(&self) -> f64 {
        -(self.parameters[IDX_THETA] / 2.0).tan().ln()
    }

    pub fn phi(&self) -> f64 {
        self.parameters[IDX_PHI]
    }

    /// Copy of this state with every error scaled by `factor`
    /// (covariance scaled by `factor²`).
    pub fn rescaled_error(&self, factor: f64) -> Self {
        Self {
            surface: self.surface,
            parameters: self.parameters,
            covariance: self.covariance * (factor * factor),
        }
    }

    /// Copy of this state with a different covariance.
    pub fn with_covariance(&self, covariance: StateCovariance) -> Self {
        Self {
            surface: self.surface,
            parameters: self.parameters,
            covariance,
        }
    }

    /// `self − other` in parameter space, with the periodic components
    /// (momentum azimuth, and `u` on a cylinder) wrapped to the short way round.
    pub fn parameter_difference(&self, other: &TrackState) -> StateVector {
        let mut diff = self.parameters - other.parameters;
        diff[IDX_PHI] = wrap_angle(diff[IDX_PHI]);
        if let Surface::Cylinder { radius } = self.surface {
            diff[IDX_U] = radius * wrap_angle(diff[IDX_U] / radius);
        }
        diff
    }
}
