//! Fitted trajectories.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::state::TrackState;
use crate::track::Hit;
use crate::types::TraversalDirection;

/// Number of parameters of a helix fit.
pub const FIT_PARAMETERS: u32 = 5;

/// One (state, hit) pair of a fitted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Updated state at the hit
    pub state: TrackState,

    pub hit: Hit,

    /// χ² contribution of this hit to the fit
    pub estimate: f64,
}

impl Measurement {
    pub fn new(state: TrackState, hit: Hit, estimate: f64) -> Self {
        Self { state, hit, estimate }
    }

    /// Local χ² per measured coordinate.
    pub fn reduced_chi2(&self) -> f64 {
        self.estimate / f64::from(self.hit.dimension.max(1))
    }
}

/// An ordered, immutable sequence of measurements with its fit quality.
///
/// Refits produce new trajectories; a trajectory is never modified in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    measurements: Vec<Measurement>,
    chi2: f64,
    direction: TraversalDirection,
}

#[derive(Deserialize)]
struct RawTrajectory {
    measurements: Vec<Measurement>,
    chi2: f64,
    direction: TraversalDirection,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = EnvError;

    fn try_from(raw: RawTrajectory) -> Result<Self, Self::Error> {
        Self::new(raw.measurements, raw.chi2, raw.direction)
    }
}

impl Trajectory {
    pub fn new(
        measurements: Vec<Measurement>,
        chi2: f64,
        direction: TraversalDirection,
    ) -> Result<Self, EnvError> {
        if measurements.is_empty() {
            return Err(EnvError::EmptyTrajectory);
        }
        Ok(Self { measurements, chi2, direction })
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// First measurement in traversal order.
    pub fn first_measurement(&self) -> &Measurement {
        // non-empty by construction
        &self.measurements[0]
    }

    /// Last measurement in traversal order.
    pub fn last_measurement(&self) -> &Measurement {
        &self.measurements[self.measurements.len() - 1]
    }

    pub fn chi_squared(&self) -> f64 {
        self.chi2
    }

    pub fn direction(&self) -> TraversalDirection {
        self.direction
    }

    /// Hits in traversal order, including invalid ones.
    pub fn hits(&self) -> Vec<Hit> {
        self.measurements.iter().map(|m| m.hit.clone()).collect()
    }

    /// Sum of the dimensions of all valid hits.
    pub fn valid_dimension_sum(&self) -> u32 {
        self.measurements
            .iter()
            .filter(|m| m.hit.valid)
            .map(|m| u32::from(m.hit.dimension))
            .sum()
    }

    /// Degrees of freedom of the fit.
    pub fn ndof(&self) -> u32 {
        self.valid_dimension_sum().saturating_sub(FIT_PARAMETERS)
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
