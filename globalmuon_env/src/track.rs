//! Measurements and reconstructed tracks.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::state::{azimuth, pseudorapidity, TrackState};
use crate::types::{DetectorId, HitId, TrackId};

/// A single position measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: HitId,

    /// Detector element that produced the measurement
    pub detector: DetectorId,

    /// Global position in cm
    pub position: Vector3<f64>,

    /// Position resolution in cm (per measured coordinate)
    pub sigma: f64,

    /// Number of measured coordinates (1 or 2)
    pub dimension: u8,

    /// Invalid hits mark a crossed element without a usable measurement
    pub valid: bool,
}

impl Hit {
    pub fn new(id: HitId, detector: DetectorId, position: Vector3<f64>, sigma: f64, dimension: u8) -> Self {
        Self {
            id,
            detector,
            position,
            sigma,
            dimension,
            valid: true,
        }
    }

    /// Placeholder for a crossed element without a measurement.
    pub fn invalid(id: HitId, detector: DetectorId, position: Vector3<f64>) -> Self {
        Self {
            id,
            detector,
            position,
            sigma: 0.0,
            dimension: 0,
            valid: false,
        }
    }

    pub fn is_muon(&self) -> bool {
        self.detector.is_muon()
    }

    /// Distance from the nominal interaction point.
    #[inline]
    pub fn distance_from_origin(&self) -> f64 {
        self.position.norm()
    }
}

/// A reconstructed track as stored in the event.
///
/// Tracks are shared read-only (behind `Arc`) between the event collection
/// and every candidate referring to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    pub charge: i8,

    /// Point of closest approach to the beam line (cm)
    pub reference_point: Vector3<f64>,

    /// Momentum at the reference point (GeV)
    pub momentum: Vector3<f64>,

    /// State at the innermost measurement
    pub innermost_state: TrackState,

    /// State at the outermost measurement
    pub outermost_state: TrackState,

    /// Hits in inside-out order
    pub hits: Vec<Hit>,

    pub chi2: f64,

    pub ndof: u32,
}

impl Track {
    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }

    pub fn pt(&self) -> f64 {
        self.momentum.xy().norm()
    }

    pub fn eta(&self) -> f64 {
        pseudorapidity(&self.momentum)
    }

    pub fn phi(&self) -> f64 {
        azimuth(&self.momentum)
    }

    /// Momentum at the innermost measurement.
    pub fn inner_momentum(&self) -> Vector3<f64> {
        self.innermost_state.global_momentum()
    }

    pub fn valid_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|h| h.valid)
    }
}

impl AsRef<Track> for Track {
    fn as_ref(&self) -> &Track {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCovariance;
    use crate::types::{Subsystem, Surface};
    use approx::assert_relative_eq;

    #[test]
    fn test_track_kinematics() {
        let momentum = Vector3::new(3.0, 0.0, 4.0);
        let state = TrackState::from_global(
            Surface::Cylinder { radius: 10.0 },
            Vector3::new(10.0, 0.0, 13.3),
            momentum,
            1,
            StateCovariance::identity(),
        )
        .unwrap();
        let track = Track {
            id: TrackId::from_seed(1),
            charge: 1,
            reference_point: Vector3::zeros(),
            momentum,
            innermost_state: state.clone(),
            outermost_state: state,
            hits: vec![
                Hit::new(HitId(0), DetectorId::tracker(1), Vector3::new(10.0, 0.0, 13.3), 0.01, 2),
                Hit::invalid(HitId(1), DetectorId::new(Subsystem::Dt, 1, 0), Vector3::zeros()),
            ],
            chi2: 0.0,
            ndof: 0,
        };
        assert_relative_eq!(track.p(), 5.0);
        assert_relative_eq!(track.pt(), 3.0);
        assert_relative_eq!(track.phi(), 0.0);
        assert_relative_eq!(track.inner_momentum().norm(), 5.0, epsilon = 1e-12);
        assert_eq!(track.valid_hits().count(), 1);
    }
}
