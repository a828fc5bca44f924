//! Conversion of stored tracks into fitted trajectories.

use globalmuon_env::{DetectorContext, Hit, Track, Trajectory, TraversalDirection};
use tracing::{debug, warn};

use crate::error::ReconstructionError;

/// Refits a track's own hits to recover a [`Trajectory`] when only the
/// stored track is available.
#[derive(Debug, Clone, Copy)]
pub struct TrackConverter {
    direction: TraversalDirection,
}

impl Default for TrackConverter {
    fn default() -> Self {
        Self::new(TraversalDirection::InsideOut)
    }
}

impl TrackConverter {
    pub fn new(direction: TraversalDirection) -> Self {
        Self { direction }
    }

    /// Refit the track's valid hits.
    ///
    /// Inside-out conversions start from the innermost state, outside-in
    /// ones from the outermost state with the hit order reversed. Returns
    /// `Ok(None)` when the refit does not converge.
    pub fn convert<C>(&self, ctx: &C, track: &Track) -> Result<Option<Trajectory>, ReconstructionError>
    where
        C: DetectorContext + ?Sized,
    {
        let mut hits: Vec<Hit> = track.valid_hits().cloned().collect();
        if hits.is_empty() {
            return Err(ReconstructionError::EmptyTrack(track.id));
        }

        let seed = match self.direction {
            TraversalDirection::InsideOut => &track.innermost_state,
            TraversalDirection::OutsideIn => {
                hits.reverse();
                &track.outermost_state
            }
        };

        let mut fitted = ctx.refit(seed, &hits, self.direction);
        if fitted.len() > 1 {
            warn!("Conversion of track {} produced {} trajectories, keeping the first", track.id, fitted.len());
        }
        if fitted.is_empty() {
            debug!("Conversion of track {} did not converge", track.id);
            return Ok(None);
        }
        Ok(Some(fitted.swap_remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{barrel_tracker_track, MockDetector};

    #[test]
    fn test_inside_out_conversion_keeps_hit_order() {
        let ctx = MockDetector::new();
        let track = barrel_tracker_track(1, 5.0, 0.2, 0.0);
        let traj = TrackConverter::default().convert(&ctx, &track).unwrap().unwrap();

        assert_eq!(traj.len(), track.hits.len());
        assert_eq!(traj.first_measurement().hit.id, track.hits[0].id);
        assert_eq!(traj.direction(), TraversalDirection::InsideOut);
    }

    #[test]
    fn test_outside_in_conversion_reverses_hits() {
        let ctx = MockDetector::new();
        let track = barrel_tracker_track(1, 5.0, 0.2, 0.0);
        let traj = TrackConverter::new(TraversalDirection::OutsideIn)
            .convert(&ctx, &track)
            .unwrap()
            .unwrap();
        assert_eq!(traj.first_measurement().hit.id, track.hits.last().unwrap().id);
    }

    #[test]
    fn test_non_converging_refit_is_not_an_error() {
        let ctx = MockDetector::new().with_refit_multiplicity(0);
        let track = barrel_tracker_track(1, 5.0, 0.2, 0.0);
        assert!(TrackConverter::default().convert(&ctx, &track).unwrap().is_none());
    }

    #[test]
    fn test_track_without_hits_is_an_error() {
        let ctx = MockDetector::new();
        let mut track = barrel_tracker_track(1, 5.0, 0.2, 0.0);
        track.hits.clear();
        assert!(TrackConverter::default().convert(&ctx, &track).is_err());
    }
}
