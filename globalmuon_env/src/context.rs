//! Detector services consumed by the reconstruction engines.

use crate::state::TrackState;
use crate::track::Hit;
use crate::trajectory::Trajectory;
use crate::types::{DetectorId, LayerId, PropagationDirection, Surface, TraversalDirection};

/// Moves track states between reference surfaces.
pub trait Propagator {
    /// Propagates `state` to `target`.
    ///
    /// Returns `None` when no valid crossing exists in the requested
    /// direction. The returned covariance includes material effects.
    fn propagate(
        &self,
        state: &TrackState,
        target: &Surface,
        direction: PropagationDirection,
    ) -> Option<TrackState>;
}

/// Refits an ordered hit sequence starting from a seed state.
pub trait Refitter {
    /// Returns zero or more fitted trajectories.
    ///
    /// Zero means the fit did not converge. Callers expect at most one and
    /// treat a larger result as unexpected.
    fn refit(
        &self,
        seed: &TrackState,
        hits: &[Hit],
        direction: TraversalDirection,
    ) -> Vec<Trajectory>;
}

/// Layer topology plus the per-event measurements stored on each layer.
pub trait LayerNavigator {
    /// Layer holding the given detector element.
    fn layer_of(&self, detector: DetectorId) -> Option<LayerId>;

    /// All hits recorded on a layer in the current event.
    fn hits_on_layer(&self, layer: LayerId) -> Vec<Hit>;

    /// Layers reachable from `state` when moving in `direction`, nearest first.
    fn next_layers(&self, state: &TrackState, direction: PropagationDirection) -> Vec<LayerId>;
}

/// The read-only services of one processing unit (one event).
///
/// Implementations are shared by reference across concurrent invocations,
/// so everything here takes `&self` and must be `Send + Sync`.
///
/// # Implementations
///
/// - **Simulation**: `SimDetector` in `globalmuon_sim` (straight-line world)
/// - **Tests**: mock contexts counting propagation calls
pub trait DetectorContext: Propagator + Refitter + LayerNavigator + Send + Sync {
    /// Boundary between the inner tracker and the outer muon system,
    /// the common surface on which tracks are compared.
    fn tracker_boundary(&self) -> Surface;
}
