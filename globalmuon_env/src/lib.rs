//! GlobalMuon Environment Abstraction Layer
//!
//! This crate holds the event data model and the detector services that the
//! matching and building engines consume but do not implement:
//!
//! - **Propagation** between reference surfaces (`Propagator`)
//! - **Refitting** of ordered hit sequences (`Refitter`)
//! - **Navigation** and per-layer measurements (`LayerNavigator`)
//!
//! The three are bundled by [`DetectorContext`], which is passed explicitly to
//! every engine instead of living in global state. One context is immutable
//! for the lifetime of an event and can be shared across threads.
//!
//! # Example
//!
//! ```ignore
//! use globalmuon_env::{DetectorContext, PropagationDirection};
//!
//! fn at_boundary<Ctx: DetectorContext>(ctx: &Ctx, track: &Track) -> Option<TrackState> {
//!     ctx.propagate(
//!         &track.outermost_state,
//!         &ctx.tracker_boundary(),
//!         PropagationDirection::AlongMomentum,
//!     )
//! }
//! ```

mod context;
mod error;
mod state;
mod track;
mod trajectory;
mod types;

pub use context::{DetectorContext, LayerNavigator, Propagator, Refitter};
pub use error::EnvError;
pub use state::{
    azimuth, pseudorapidity, StateCovariance, StateVector, TrackState, IDX_PHI, IDX_QOP, IDX_THETA,
    IDX_U, IDX_V,
};
pub use track::{Hit, Track};
pub use trajectory::{Measurement, Trajectory, FIT_PARAMETERS};
pub use types::{
    wrap_angle, DetectorId, HitId, LayerId, PropagationDirection, Subsystem, Surface, TrackId,
    TraversalDirection,
};
