//! GlobalMuon Core - Standalone-to-Tracker Matching and Global Muon Fusion
//!
//! This library turns a standalone muon track (outer detector only) plus the
//! event's tracker tracks into fused global muon trajectories:
//! 1. **Shortlist**: a region of interest around the muon keeps tracker
//!    tracks worth propagating
//! 2. **Match**: both tracks are propagated to the tracker boundary and
//!    compared with a covariance-weighted χ²
//! 3. **Fuse**: matched tracker trajectories are refitted with muon hits
//!    under several hit-inclusion policies, and the best refit is chosen
//!
//! Geometry, propagation and fitting are consumed through the
//! [`globalmuon_env::DetectorContext`] traits.

pub mod candidate_builder;
pub mod config;
pub mod convert;
pub mod error;
pub mod event;
pub mod hit_selector;
pub mod muon_hits;
pub mod region;
pub mod state_comparator;
pub mod track_matcher;
pub mod trajectory_chooser;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use candidate_builder::{BuilderConfig, CandidateBuilder, MuonCandidate, MuonHitsOption, TrackCandidate};
pub use config::GlobalMuonConfig;
pub use convert::TrackConverter;
pub use error::{ConfigError, ReconstructionError};
pub use event::{EventInput, EventOutput, EventProcessor, MuonOutcome};
pub use hit_selector::{HitSelectionConfig, HitSelector};
pub use muon_hits::{CollectedMuonHits, MuonHitCollector, StationOccupancy};
pub use region::{RegionConfig, RegionOfInterest, RegionOfInterestSelector};
pub use state_comparator::{Compatibility, Degeneracy, StateComparator};
pub use track_matcher::{Comparison, MatcherConfig, Rejection, TrackMatcher};
pub use trajectory_chooser::{
    tail_probability, track_probability, ChooserConfig, RefitKind, RefitVariants, TrajectoryChooser,
};
