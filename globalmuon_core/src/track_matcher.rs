//! Standalone-to-tracker track matching.
//!
//! Both tracks are carried to the tracker boundary (the standalone muon from
//! its innermost state against its momentum, the tracker track from its
//! outermost state along it) and compared there with the [`StateComparator`].
//! Tracker tracks too soft to reach the muon system are rejected before any
//! propagation.

use globalmuon_env::{DetectorContext, PropagationDirection, Track, TrackState};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state_comparator::{Compatibility, StateComparator};

/// Configuration for the TrackMatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// χ² gate of the state comparison (default: 50)
    pub max_chi2: f64,

    /// Minimum tracker-track momentum (default: 2.5 GeV)
    pub min_p: f64,

    /// Minimum tracker-track transverse momentum (default: 1.0 GeV)
    pub min_pt: f64,

    /// Positional tolerance of the permissive fallback, in x and y (default: 5 cm)
    pub position_tolerance: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_chi2: 50.0,
            min_p: 2.5,
            min_pt: 1.0,
            position_tolerance: 5.0,
        }
    }
}

/// Why a pair was never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Rejection {
    #[error("tracker track below momentum threshold")]
    LowMomentum,

    #[error("no crossing with the tracker boundary")]
    NoCrossing,
}

/// Both states on the tracker boundary and their compatibility.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub compatibility: Compatibility,
    pub muon_state: TrackState,
    pub tracker_state: TrackState,
}

impl Comparison {
    /// Global position difference (muon minus tracker) on the boundary.
    pub fn position_delta(&self) -> Vector3<f64> {
        self.muon_state.global_position() - self.tracker_state.global_position()
    }

    /// Whether the two boundary positions agree within `tolerance` in x and y.
    pub fn positions_agree(&self, tolerance: f64) -> bool {
        let delta = self.position_delta();
        delta.x.abs() < tolerance && delta.y.abs() < tolerance
    }
}

#[derive(Debug, Clone)]
pub struct TrackMatcher {
    config: MatcherConfig,
    comparator: StateComparator,
}

impl Default for TrackMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl TrackMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        let comparator = StateComparator::new(config.max_chi2);
        Self { config, comparator }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Whether a tracker track is energetic enough to reach the muon system.
    pub fn passes_momentum_cut(&self, tracker: &Track) -> bool {
        tracker.p() >= self.config.min_p && tracker.pt() >= self.config.min_pt
    }

    fn muon_at_boundary<C>(&self, ctx: &C, muon: &Track) -> Option<TrackState>
    where
        C: DetectorContext + ?Sized,
    {
        ctx.propagate(
            &muon.innermost_state,
            &ctx.tracker_boundary(),
            PropagationDirection::OppositeToMomentum,
        )
    }

    fn tracker_at_boundary<C>(&self, ctx: &C, tracker: &Track) -> Option<TrackState>
    where
        C: DetectorContext + ?Sized,
    {
        ctx.propagate(
            &tracker.outermost_state,
            &ctx.tracker_boundary(),
            PropagationDirection::AlongMomentum,
        )
    }

    /// Compare a tracker track against an already propagated muon state.
    fn compare_at_boundary<C>(
        &self,
        ctx: &C,
        muon_state: &TrackState,
        tracker: &Track,
    ) -> Result<Comparison, Rejection>
    where
        C: DetectorContext + ?Sized,
    {
        if !self.passes_momentum_cut(tracker) {
            return Err(Rejection::LowMomentum);
        }
        let tracker_state = self
            .tracker_at_boundary(ctx, tracker)
            .ok_or(Rejection::NoCrossing)?;
        let compatibility = self.comparator.compare(muon_state, &tracker_state);
        if let Compatibility::Indeterminate(reason) = compatibility {
            debug!("Match with tracker track {} undetermined: {:?}", tracker.id, reason);
        }
        Ok(Comparison {
            compatibility,
            muon_state: muon_state.clone(),
            tracker_state,
        })
    }

    /// Compare one standalone muon with one tracker track.
    pub fn match_pair<C>(&self, ctx: &C, muon: &Track, tracker: &Track) -> Result<Comparison, Rejection>
    where
        C: DetectorContext + ?Sized,
    {
        if !self.passes_momentum_cut(tracker) {
            return Err(Rejection::LowMomentum);
        }
        let muon_state = self.muon_at_boundary(ctx, muon).ok_or(Rejection::NoCrossing)?;
        self.compare_at_boundary(ctx, &muon_state, tracker)
    }

    /// The candidate with the lowest χ² strictly below the gate.
    pub fn match_one<'a, C, T>(&self, ctx: &C, muon: &Track, candidates: &'a [T]) -> Option<(&'a T, f64)>
    where
        C: DetectorContext + ?Sized,
        T: AsRef<Track>,
    {
        if candidates.is_empty() {
            return None;
        }
        let muon_state = self.muon_at_boundary(ctx, muon)?;

        let mut best: Option<(&'a T, f64)> = None;
        let mut min_chi2 = self.config.max_chi2;
        for candidate in candidates {
            let Ok(comparison) = self.compare_at_boundary(ctx, &muon_state, candidate.as_ref()) else {
                continue;
            };
            if let Compatibility::Compatible(chi2) = comparison.compatibility {
                if chi2 < min_chi2 {
                    min_chi2 = chi2;
                    best = Some((candidate, chi2));
                }
            }
        }
        best
    }

    /// Every candidate passing the χ² gate, in input order.
    pub fn match_all<C, T>(&self, ctx: &C, muon: &Track, candidates: Vec<T>) -> Vec<T>
    where
        C: DetectorContext + ?Sized,
        T: AsRef<Track>,
    {
        self.filter_matches(ctx, muon, candidates, false)
    }

    /// Like [`match_all`](Self::match_all), but also accepts a candidate whose
    /// boundary position agrees with the muon's within the positional
    /// tolerance in x and y even when the χ² gate fails.
    pub fn match_with_position_fallback<C, T>(&self, ctx: &C, muon: &Track, candidates: Vec<T>) -> Vec<T>
    where
        C: DetectorContext + ?Sized,
        T: AsRef<Track>,
    {
        self.filter_matches(ctx, muon, candidates, true)
    }

    fn filter_matches<C, T>(&self, ctx: &C, muon: &Track, candidates: Vec<T>, fallback: bool) -> Vec<T>
    where
        C: DetectorContext + ?Sized,
        T: AsRef<Track>,
    {
        if candidates.is_empty() {
            return candidates;
        }
        let Some(muon_state) = self.muon_at_boundary(ctx, muon) else {
            debug!("Muon {} does not reach the tracker boundary", muon.id);
            return Vec::new();
        };

        candidates
            .into_iter()
            .filter(|candidate| {
                let Ok(comparison) = self.compare_at_boundary(ctx, &muon_state, candidate.as_ref()) else {
                    return false;
                };
                if comparison.compatibility.is_compatible() {
                    return true;
                }
                if fallback && comparison.positions_agree(self.config.position_tolerance) {
                    debug!(
                        "Tracker track {} accepted on position (chi2 gate: {:?})",
                        candidate.as_ref().id,
                        comparison.compatibility
                    );
                    return true;
                }
                false
            })
            .collect()
    }
}
