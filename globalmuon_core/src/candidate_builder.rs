//! The "BUILDER" Engine - Global Muon Candidate Construction
//!
//! For one standalone muon this runs the full pipeline:
//!
//! 1. Momentum gate on the standalone track
//! 2. Seed conversion (refit of the standalone track when it has no trajectory)
//! 3. Regional shortlist of tracker tracks (no propagation)
//! 4. Statistical matching at the tracker boundary
//! 5. Refits of every matched tracker trajectory with muon hits added,
//!    one per hit-inclusion policy
//! 6. Choice among the refits (combined mode only)
//!
//! Nothing survives a stage → empty result. Only a malformed standalone
//! track is an error. Refits that lose are dropped before returning.

use std::str::FromStr;
use std::sync::Arc;

use globalmuon_env::{DetectorContext, Hit, Measurement, Track, TrackState, Trajectory, TraversalDirection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GlobalMuonConfig;
use crate::convert::TrackConverter;
use crate::error::ReconstructionError;
use crate::hit_selector::HitSelector;
use crate::muon_hits::{order_inside_out, CollectedMuonHits, MuonHitCollector};
use crate::region::{RegionOfInterest, RegionOfInterestSelector};
use crate::track_matcher::TrackMatcher;
use crate::trajectory_chooser::{track_probability, RefitKind, RefitVariants, TrajectoryChooser};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Which muon hits are added to the tracker trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuonHitsOption {
    /// No refit; the tracker trajectory is the result
    TrackerOnly,
    /// Refit with every valid muon hit
    AllMuonHits,
    /// Refit with the hits of the first muon station only
    FirstMuonHits,
    /// Refit with hits surviving occupancy/quality selection
    SelectedMuonHits,
    /// All refits, then choose the best
    Combined,
}

impl MuonHitsOption {
    pub fn all() -> Vec<MuonHitsOption> {
        vec![
            MuonHitsOption::TrackerOnly,
            MuonHitsOption::AllMuonHits,
            MuonHitsOption::FirstMuonHits,
            MuonHitsOption::SelectedMuonHits,
            MuonHitsOption::Combined,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MuonHitsOption::TrackerOnly => "tracker_only",
            MuonHitsOption::AllMuonHits => "all_muon_hits",
            MuonHitsOption::FirstMuonHits => "first_muon_hits",
            MuonHitsOption::SelectedMuonHits => "selected_muon_hits",
            MuonHitsOption::Combined => "combined",
        }
    }

    fn wants(&self, kind: RefitKind) -> bool {
        use MuonHitsOption::*;
        match kind {
            RefitKind::TrackerOnly => matches!(self, TrackerOnly | Combined),
            // The selected-hits refit selects from the all-hits one
            RefitKind::AllMuonHits => matches!(self, AllMuonHits | SelectedMuonHits | Combined),
            RefitKind::FirstMuonHits => matches!(self, FirstMuonHits | Combined),
            RefitKind::SelectedMuonHits => matches!(self, SelectedMuonHits | Combined),
        }
    }

    /// The single refit this option emits, if it is not `Combined`.
    fn emitted_kind(&self) -> Option<RefitKind> {
        match self {
            MuonHitsOption::TrackerOnly => Some(RefitKind::TrackerOnly),
            MuonHitsOption::AllMuonHits => Some(RefitKind::AllMuonHits),
            MuonHitsOption::FirstMuonHits => Some(RefitKind::FirstMuonHits),
            MuonHitsOption::SelectedMuonHits => Some(RefitKind::SelectedMuonHits),
            MuonHitsOption::Combined => None,
        }
    }
}

impl FromStr for MuonHitsOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tracker_only" | "tracker" | "0" => Ok(MuonHitsOption::TrackerOnly),
            "all_muon_hits" | "all" | "1" => Ok(MuonHitsOption::AllMuonHits),
            "first_muon_hits" | "first" | "2" => Ok(MuonHitsOption::FirstMuonHits),
            "selected_muon_hits" | "selected" | "3" => Ok(MuonHitsOption::SelectedMuonHits),
            "combined" | "4" => Ok(MuonHitsOption::Combined),
            _ => Err(format!("Unknown muon hits option: {}", s)),
        }
    }
}

/// Configuration for the CandidateBuilder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Minimum pT of the standalone track, its innermost state and the
    /// tracker trajectories to refit (default: 1.0 GeV)
    pub pt_cut: f64,

    /// Minimum momentum of the standalone innermost state and the tracker
    /// trajectories to refit (default: 2.5 GeV)
    pub min_momentum: f64,

    /// Error inflation of the refit seed (default: 100)
    pub error_rescale: f64,

    /// Traversal direction of the refits (default: inside-out)
    pub direction: TraversalDirection,

    /// Hit-inclusion policy used by [`CandidateBuilder::build`] (default: all muon hits)
    pub hits_option: MuonHitsOption,

    /// Refit standalone tracks that come without a trajectory (default: true)
    pub convert: bool,

    /// Accept positional agreement when the χ² gate fails (default: true)
    pub position_fallback: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            pt_cut: 1.0,
            min_momentum: 2.5,
            error_rescale: 100.0,
            direction: TraversalDirection::InsideOut,
            hits_option: MuonHitsOption::AllMuonHits,
            convert: true,
            position_fallback: true,
        }
    }
}

// ============================================================================
// CANDIDATES
// ============================================================================

/// A track with an optional fitted trajectory.
///
/// The track is the identity; the trajectory can always be recreated from it.
#[derive(Debug, Clone)]
pub struct TrackCandidate {
    pub trajectory: Option<Trajectory>,
    pub track: Arc<Track>,
}

impl TrackCandidate {
    pub fn new(track: Arc<Track>) -> Self {
        Self { trajectory: None, track }
    }

    pub fn with_trajectory(track: Arc<Track>, trajectory: Trajectory) -> Self {
        Self {
            trajectory: Some(trajectory),
            track,
        }
    }
}

impl AsRef<Track> for TrackCandidate {
    fn as_ref(&self) -> &Track {
        &self.track
    }
}

/// A fused standalone + tracker trajectory.
#[derive(Debug, Clone)]
pub struct MuonCandidate {
    pub trajectory: Trajectory,
    pub muon_track: Arc<Track>,
    pub tracker_track: Arc<Track>,

    /// Refit policy that produced `trajectory`
    pub kind: RefitKind,
}

impl MuonCandidate {
    /// Tail probability of the fused fit.
    pub fn probability(&self) -> f64 {
        track_probability(&self.trajectory)
    }

    /// Number of valid muon-system hits in the fused trajectory.
    pub fn muon_hit_count(&self) -> usize {
        self.trajectory
            .measurements()
            .iter()
            .filter(|m| m.hit.valid && m.hit.is_muon())
            .count()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

fn innermost(trajectory: &Trajectory) -> &Measurement {
    match trajectory.direction() {
        TraversalDirection::InsideOut => trajectory.first_measurement(),
        TraversalDirection::OutsideIn => trajectory.last_measurement(),
    }
}

fn outermost(trajectory: &Trajectory) -> &Measurement {
    match trajectory.direction() {
        TraversalDirection::InsideOut => trajectory.last_measurement(),
        TraversalDirection::OutsideIn => trajectory.first_measurement(),
    }
}

/// Tracker part of the refits of one matched trajectory.
struct RefitInput {
    seed: TrackState,
    tracker_hits: Vec<Hit>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateBuilder {
    config: BuilderConfig,
    region: RegionOfInterestSelector,
    matcher: TrackMatcher,
    selector: HitSelector,
    chooser: TrajectoryChooser,
    converter: TrackConverter,
    collector: MuonHitCollector,
}

impl CandidateBuilder {
    pub fn new(config: &GlobalMuonConfig) -> Self {
        Self {
            config: config.builder.clone(),
            region: RegionOfInterestSelector::new(config.region.clone()),
            matcher: TrackMatcher::new(config.matcher.clone()),
            selector: HitSelector::new(config.hit_selection.clone()),
            chooser: TrajectoryChooser::new(config.chooser.clone()),
            converter: TrackConverter::new(config.builder.direction),
            collector: MuonHitCollector::new(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn matcher(&self) -> &TrackMatcher {
        &self.matcher
    }

    pub fn region_selector(&self) -> &RegionOfInterestSelector {
        &self.region
    }

    /// Build candidates with the configured hit-inclusion policy.
    pub fn build<C>(
        &self,
        ctx: &C,
        muon: &TrackCandidate,
        tracker_tracks: &[TrackCandidate],
    ) -> Result<Vec<MuonCandidate>, ReconstructionError>
    where
        C: DetectorContext + ?Sized,
    {
        self.build_candidates(ctx, muon, tracker_tracks, self.config.hits_option)
    }

    /// Build the global muon candidates of one standalone muon.
    pub fn build_candidates<C>(
        &self,
        ctx: &C,
        muon: &TrackCandidate,
        tracker_tracks: &[TrackCandidate],
        option: MuonHitsOption,
    ) -> Result<Vec<MuonCandidate>, ReconstructionError>
    where
        C: DetectorContext + ?Sized,
    {
        let track = &muon.track;
        if track.valid_hits().next().is_none() {
            return Err(ReconstructionError::EmptyTrack(track.id));
        }
        if !track.momentum.iter().all(|c| c.is_finite()) {
            return Err(ReconstructionError::InvalidMomentum(track.id));
        }

        if !self.passes_momentum_gate(track) {
            debug!("Muon {} below momentum threshold", track.id);
            return Ok(Vec::new());
        }

        let standalone = match &muon.trajectory {
            Some(trajectory) => Some(trajectory.clone()),
            None if self.config.convert => self.converter.convert(ctx, track)?,
            None => None,
        };

        let region = self.region.define(track)?;
        let regional = self.regional_tracker_tracks(ctx, &region, tracker_tracks);
        info!("Found {} tracks within region of interest", regional.len());
        if regional.is_empty() {
            return Ok(Vec::new());
        }

        let matched = if self.config.position_fallback {
            self.matcher.match_with_position_fallback(ctx, track, regional)
        } else {
            self.matcher.match_all(ctx, track, regional)
        };
        info!("Found {} matching tracker tracks within region of interest", matched.len());
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let muon_hits = standalone.as_ref().map_or_else(|| track.hits.clone(), Trajectory::hits);
        Ok(self.refit_matched(ctx, track, &muon_hits, matched, option))
    }

    /// Standalone track and its innermost state must be energetic enough.
    fn passes_momentum_gate(&self, muon: &Track) -> bool {
        let inner = muon.inner_momentum();
        muon.pt() >= self.config.pt_cut
            && inner.xy().norm() >= self.config.pt_cut
            && inner.norm() >= self.config.min_momentum
    }

    /// Tracker tracks inside the region, each with a trajectory when one can
    /// be obtained. Tracks outside the region are never touched.
    fn regional_tracker_tracks<C>(
        &self,
        ctx: &C,
        region: &RegionOfInterest,
        tracker_tracks: &[TrackCandidate],
    ) -> Vec<TrackCandidate>
    where
        C: DetectorContext + ?Sized,
    {
        tracker_tracks
            .iter()
            .filter(|candidate| region.contains(&candidate.track))
            .map(|candidate| match &candidate.trajectory {
                Some(_) => candidate.clone(),
                None => {
                    let trajectory = match self.converter.convert(ctx, &candidate.track) {
                        Ok(trajectory) => trajectory,
                        Err(err) => {
                            warn!("Skipping conversion of tracker track: {}", err);
                            None
                        }
                    };
                    TrackCandidate {
                        trajectory,
                        track: Arc::clone(&candidate.track),
                    }
                }
            })
            .collect()
    }

    fn refit_matched<C>(
        &self,
        ctx: &C,
        muon: &Arc<Track>,
        muon_hits: &[Hit],
        matched: Vec<TrackCandidate>,
        option: MuonHitsOption,
    ) -> Vec<MuonCandidate>
    where
        C: DetectorContext + ?Sized,
    {
        let with_trajectory = matched
            .into_iter()
            .filter_map(|candidate| candidate.trajectory.map(|traj| (traj, candidate.track)));

        if option == MuonHitsOption::TrackerOnly {
            return with_trajectory
                .map(|(trajectory, tracker_track)| MuonCandidate {
                    trajectory,
                    muon_track: Arc::clone(muon),
                    tracker_track,
                    kind: RefitKind::TrackerOnly,
                })
                .collect();
        }

        let collected = self.collector.collect(
            ctx,
            muon_hits,
            option.wants(RefitKind::SelectedMuonHits),
        );

        let mut result = Vec::new();
        for (trajectory, tracker_track) in with_trajectory {
            let momentum = outermost(&trajectory).state.global_momentum();
            if momentum.norm() < self.config.min_momentum || momentum.xy().norm() < self.config.pt_cut {
                debug!("Tracker track {} too soft to refit", tracker_track.id);
                continue;
            }

            let variants = self.refit_variants(ctx, trajectory, &collected, option);
            let chosen = match option.emitted_kind() {
                Some(kind) => {
                    let mut variants = variants;
                    variants.take(kind).map(|traj| (kind, traj))
                }
                None => self.chooser.choose_trajectory(variants),
            };

            if let Some((kind, trajectory)) = chosen {
                result.push(MuonCandidate {
                    trajectory,
                    muon_track: Arc::clone(muon),
                    tracker_track,
                    kind,
                });
            }
        }
        result
    }

    fn refit_input(&self, trajectory: &Trajectory) -> RefitInput {
        let mut tracker_hits = trajectory.hits();
        if trajectory.direction() == TraversalDirection::OutsideIn {
            tracker_hits.reverse();
        }
        let seed = match self.config.direction {
            TraversalDirection::InsideOut => &innermost(trajectory).state,
            TraversalDirection::OutsideIn => &outermost(trajectory).state,
        };
        RefitInput {
            seed: seed.rescaled_error(self.config.error_rescale),
            tracker_hits,
        }
    }

    /// Every refit the option asks for. The tracker trajectory itself fills
    /// the tracker-only slot.
    fn refit_variants<C>(
        &self,
        ctx: &C,
        trajectory: Trajectory,
        collected: &CollectedMuonHits,
        option: MuonHitsOption,
    ) -> RefitVariants
    where
        C: DetectorContext + ?Sized,
    {
        let input = self.refit_input(&trajectory);
        let mut variants = RefitVariants::new();

        if option.wants(RefitKind::AllMuonHits) {
            if let Some(traj) = self.refit(ctx, &input, &collected.all, RefitKind::AllMuonHits) {
                variants.set(RefitKind::AllMuonHits, traj);
            }
        }

        if option.wants(RefitKind::FirstMuonHits) {
            if let Some(traj) = self.refit(ctx, &input, &collected.first, RefitKind::FirstMuonHits) {
                variants.set(RefitKind::FirstMuonHits, traj);
            }
        }

        if option.wants(RefitKind::SelectedMuonHits) {
            let mut selected = variants
                .get(RefitKind::AllMuonHits)
                .map(|all| self.selector.select(all, &collected.occupancy))
                .unwrap_or_default();
            order_inside_out(&mut selected);
            if let Some(traj) = self.refit(ctx, &input, &selected, RefitKind::SelectedMuonHits) {
                variants.set(RefitKind::SelectedMuonHits, traj);
            }
        }

        if option.wants(RefitKind::TrackerOnly) {
            variants.set(RefitKind::TrackerOnly, trajectory);
        }
        variants
    }

    /// One refit of tracker + muon hits; anything but exactly one
    /// trajectory counts as no result.
    fn refit<C>(&self, ctx: &C, input: &RefitInput, muon_hits: &[Hit], kind: RefitKind) -> Option<Trajectory>
    where
        C: DetectorContext + ?Sized,
    {
        let mut hits = Vec::with_capacity(input.tracker_hits.len() + muon_hits.len());
        hits.extend_from_slice(&input.tracker_hits);
        hits.extend_from_slice(muon_hits);
        if self.config.direction == TraversalDirection::OutsideIn {
            hits.reverse();
        }
        debug!("Number of hits: {} ({:?})", hits.len(), kind);

        let mut fitted = ctx.refit(&input.seed, &hits, self.config.direction);
        match fitted.len() {
            1 => fitted.pop(),
            0 => None,
            n => {
                warn!("Refit {:?} returned {} trajectories, ignoring", kind, n);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{barrel_muon, barrel_tracker_track, muon_hit, MockDetector};
    use globalmuon_env::{HitId, Subsystem};
    use nalgebra::Vector3;

    fn builder() -> CandidateBuilder {
        CandidateBuilder::new(&GlobalMuonConfig::default())
    }

    fn candidate(track: Track) -> TrackCandidate {
        TrackCandidate::new(Arc::new(track))
    }

    #[test]
    fn test_coincident_pair_gives_one_tracker_only_candidate() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::TrackerOnly)
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].muon_track.id, muon.track.id);
        assert_eq!(result[0].tracker_track.id, trackers[0].track.id);
        assert_eq!(result[0].kind, RefitKind::TrackerOnly);
        assert_eq!(result[0].muon_hit_count(), 0);
    }

    #[test]
    fn test_displaced_tracker_track_is_still_matched() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let mut displaced = barrel_tracker_track(2, 5.0, 0.3, 0.0);
        displaced.reference_point.z = 17.0;
        let wide = barrel_tracker_track(3, 5.0, 1.0, 0.0);
        let trackers = vec![candidate(displaced), candidate(wide)];

        let builder = builder();
        let comparison = builder
            .matcher()
            .match_pair(&ctx, &muon.track, &trackers[0].track)
            .unwrap();
        assert!(comparison.compatibility.is_compatible());

        let result = builder
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::TrackerOnly)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tracker_track.id, trackers[0].track.id);
        // two for the pair check, then the muon and both regional tracks:
        // the Δφ = 0.7 track sits in the cone and is compared, not dropped
        assert_eq!(ctx.propagation_calls(), 2 + 1 + 2);
    }

    #[test]
    fn test_tracks_outside_region_are_never_propagated() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.0, 0.0));
        let trackers: Vec<_> = (0..10)
            .map(|i| candidate(barrel_tracker_track(10 + i, 5.0, 1.1 + 0.4 * i as f64, 0.0)))
            .collect();

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::Combined)
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(ctx.propagation_calls(), 0);
    }

    #[test]
    fn test_all_muon_hits_refit_merges_inside_out() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::AllMuonHits)
            .unwrap();

        assert_eq!(result.len(), 1);
        let traj = &result[0].trajectory;
        assert_eq!(result[0].kind, RefitKind::AllMuonHits);
        assert_eq!(traj.len(), 10);
        assert_eq!(result[0].muon_hit_count(), 4);
        let radii: Vec<f64> = traj.measurements().iter().map(|m| m.hit.distance_from_origin()).collect();
        assert!(radii.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_first_muon_hits_refit_uses_first_station() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::FirstMuonHits)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].muon_hit_count(), 1);
    }

    #[test]
    fn test_combined_prefers_selected_hits_in_crowded_station() {
        // Hit 101 is the station-2 hit of muon 1; give it a poor local fit and
        // a noisy neighbour so the station counts as crowded
        let bad_hit = barrel_muon(1, 5.0, 0.3, 0.0).hits[1].clone();
        let noise = muon_hit(999, Subsystem::Dt, 2, bad_hit.position + Vector3::new(0.0, 0.0, 4.0), 2);
        let ctx = MockDetector::new()
            .with_estimate(HitId(101), 60.0)
            .with_event_hits(vec![bad_hit, noise]);

        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::Combined)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].kind, RefitKind::SelectedMuonHits);
        assert!(result[0]
            .trajectory
            .measurements()
            .iter()
            .all(|m| m.hit.id != HitId(101)));
        assert_eq!(result[0].muon_hit_count(), 3);
    }

    #[test]
    fn test_combined_keeps_all_hits_when_quiet() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::Combined)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].kind, RefitKind::AllMuonHits);
    }

    #[test]
    fn test_low_momentum_muon_is_rejected_without_work() {
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 2.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::AllMuonHits)
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(ctx.refit_calls(), 0);
        assert_eq!(ctx.propagation_calls(), 0);
    }

    #[test]
    fn test_muon_without_hits_is_an_error() {
        let ctx = MockDetector::new();
        let mut track = barrel_muon(1, 5.0, 0.3, 0.0);
        track.hits.clear();
        let result = builder().build_candidates(&ctx, &candidate(track), &[], MuonHitsOption::AllMuonHits);
        assert!(matches!(result, Err(ReconstructionError::EmptyTrack(_))));
    }

    #[test]
    fn test_ambiguous_refit_is_dropped() {
        let ctx = MockDetector::new().with_refit_multiplicity(2);
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 5.0, 0.3, 0.0))];

        let result = builder()
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::AllMuonHits)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_soft_tracker_trajectory_skips_refits() {
        let mut config = GlobalMuonConfig::default();
        config.builder.min_momentum = 4.0;
        let builder = CandidateBuilder::new(&config);
        let ctx = MockDetector::new();
        let muon = candidate(barrel_muon(1, 5.0, 0.3, 0.0));
        let trackers = vec![candidate(barrel_tracker_track(2, 3.5, 0.3, 0.0))];

        let refitted = builder
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::AllMuonHits)
            .unwrap();
        assert!(refitted.is_empty());

        let tracker_only = builder
            .build_candidates(&ctx, &muon, &trackers, MuonHitsOption::TrackerOnly)
            .unwrap();
        assert_eq!(tracker_only.len(), 1);
    }

    #[test]
    fn test_muon_hits_option_parsing() {
        assert_eq!("combined".parse::<MuonHitsOption>(), Ok(MuonHitsOption::Combined));
        assert_eq!("1".parse::<MuonHitsOption>(), Ok(MuonHitsOption::AllMuonHits));
        assert!("bogus".parse::<MuonHitsOption>().is_err());
        for option in MuonHitsOption::all() {
            assert_eq!(option.name().parse::<MuonHitsOption>(), Ok(option));
        }
    }
}
