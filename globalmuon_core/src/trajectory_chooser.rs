//! Choice among competing refits of one muon/tracker pair.
//!
//! Up to four refits compete, each scored by the tail probability
//! `-ln P(χ², ndof)` of its fit (lower is better). The decision is a fixed,
//! ordered rule list:
//!
//! 1. all-hits refit if present
//! 2. selected-hits refit if the all-hits one is absent
//! 3. selected-hits refit if both exist and all-hits scores worse by more than 0.05
//! 4. tracker-only refit, immediately, if it and the first-hits refit differ by
//!    more than the probability cut
//! 5. first-hits refit if neither all-hits nor selected-hits exists
//! 6. first-hits refit if the better of all-hits/selected-hits scores worse
//!    than it by more than 3.5

use globalmuon_env::Trajectory;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::gamma::ln_gamma;
use tracing::debug;

/// Margin by which the all-hits refit must be worse before the
/// selected-hits refit replaces it
pub const SELECTED_HITS_MARGIN: f64 = 0.05;

/// Margin by which the best muon-hit refit must be worse before the
/// first-hits refit replaces it
pub const FIRST_HITS_MARGIN: f64 = 3.5;

/// Configuration for the TrajectoryChooser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChooserConfig {
    /// Tail-probability difference between tracker-only and first-hits refits
    /// above which the tracker-only refit wins outright (default: 30)
    pub prob_cut: f64,
}

impl Default for ChooserConfig {
    fn default() -> Self {
        Self { prob_cut: 30.0 }
    }
}

/// Hit-inclusion policy of a refit, one per chooser slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefitKind {
    TrackerOnly = 0,
    AllMuonHits = 1,
    FirstMuonHits = 2,
    SelectedMuonHits = 3,
}

impl RefitKind {
    pub const ALL: [RefitKind; 4] = [
        RefitKind::TrackerOnly,
        RefitKind::AllMuonHits,
        RefitKind::FirstMuonHits,
        RefitKind::SelectedMuonHits,
    ];

    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// The competing refits of one pair. Absent slots mean the refit was not
/// requested or did not converge.
#[derive(Debug, Clone, Default)]
pub struct RefitVariants {
    slots: [Option<Trajectory>; 4],
}

impl RefitVariants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: RefitKind) -> Option<&Trajectory> {
        self.slots[kind.slot()].as_ref()
    }

    pub fn set(&mut self, kind: RefitKind, trajectory: Trajectory) {
        self.slots[kind.slot()] = Some(trajectory);
    }

    pub fn take(&mut self, kind: RefitKind) -> Option<Trajectory> {
        self.slots[kind.slot()].take()
    }

    pub fn contains(&self, kind: RefitKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Tail probability of every slot, 0 for absent ones.
    pub fn probabilities(&self) -> [f64; 4] {
        let mut probs = [0.0; 4];
        for (prob, slot) in probs.iter_mut().zip(&self.slots) {
            if let Some(traj) = slot {
                *prob = track_probability(traj);
            }
        }
        probs
    }
}

/// `-ln P(χ² ≥ chi2 | ndof)`.
///
/// Zero degrees of freedom (or a non-positive χ²) score 0. When the survival
/// probability underflows, the leading term of its asymptotic expansion is
/// used so that the score keeps growing with χ².
pub fn tail_probability(chi2: f64, ndof: u32) -> f64 {
    if chi2.is_nan() || chi2 == f64::INFINITY {
        return f64::INFINITY;
    }
    if ndof == 0 || chi2 <= 0.0 {
        return 0.0;
    }
    let k = f64::from(ndof);
    let survival = ChiSquared::new(k).map(|dist| dist.sf(chi2)).unwrap_or(0.0);
    if survival > f64::MIN_POSITIVE {
        -survival.ln()
    } else {
        let a = k / 2.0;
        let x = chi2 / 2.0;
        -((a - 1.0) * x.ln() - x - ln_gamma(a))
    }
}

/// Tail probability of a fitted trajectory, with
/// `ndof = max(Σ valid hit dimensions − 5, 0)`.
pub fn track_probability(trajectory: &Trajectory) -> f64 {
    tail_probability(trajectory.chi_squared(), trajectory.ndof())
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryChooser {
    config: ChooserConfig,
}

impl TrajectoryChooser {
    pub fn new(config: ChooserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChooserConfig {
        &self.config
    }

    /// Apply the rule list; `None` when no rule selects a slot.
    pub fn choose(&self, variants: &RefitVariants) -> Option<RefitKind> {
        use RefitKind::*;

        let has = |kind| variants.contains(kind);
        let [prob0, prob1, prob2, prob3] = variants.probabilities();
        debug!("Probabilities: {:.3} {:.3} {:.3} {:.3}", prob0, prob1, prob2, prob3);

        let mut result = None;

        if has(AllMuonHits) {
            result = Some(AllMuonHits);
        }
        if !has(AllMuonHits) && has(SelectedMuonHits) {
            result = Some(SelectedMuonHits);
        }
        if has(AllMuonHits) && has(SelectedMuonHits) && prob1 - prob3 > SELECTED_HITS_MARGIN {
            result = Some(SelectedMuonHits);
        }

        if has(TrackerOnly) && has(FirstMuonHits) && (prob2 - prob0).abs() > self.config.prob_cut {
            debug!("Select tracker only: -ln(prob) = {:.3}", prob0);
            return Some(TrackerOnly);
        }

        if !has(AllMuonHits) && !has(SelectedMuonHits) && has(FirstMuonHits) {
            result = Some(FirstMuonHits);
        }

        let best_muon_prob = match (has(AllMuonHits), has(SelectedMuonHits)) {
            (true, true) => Some(if prob1 < prob3 { prob1 } else { prob3 }),
            (true, false) => Some(prob1),
            (false, true) => Some(prob3),
            (false, false) => None,
        };
        if let Some(prob_min) = best_muon_prob {
            if has(FirstMuonHits) && prob_min - prob2 > FIRST_HITS_MARGIN {
                result = Some(FirstMuonHits);
            }
        }

        result
    }

    /// Choose and take ownership of the winning refit. Every other variant
    /// is dropped with `variants`.
    pub fn choose_trajectory(&self, mut variants: RefitVariants) -> Option<(RefitKind, Trajectory)> {
        let kind = self.choose(&variants)?;
        variants.take(kind).map(|traj| (kind, traj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::trajectory_with_chi2;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn variants(slots: [Option<f64>; 4]) -> RefitVariants {
        let mut v = RefitVariants::new();
        for (kind, chi2) in RefitKind::ALL.iter().zip(slots) {
            if let Some(chi2) = chi2 {
                // five 2-D hits: ndof = 5
                v.set(*kind, trajectory_with_chi2(chi2, 5));
            }
        }
        v
    }

    #[test]
    fn test_all_slots_empty_gives_none() {
        let chooser = TrajectoryChooser::default();
        assert_eq!(chooser.choose(&RefitVariants::new()), None);
        assert!(chooser.choose_trajectory(RefitVariants::new()).is_none());
    }

    #[test]
    fn test_only_all_hits_slot() {
        let chooser = TrajectoryChooser::default();
        let v = variants([None, Some(5.0), None, None]);
        assert_eq!(chooser.choose(&v), Some(RefitKind::AllMuonHits));
    }

    #[test]
    fn test_selected_hits_win_when_clearly_better() {
        let chooser = TrajectoryChooser::default();
        let v = variants([None, Some(20.0), None, Some(5.0)]);
        let [_, p1, _, p3] = v.probabilities();
        assert!(p1 - p3 > SELECTED_HITS_MARGIN);
        assert_eq!(chooser.choose(&v), Some(RefitKind::SelectedMuonHits));
    }

    #[test]
    fn test_all_hits_kept_within_margin() {
        let chooser = TrajectoryChooser::default();
        let v = variants([None, Some(5.0), None, Some(5.0)]);
        assert_eq!(chooser.choose(&v), Some(RefitKind::AllMuonHits));
    }

    #[test]
    fn test_only_selected_slot() {
        let chooser = TrajectoryChooser::default();
        let v = variants([None, None, None, Some(5.0)]);
        assert_eq!(chooser.choose(&v), Some(RefitKind::SelectedMuonHits));
    }

    #[test]
    fn test_tracker_only_wins_on_large_degradation() {
        let chooser = TrajectoryChooser::default();
        let v = variants([Some(5.0), Some(5.0), Some(200.0), Some(5.0)]);
        assert_eq!(chooser.choose(&v), Some(RefitKind::TrackerOnly));
    }

    #[test]
    fn test_tracker_only_alone_gives_none() {
        let chooser = TrajectoryChooser::default();
        let v = variants([Some(5.0), None, None, None]);
        assert_eq!(chooser.choose(&v), None);
    }

    #[test]
    fn test_first_hits_fallback_and_margin() {
        let chooser = TrajectoryChooser::default();
        let only_first = variants([Some(5.0), None, Some(6.0), None]);
        assert_eq!(chooser.choose(&only_first), Some(RefitKind::FirstMuonHits));

        let degraded = variants([None, Some(40.0), Some(5.0), None]);
        assert_eq!(chooser.choose(&degraded), Some(RefitKind::FirstMuonHits));

        let close = variants([None, Some(6.0), Some(5.0), None]);
        assert_eq!(chooser.choose(&close), Some(RefitKind::AllMuonHits));
    }

    #[test]
    fn test_choose_trajectory_returns_winner() {
        let chooser = TrajectoryChooser::default();
        let v = variants([None, Some(20.0), None, Some(5.0)]);
        let (kind, traj) = chooser.choose_trajectory(v).unwrap();
        assert_eq!(kind, RefitKind::SelectedMuonHits);
        assert_relative_eq!(traj.chi_squared(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_probability_monotone_in_chi2() {
        let p1 = tail_probability(1.0, 5);
        let p10 = tail_probability(10.0, 5);
        let p100 = tail_probability(100.0, 5);
        assert!(p1 <= p10);
        assert!(p10 <= p100);
        assert!(p1 >= 0.0);
    }

    #[test]
    fn test_probability_known_value() {
        // P(χ² ≥ 2 | 2 dof) = e^-1
        assert_relative_eq!(tail_probability(2.0, 2), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_probability_edge_cases() {
        assert_eq!(tail_probability(10.0, 0), 0.0);
        assert_eq!(tail_probability(0.0, 4), 0.0);
        assert!(tail_probability(1e5, 4).is_finite());
        assert!(tail_probability(1e5, 4) > tail_probability(1e3, 4));
        assert_eq!(tail_probability(f64::NAN, 4), f64::INFINITY);
    }

    #[test]
    fn test_track_probability_uses_valid_dimensions() {
        let traj = trajectory_with_chi2(2.0, 3);
        // 3 hits × 2 − 5 = 1 dof
        assert_relative_eq!(track_probability(&traj), tail_probability(2.0, 1));
    }

    proptest! {
        #[test]
        fn prop_probability_non_decreasing(a in 0.0f64..500.0, b in 0.0f64..500.0, ndof in 1u32..40) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(tail_probability(lo, ndof) <= tail_probability(hi, ndof) + 1e-9);
        }
    }
}
