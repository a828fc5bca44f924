//! Selection of trustworthy muon hits from a fitted trajectory.
//!
//! A hit in a crowded station (occupancy above threshold) is only kept if it
//! still fits the trajectory well locally; any hit whose reduced χ² exceeds
//! the global ceiling is dropped regardless of occupancy.

use globalmuon_env::{Hit, Subsystem, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::muon_hits::StationOccupancy;

/// Configuration for the HitSelector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HitSelectionConfig {
    /// Station occupancy above which hits must pass the χ² cut (default: 1)
    pub hit_threshold: u32,

    /// Reduced χ² cut for drift-tube hits in crowded stations (default: 10)
    pub dt_chi2_cut: f64,

    /// Reduced χ² cut for cathode-strip hits in crowded stations (default: 150)
    pub csc_chi2_cut: f64,

    /// Reduced χ² cut for resistive-plate hits in crowded stations (default: 1)
    pub rpc_chi2_cut: f64,

    /// Absolute reduced χ² ceiling for every hit (default: 200)
    pub global_chi2_cut: f64,
}

impl Default for HitSelectionConfig {
    fn default() -> Self {
        Self {
            hit_threshold: 1,
            dt_chi2_cut: 10.0,
            csc_chi2_cut: 150.0,
            rpc_chi2_cut: 1.0,
            global_chi2_cut: 200.0,
        }
    }
}

impl HitSelectionConfig {
    /// Reduced χ² cut for a muon subsystem.
    pub fn chi2_cut(&self, subsystem: Subsystem) -> Option<f64> {
        match subsystem {
            Subsystem::Dt => Some(self.dt_chi2_cut),
            Subsystem::Csc => Some(self.csc_chi2_cut),
            Subsystem::Rpc => Some(self.rpc_chi2_cut),
            Subsystem::Tracker => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HitSelector {
    config: HitSelectionConfig,
}

impl HitSelector {
    pub fn new(config: HitSelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HitSelectionConfig {
        &self.config
    }

    /// Whether a muon hit with the given reduced χ² survives.
    pub fn accepts(&self, subsystem: Subsystem, station: u8, chi2_ndf: f64, occupancy: &StationOccupancy) -> bool {
        let Some(chi2_cut) = self.config.chi2_cut(subsystem) else {
            return false;
        };
        let keep = !occupancy.exceeds(station, self.config.hit_threshold);
        (keep || chi2_ndf < chi2_cut) && chi2_ndf < self.config.global_chi2_cut
    }

    /// Muon hits of `trajectory` that survive selection, in reverse
    /// traversal order.
    pub fn select(&self, trajectory: &Trajectory, occupancy: &StationOccupancy) -> Vec<Hit> {
        let mut selected: Vec<Hit> = trajectory
            .measurements()
            .iter()
            .filter(|m| m.hit.valid && m.hit.is_muon())
            .filter(|m| {
                let detector = m.hit.detector;
                let chi2_ndf = m.reduced_chi2();
                let accepted = self.accepts(detector.subsystem, detector.station, chi2_ndf, occupancy);
                if !accepted {
                    debug!(
                        "Skip hit: {:?} station {}, chi2/ndf {:.2} (occupancy {:?})",
                        detector.subsystem,
                        detector.station,
                        chi2_ndf,
                        occupancy.get(detector.station)
                    );
                }
                accepted
            })
            .map(|m| m.hit.clone())
            .collect();

        selected.reverse();
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{muon_hit, trajectory_with};
    use globalmuon_env::{DetectorId, HitId, TraversalDirection};
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn at(r: f64) -> Vector3<f64> {
        Vector3::new(r, 0.0, 0.0)
    }

    #[test]
    fn test_quiet_stations_keep_everything_below_ceiling() {
        let traj = trajectory_with(
            vec![
                (muon_hit(1, Subsystem::Dt, 1, at(420.0), 2), 60.0),
                (muon_hit(2, Subsystem::Dt, 2, at(500.0), 2), 500.0),
                (muon_hit(3, Subsystem::Rpc, 2, at(520.0), 1), 3.0),
            ],
            TraversalDirection::InsideOut,
        );
        let selected = HitSelector::default().select(&traj, &StationOccupancy::default());
        // reduced χ² 30, 250 (over the ceiling), 3
        let ids: Vec<_> = selected.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![HitId(3), HitId(1)]);
    }

    #[test]
    fn test_crowded_station_needs_good_local_fit() {
        let traj = trajectory_with(
            vec![
                (muon_hit(1, Subsystem::Dt, 1, at(420.0), 2), 8.0),
                (muon_hit(2, Subsystem::Dt, 1, at(425.0), 2), 30.0),
                (muon_hit(3, Subsystem::Dt, 2, at(500.0), 2), 30.0),
            ],
            TraversalDirection::InsideOut,
        );
        let occupancy = StationOccupancy::new([3, 1, 0, 0]);
        let selected = HitSelector::default().select(&traj, &occupancy);
        // station 1 is crowded: chi2/ndf 4 passes the DT cut of 10, 15 does not
        let ids: Vec<_> = selected.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![HitId(3), HitId(1)]);
    }

    #[test]
    fn test_subsystem_specific_cuts() {
        let selector = HitSelector::default();
        let crowded = StationOccupancy::new([5, 5, 5, 5]);
        assert!(selector.accepts(Subsystem::Csc, 1, 100.0, &crowded));
        assert!(!selector.accepts(Subsystem::Dt, 1, 100.0, &crowded));
        assert!(!selector.accepts(Subsystem::Rpc, 1, 1.5, &crowded));
        assert!(selector.accepts(Subsystem::Rpc, 1, 0.5, &crowded));
        assert!(!selector.accepts(Subsystem::Csc, 1, 199.0, &crowded));
    }

    #[test]
    fn test_tracker_and_invalid_hits_are_skipped() {
        let mut invalid = muon_hit(2, Subsystem::Dt, 1, at(420.0), 2);
        invalid.valid = false;
        let traj = trajectory_with(
            vec![
                (Hit::new(HitId(1), DetectorId::tracker(5), at(100.0), 0.01, 2), 0.1),
                (invalid, 0.0),
                (muon_hit(3, Subsystem::Dt, 2, at(500.0), 2), 1.0),
            ],
            TraversalDirection::InsideOut,
        );
        let selected = HitSelector::default().select(&traj, &StationOccupancy::default());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, HitId(3));
    }

    fn subsystem_strategy() -> impl Strategy<Value = Subsystem> {
        prop_oneof![Just(Subsystem::Dt), Just(Subsystem::Csc), Just(Subsystem::Rpc)]
    }

    proptest! {
        #[test]
        fn prop_selection_is_subset_obeying_cuts(
            hits in prop::collection::vec(
                (subsystem_strategy(), 1u8..=4, 1u8..=2, 0.0f64..400.0),
                1..12,
            ),
            counts in prop::array::uniform4(0u32..4),
        ) {
            let input: Vec<(Hit, f64)> = hits
                .iter()
                .enumerate()
                .map(|(i, (subsystem, station, dim, estimate))| {
                    let r = 400.0 + 10.0 * i as f64;
                    (muon_hit(i as u64, *subsystem, *station, at(r), *dim), *estimate)
                })
                .collect();
            let traj = trajectory_with(input, TraversalDirection::InsideOut);
            let occupancy = StationOccupancy::new(counts);
            let selector = HitSelector::default();
            let config = selector.config().clone();

            let selected = selector.select(&traj, &occupancy);
            prop_assert!(selected.len() <= traj.len());

            for hit in &selected {
                let measurement = traj
                    .measurements()
                    .iter()
                    .find(|m| m.hit.id == hit.id)
                    .expect("selected hit comes from the trajectory");
                let chi2_ndf = measurement.reduced_chi2();
                let cut = config.chi2_cut(hit.detector.subsystem).unwrap();
                let quiet = occupancy.get(hit.detector.station).unwrap() <= config.hit_threshold;
                prop_assert!(chi2_ndf < cut || quiet);
                prop_assert!(chi2_ndf < config.global_chi2_cut);
            }

            // reverse traversal order
            let positions: Vec<usize> = selected
                .iter()
                .map(|h| traj.measurements().iter().position(|m| m.hit.id == h.id).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
