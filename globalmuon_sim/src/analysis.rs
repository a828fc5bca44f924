//! Matching diagnostics: χ² distributions of true and fake muon/tracker
//! pairs, used to tune the matcher gate.

use globalmuon_core::TrackMatcher;
use globalmuon_env::DetectorContext;
use serde::Serialize;

use crate::oracle::SimEvent;

const HISTOGRAM_BINS: usize = 25;

/// Fixed-width histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,

    /// Entries outside the edges
    pub overflow: u64,
}

impl Histogram {
    /// `bins` equal bins on `[low, high)`.
    pub fn new(low: f64, high: f64, bins: usize) -> Self {
        let bins = bins.max(1);
        let width = (high - low) / bins as f64;
        Self {
            edges: (0..=bins).map(|i| low + width * i as f64).collect(),
            counts: vec![0; bins],
            overflow: 0,
        }
    }

    pub fn fill(&mut self, value: f64) {
        let bin = self.edges.windows(2).position(|w| value >= w[0] && value < w[1]);
        match bin {
            Some(i) => self.counts[i] += 1,
            None => self.overflow += 1,
        }
    }

    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.overflow
    }
}

/// Match statistics accumulated over events.
#[derive(Debug, Clone, Serialize)]
pub struct MatchAnalysis {
    /// Standalone muons looked at
    pub muons: usize,

    /// Muons whose best match is their own tracker track
    pub best_correct: usize,

    /// Muons with no candidate under the gate
    pub unmatched: usize,

    /// True pairs that failed the χ² gate
    pub true_rejected: usize,

    /// Fake pairs that passed the χ² gate
    pub fake_accepted: usize,

    /// Pairs whose comparison was undetermined
    pub indeterminate: usize,

    pub true_chi2: Histogram,
    pub fake_chi2: Histogram,
}

impl MatchAnalysis {
    /// Histograms span twice the χ² gate.
    pub fn new(max_chi2: f64) -> Self {
        let high = 2.0 * max_chi2;
        Self {
            muons: 0,
            best_correct: 0,
            unmatched: 0,
            true_rejected: 0,
            fake_accepted: 0,
            indeterminate: 0,
            true_chi2: Histogram::new(0.0, high, HISTOGRAM_BINS),
            fake_chi2: Histogram::new(0.0, high, HISTOGRAM_BINS),
        }
    }

    /// Compare every muon of the event with every tracker track.
    pub fn record_event<C>(&mut self, matcher: &TrackMatcher, ctx: &C, event: &SimEvent)
    where
        C: DetectorContext + ?Sized,
    {
        let trackers = &event.input.tracker_tracks;
        for muon in &event.input.muons {
            self.muons += 1;
            let partner = event.truth_partner(muon.track.id);

            match matcher.match_one(ctx, &muon.track, trackers) {
                Some((best, _)) if Some(best.track.id) == partner => self.best_correct += 1,
                Some(_) => {}
                None => self.unmatched += 1,
            }

            for tracker in trackers {
                let Ok(comparison) = matcher.match_pair(ctx, &muon.track, &tracker.track) else {
                    continue;
                };
                let is_true = Some(tracker.track.id) == partner;
                let Some(chi2) = comparison.compatibility.chi2() else {
                    self.indeterminate += 1;
                    continue;
                };
                let accepted = comparison.compatibility.is_compatible();
                if is_true {
                    self.true_chi2.fill(chi2);
                    if !accepted {
                        self.true_rejected += 1;
                    }
                } else {
                    self.fake_chi2.fill(chi2);
                    if accepted {
                        self.fake_accepted += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SimGeometry;
    use crate::oracle::{EventSpec, Oracle};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_histogram_binning() {
        let mut h = Histogram::new(0.0, 10.0, 5);
        assert_eq!(h.edges.len(), 6);
        h.fill(0.0);
        h.fill(1.9);
        h.fill(9.99);
        h.fill(10.0);
        h.fill(-1.0);
        assert_eq!(h.counts, vec![2, 0, 0, 0, 1]);
        assert_eq!(h.overflow, 2);
        assert_eq!(h.entries(), 5);
    }

    #[test]
    fn test_perfect_events_match_their_partner() {
        let geometry = Arc::new(SimGeometry::standard());
        let mut oracle = Oracle::new(9, geometry.clone()).with_resolution_scale(0.0);
        let spec = EventSpec {
            muons: 2,
            vertex_sigma_z: 0.0,
            ..EventSpec::default()
        };
        let matcher = TrackMatcher::default();
        let mut analysis = MatchAnalysis::new(matcher.config().max_chi2);
        for _ in 0..5 {
            let event = oracle.generate_event(&spec);
            let detector = event.detector(geometry.clone());
            analysis.record_event(&matcher, &detector, &event);
        }

        assert!(analysis.muons > 0);
        assert_eq!(analysis.best_correct, analysis.muons);
        assert_eq!(analysis.true_rejected, 0);
        assert!(analysis.true_chi2.entries() as usize >= analysis.muons);
    }

    proptest! {
        #[test]
        fn prop_histogram_keeps_every_entry(values in prop::collection::vec(-50.0f64..150.0, 0..64)) {
            let mut h = Histogram::new(0.0, 100.0, 10);
            for v in &values {
                h.fill(*v);
            }
            prop_assert_eq!(h.entries(), values.len() as u64);
            let inside = values.iter().filter(|v| **v >= 0.0 && **v < 100.0).count() as u64;
            prop_assert_eq!(h.counts.iter().sum::<u64>(), inside);
        }
    }
}
