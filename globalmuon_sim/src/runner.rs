//! Scenario runner - reconstructs generated events and scores the result
//! against the oracle's truth.

use crate::analysis::MatchAnalysis;
use crate::exporter::{EventRecord, SimExport};
use crate::geometry::SimGeometry;
use crate::oracle::{EventSpec, Oracle, SimEvent};
use crate::scenarios::ScenarioId;

use globalmuon_core::{EventOutput, EventProcessor, GlobalMuonConfig, MuonHitsOption, RefitKind};
use globalmuon_env::TrackId;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Events reconstructed
    pub events: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Generated muons
    pub true_muons: usize,

    /// Muons with both a standalone and a tracker track
    pub reconstructable: usize,

    /// Reconstructable muons with a candidate built from their own tracker track
    pub matched: usize,

    /// Global candidates built
    pub candidates: usize,

    /// Candidates pairing a muon with somebody else's tracker track
    pub fake_candidates: usize,

    /// Standalone muons the builder refused
    pub failed_muons: usize,

    /// Propagator invocations
    pub propagations: usize,

    /// Refitter invocations
    pub refits: usize,

    /// Chosen refit kind, indexed by slot
    pub kinds: [usize; 4],

    /// Parallel and sequential processing agreed on every event
    pub deterministic: bool,
}

impl ScenarioMetrics {
    pub fn efficiency(&self) -> f64 {
        if self.reconstructable == 0 {
            1.0
        } else {
            self.matched as f64 / self.reconstructable as f64
        }
    }

    pub fn fake_rate(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            self.fake_candidates as f64 / self.candidates as f64
        }
    }

    fn record(&mut self, event: &SimEvent, output: &EventOutput) {
        self.true_muons += event.truth.len();
        self.reconstructable += event.truth.iter().filter(|t| t.is_reconstructable()).count();
        self.failed_muons += output.failures().count();

        let mut found: HashSet<TrackId> = HashSet::new();
        for candidate in output.candidates() {
            self.candidates += 1;
            self.kinds[candidate.kind.slot()] += 1;
            let muon = candidate.muon_track.id;
            if event.truth_partner(muon) == Some(candidate.tracker_track.id) {
                found.insert(muon);
            } else {
                self.fake_candidates += 1;
            }
        }
        self.matched += event
            .truth
            .iter()
            .filter(|t| t.is_reconstructable())
            .filter(|t| t.muon_track.is_some_and(|id| found.contains(&id)))
            .count();
    }
}

/// Per-muon candidate summary compared between the parallel and the
/// sequential run.
type Fingerprint = Vec<(TrackId, Option<Vec<(TrackId, RefitKind, u64)>>)>;

fn fingerprint(output: &EventOutput) -> Fingerprint {
    output
        .outcomes
        .iter()
        .map(|o| {
            let candidates = o.result.as_ref().ok().map(|cands| {
                cands
                    .iter()
                    .map(|c| (c.tracker_track.id, c.kind, c.trajectory.chi_squared().to_bits()))
                    .collect()
            });
            (o.muon, candidates)
        })
        .collect()
}

/// Runs reconstruction scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Events per scenario
    events: u64,

    /// Hit-inclusion policy
    option: MuonHitsOption,

    config: GlobalMuonConfig,

    /// Smearing multiplier handed to the oracle
    resolution_scale: f64,

    /// Replaces the scenario's own event content when set
    event_spec: Option<EventSpec>,

    geometry: Arc<SimGeometry>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        let config = GlobalMuonConfig::default();
        Self {
            seed,
            events: 100,
            option: config.builder.hits_option,
            config,
            resolution_scale: 1.0,
            event_spec: None,
            geometry: Arc::new(SimGeometry::standard()),
        }
    }

    /// Sets the number of events.
    pub fn with_events(mut self, events: u64) -> Self {
        self.events = events;
        self
    }

    /// Sets the hit-inclusion policy.
    pub fn with_option(mut self, option: MuonHitsOption) -> Self {
        self.option = option;
        self
    }

    /// Sets the reconstruction configuration; the policy follows it.
    pub fn with_config(mut self, config: GlobalMuonConfig) -> Self {
        self.option = config.builder.hits_option;
        self.config = config;
        self
    }

    pub fn with_resolution_scale(mut self, scale: f64) -> Self {
        self.resolution_scale = scale;
        self
    }

    pub fn with_event_spec(mut self, spec: EventSpec) -> Self {
        self.event_spec = Some(spec);
        self
    }

    fn oracle(&self) -> Oracle {
        let physics_seed = self.seed.wrapping_mul(0x9e3779b97f4a7c15);
        Oracle::new(physics_seed, self.geometry.clone()).with_resolution_scale(self.resolution_scale)
    }

    fn spec_for(&self, scenario: ScenarioId) -> EventSpec {
        self.event_spec.clone().unwrap_or_else(|| scenario.event_spec())
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario, None)
    }

    /// Runs a scenario, recording every event into `export` when given.
    pub fn run_with_export(&self, scenario: ScenarioId, mut export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        info!("  {}", scenario.description());

        let spec = self.spec_for(scenario);
        let mut oracle = self.oracle();
        let processor = EventProcessor::new(&self.config);
        let mut metrics = ScenarioMetrics {
            deterministic: true,
            ..ScenarioMetrics::default()
        };

        for _ in 0..self.events {
            let event = oracle.generate_event(&spec);

            let detector = event.detector(self.geometry.clone());
            let output = processor.process_event(&detector, &event.input, self.option);
            metrics.propagations += detector.propagation_calls();
            metrics.refits += detector.refit_calls();

            let replay = event.detector(self.geometry.clone());
            let sequential = processor.process_event_sequential(&replay, &event.input, self.option);
            if fingerprint(&output) != fingerprint(&sequential) {
                warn!("Event {}: parallel and sequential results differ", event.index);
                metrics.deterministic = false;
            }

            debug!(
                "Event {}: {} muons, {} tracker tracks, {} candidates",
                event.index,
                event.input.muons.len(),
                event.input.tracker_tracks.len(),
                output.candidate_count()
            );
            metrics.record(&event, &output);
            if let Some(export) = export.as_deref_mut() {
                export.add_event(EventRecord::new(&event, &output));
            }
        }

        let efficiency = metrics.efficiency();
        let efficiency_ok = efficiency >= scenario.min_efficiency();
        let passed = efficiency_ok && metrics.deterministic;

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  Events: {} | Muons: {} | Option: {}", self.events, metrics.true_muons, self.option.name());
        info!("  MATCHING METRICS:");
        info!(
            "    Efficiency:     {:.1}%  {}",
            efficiency * 100.0,
            if efficiency_ok { "✓" } else { "✗" }
        );
        info!("    Fake rate:      {:.1}%", metrics.fake_rate() * 100.0);
        info!("    Candidates:     {}", metrics.candidates);
        info!("    Failed muons:   {}", metrics.failed_muons);
        info!(
            "    Refit kinds:    tracker {} | all {} | first {} | selected {}",
            metrics.kinds[0], metrics.kinds[1], metrics.kinds[2], metrics.kinds[3]
        );
        info!("    Propagations:   {} | Refits: {}", metrics.propagations, metrics.refits);
        info!(
            "    Deterministic:  {}",
            if metrics.deterministic { "✓" } else { "✗" }
        );
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let failure_reason = if passed {
            None
        } else if !metrics.deterministic {
            Some("Parallel and sequential reconstruction disagree".to_string())
        } else {
            Some(format!(
                "Efficiency {:.1}% below {:.0}%",
                efficiency * 100.0,
                scenario.min_efficiency() * 100.0
            ))
        };

        if let Some(export) = export {
            export.finalize(passed, Some(efficiency));
        }

        ScenarioResult {
            scenario: scenario.name().to_string(),
            seed: self.seed,
            passed,
            events: self.events,
            failure_reason,
            metrics,
        }
    }

    /// Fills χ² distributions of true and fake pairs for a scenario.
    pub fn run_match_analysis(&self, scenario: ScenarioId) -> MatchAnalysis {
        info!("Match analysis: {} (seed={})", scenario.name(), self.seed);

        let spec = self.spec_for(scenario);
        let mut oracle = self.oracle();
        let processor = EventProcessor::new(&self.config);
        let matcher = processor.builder().matcher();
        let mut analysis = MatchAnalysis::new(matcher.config().max_chi2);

        for _ in 0..self.events {
            let event = oracle.generate_event(&spec);
            let detector = event.detector(self.geometry.clone());
            analysis.record_event(matcher, &detector, &event);
        }

        info!(
            "  Best match correct for {}/{} muons, {} true pairs beyond the gate",
            analysis.best_correct, analysis.muons, analysis.true_rejected
        );
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect_single_muons() -> EventSpec {
        EventSpec {
            vertex_sigma_z: 0.0,
            ..EventSpec::default()
        }
    }

    #[test]
    fn test_perfect_detector_matches_every_muon() {
        let result = ScenarioRunner::new(42)
            .with_events(20)
            .with_resolution_scale(0.0)
            .with_event_spec(perfect_single_muons())
            .run(ScenarioId::SingleMuon);

        assert!(result.metrics.reconstructable > 0);
        assert_eq!(result.metrics.matched, result.metrics.reconstructable);
        assert_eq!(result.metrics.fake_candidates, 0);
        assert!(result.metrics.deterministic);
        assert!(result.passed);
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let run = || {
            ScenarioRunner::new(7)
                .with_events(10)
                .run(ScenarioId::Mixed)
                .metrics
        };
        let (a, b) = (run(), run());

        assert_eq!(a.true_muons, b.true_muons);
        assert_eq!(a.candidates, b.candidates);
        assert_eq!(a.matched, b.matched);
        assert_eq!(a.kinds, b.kinds);
        assert_eq!(a.propagations, b.propagations);
        assert!(a.deterministic);
    }

    #[test]
    fn test_tracker_only_option_emits_tracker_trajectories() {
        let result = ScenarioRunner::new(3)
            .with_events(10)
            .with_resolution_scale(0.0)
            .with_event_spec(perfect_single_muons())
            .with_option(MuonHitsOption::TrackerOnly)
            .run(ScenarioId::SingleMuon);

        assert!(result.metrics.candidates > 0);
        assert_eq!(result.metrics.kinds[RefitKind::TrackerOnly.slot()], result.metrics.candidates);
    }

    #[test]
    fn test_export_collects_every_event() {
        let mut export = SimExport::new("single_muon", 5, MuonHitsOption::AllMuonHits);
        let result = ScenarioRunner::new(5)
            .with_events(4)
            .with_resolution_scale(0.0)
            .with_event_spec(perfect_single_muons())
            .run_with_export(ScenarioId::SingleMuon, Some(&mut export));

        assert_eq!(export.events.len(), 4);
        assert_eq!(export.passed, result.passed);
        assert_eq!(export.candidate_count(), result.metrics.candidates);
        assert!(export.events.iter().flat_map(|e| &e.candidates).all(|c| c.correct));
    }

    #[test]
    fn test_efficiency_without_reconstructable_muons() {
        let metrics = ScenarioMetrics::default();
        assert_eq!(metrics.efficiency(), 1.0);
        assert_eq!(metrics.fake_rate(), 0.0);
    }
}
