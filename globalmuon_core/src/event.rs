//! Event-level processing: every standalone muon of an event runs through
//! the builder independently. The detector context is shared read-only
//! across the worker threads.

use globalmuon_env::{DetectorContext, TrackId};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::candidate_builder::{CandidateBuilder, MuonCandidate, MuonHitsOption, TrackCandidate};
use crate::config::GlobalMuonConfig;
use crate::error::ReconstructionError;

/// Reconstructed tracks of one event.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    pub muons: Vec<TrackCandidate>,
    pub tracker_tracks: Vec<TrackCandidate>,
}

/// Outcome for one standalone muon.
#[derive(Debug, Clone)]
pub struct MuonOutcome {
    pub muon: TrackId,
    pub result: Result<Vec<MuonCandidate>, ReconstructionError>,
}

/// Per-muon outcomes in the order of [`EventInput::muons`].
#[derive(Debug, Clone, Default)]
pub struct EventOutput {
    pub outcomes: Vec<MuonOutcome>,
}

impl EventOutput {
    /// All candidates of the event, muon by muon.
    pub fn candidates(&self) -> impl Iterator<Item = &MuonCandidate> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (TrackId, &ReconstructionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.muon, err)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventProcessor {
    builder: CandidateBuilder,
}

impl EventProcessor {
    pub fn new(config: &GlobalMuonConfig) -> Self {
        Self {
            builder: CandidateBuilder::new(config),
        }
    }

    pub fn builder(&self) -> &CandidateBuilder {
        &self.builder
    }

    /// Process all muons of an event in parallel.
    pub fn process_event<C>(&self, ctx: &C, event: &EventInput, option: MuonHitsOption) -> EventOutput
    where
        C: DetectorContext + ?Sized,
    {
        // indexed collect keeps input order
        let outcomes: Vec<MuonOutcome> = event
            .muons
            .par_iter()
            .map(|muon| self.process_muon(ctx, muon, &event.tracker_tracks, option))
            .collect();
        Self::summarize(outcomes)
    }

    /// Same as [`process_event`](Self::process_event) on the calling thread.
    pub fn process_event_sequential<C>(&self, ctx: &C, event: &EventInput, option: MuonHitsOption) -> EventOutput
    where
        C: DetectorContext + ?Sized,
    {
        let outcomes = event
            .muons
            .iter()
            .map(|muon| self.process_muon(ctx, muon, &event.tracker_tracks, option))
            .collect();
        Self::summarize(outcomes)
    }

    fn process_muon<C>(
        &self,
        ctx: &C,
        muon: &TrackCandidate,
        tracker_tracks: &[TrackCandidate],
        option: MuonHitsOption,
    ) -> MuonOutcome
    where
        C: DetectorContext + ?Sized,
    {
        let result = self.builder.build_candidates(ctx, muon, tracker_tracks, option);
        if let Err(err) = &result {
            warn!("Muon {} skipped: {}", muon.track.id, err);
        }
        MuonOutcome {
            muon: muon.track.id,
            result,
        }
    }

    fn summarize(outcomes: Vec<MuonOutcome>) -> EventOutput {
        let output = EventOutput { outcomes };
        info!(
            "Event processed: {} muons, {} global candidates",
            output.outcomes.len(),
            output.candidate_count()
        );
        output
    }
}
