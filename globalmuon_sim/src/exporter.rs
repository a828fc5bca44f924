//! JSON exporter for reconstructed candidates.
//!
//! Exports every event's standalone muons and global candidates so that a
//! run can be inspected or diffed offline.

use globalmuon_core::{EventOutput, MuonCandidate, MuonHitsOption, RefitKind};
use globalmuon_env::Track;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

use crate::oracle::SimEvent;

/// A standalone muon as seen by the reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuonRecord {
    pub track_id: String,
    pub p: f64,
    pub eta: f64,
    pub phi: f64,
    pub hits: usize,
}

impl MuonRecord {
    pub fn new(track: &Track) -> Self {
        Self {
            track_id: track.id.to_string(),
            p: track.p(),
            eta: track.eta(),
            phi: track.phi(),
            hits: track.hits.len(),
        }
    }
}

/// One global muon candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub muon_track: String,
    pub tracker_track: String,
    pub kind: RefitKind,
    pub chi2: f64,
    pub ndof: u32,

    /// -ln of the fit probability
    pub probability: f64,

    pub muon_hits: usize,

    /// Whether the tracker track belongs to the same true muon
    pub correct: bool,
}

impl CandidateRecord {
    pub fn new(candidate: &MuonCandidate, correct: bool) -> Self {
        Self {
            muon_track: candidate.muon_track.id.to_string(),
            tracker_track: candidate.tracker_track.id.to_string(),
            kind: candidate.kind,
            chi2: candidate.trajectory.chi_squared(),
            ndof: candidate.trajectory.ndof(),
            probability: candidate.probability(),
            muon_hits: candidate.muon_hit_count(),
            correct,
        }
    }
}

/// Reconstruction output of one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub index: u64,
    pub muons: Vec<MuonRecord>,
    pub candidates: Vec<CandidateRecord>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl EventRecord {
    pub fn new(event: &SimEvent, output: &EventOutput) -> Self {
        Self {
            index: event.index,
            muons: event.input.muons.iter().map(|m| MuonRecord::new(&m.track)).collect(),
            candidates: output
                .candidates()
                .map(|c| {
                    let correct = event.truth_partner(c.muon_track.id) == Some(c.tracker_track.id);
                    CandidateRecord::new(c, correct)
                })
                .collect(),
            failures: output.failures().map(|(id, err)| format!("{}: {}", id, err)).collect(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Hit-inclusion policy of the run
    pub option: MuonHitsOption,

    /// All events
    pub events: Vec<EventRecord>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, option: MuonHitsOption) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            option,
            events: Vec::new(),
            passed: false,
            efficiency: None,
        }
    }

    pub fn add_event(&mut self, record: EventRecord) {
        self.events.push(record);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, efficiency: Option<f64>) {
        self.passed = passed;
        self.efficiency = efficiency;
    }

    pub fn candidate_count(&self) -> usize {
        self.events.iter().map(|e| e.candidates.len()).sum()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
