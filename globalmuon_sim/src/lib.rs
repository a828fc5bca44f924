//! GlobalMuon Deterministic Simulation Harness
//!
//! This crate provides a controlled detector in which the whole global muon
//! reconstruction runs deterministically against known truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are derived from a single 64-bit seed:
//! - **Events**: muon kinematics, vertex spread, scattering and smearing
//! - **Detector**: noise hits and wrongly assigned muon hits
//! - **Ordering**: tracker tracks are shuffled with the same generator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────┐     ┌──────────────┐    ┌──────────────┐  │
//! │  │    Oracle    │────►│   SimEvent   │───►│EventProcessor│  │
//! │  │ (truth +     │     │ (tracks +    │    │ (rayon, one  │  │
//! │  │  smearing)   │     │  hits)       │    │  task/muon)  │  │
//! │  └──────┬───────┘     └──────┬───────┘    └──────┬───────┘  │
//! │         │                    │                   │          │
//! │  ┌──────▼────────────────────▼───────┐    ┌──────▼───────┐  │
//! │  │  SimGeometry + SimDetector        │◄───│  Candidates  │  │
//! │  │  (propagator, refitter, layers)   │    │  vs. truth   │  │
//! │  └───────────────────────────────────┘    └──────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use globalmuon_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42).with_events(200).run(ScenarioId::DenseJet);
//! assert!(result.passed);
//! ```

pub mod analysis;
pub mod detector;
pub mod error;
pub mod exporter;
pub mod geometry;
pub mod oracle;
pub mod runner;
pub mod scenarios;

pub use analysis::{Histogram, MatchAnalysis};
pub use detector::SimDetector;
pub use error::SimError;
pub use exporter::{CandidateRecord, EventRecord, MuonRecord, SimExport};
pub use geometry::{Layer, SimGeometry};
pub use oracle::{EventSpec, Oracle, SimEvent, TruthMuon};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
