//! Reconstruction scenarios for the simulator.

use crate::oracle::EventSpec;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: one isolated muon per event, full acceptance
    SingleMuon,

    /// SIM-002: muon inside a jet of soft tracker tracks
    DenseJet,

    /// SIM-003: crowded muon stations and wrongly assigned hits
    NoisyStations,

    /// SIM-004: soft muons in the barrel/endcap overlap
    OffAxis,

    /// SIM-005: several muons, background and noise together
    Mixed,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleMuon,
            ScenarioId::DenseJet,
            ScenarioId::NoisyStations,
            ScenarioId::OffAxis,
            ScenarioId::Mixed,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleMuon => "single_muon",
            ScenarioId::DenseJet => "dense_jet",
            ScenarioId::NoisyStations => "noisy_stations",
            ScenarioId::OffAxis => "off_axis",
            ScenarioId::Mixed => "mixed",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleMuon => "One 5-50 GeV muon per event, |eta| < 2.1",
            ScenarioId::DenseJet => "Muon with 20 soft tracker tracks inside a 0.3 cone",
            ScenarioId::NoisyStations => "Two noise hits per station, 30% displaced muon hits",
            ScenarioId::OffAxis => "3-8 GeV muons in the 0.8 < |eta| < 1.3 overlap",
            ScenarioId::Mixed => "Three muons, background tracks and station noise",
        }
    }

    /// Event content of the scenario.
    pub fn event_spec(&self) -> EventSpec {
        match self {
            ScenarioId::SingleMuon => EventSpec::default(),
            ScenarioId::DenseJet => EventSpec {
                momentum_range: (5.0, 30.0),
                eta_range: (0.0, 1.0),
                background_tracks: 20,
                background_momentum: (2.0, 15.0),
                jet_cone: Some(0.3),
                ..EventSpec::default()
            },
            ScenarioId::NoisyStations => EventSpec {
                eta_range: (0.0, 1.2),
                background_tracks: 5,
                noise_hits_per_station: 2,
                misassigned_hit_probability: 0.3,
                ..EventSpec::default()
            },
            ScenarioId::OffAxis => EventSpec {
                momentum_range: (3.0, 8.0),
                eta_range: (0.8, 1.3),
                background_tracks: 5,
                ..EventSpec::default()
            },
            ScenarioId::Mixed => EventSpec {
                muons: 3,
                background_tracks: 10,
                noise_hits_per_station: 1,
                misassigned_hit_probability: 0.1,
                ..EventSpec::default()
            },
        }
    }

    /// Fraction of reconstructable muons that must be matched to their
    /// own tracker track.
    pub fn min_efficiency(&self) -> f64 {
        match self {
            ScenarioId::SingleMuon => 0.9,
            ScenarioId::DenseJet | ScenarioId::NoisyStations | ScenarioId::Mixed => 0.8,
            ScenarioId::OffAxis => 0.7,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_muon" | "singlemuon" | "sim-001" => Ok(ScenarioId::SingleMuon),
            "dense_jet" | "densejet" | "sim-002" => Ok(ScenarioId::DenseJet),
            "noisy_stations" | "noisystations" | "sim-003" => Ok(ScenarioId::NoisyStations),
            "off_axis" | "offaxis" | "sim-004" => Ok(ScenarioId::OffAxis),
            "mixed" | "sim-005" => Ok(ScenarioId::Mixed),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("SIM-003".parse::<ScenarioId>(), Ok(ScenarioId::NoisyStations));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_specs_are_sane() {
        for scenario in ScenarioId::all() {
            let spec = scenario.event_spec();
            assert!(spec.muons > 0);
            assert!(spec.momentum_range.0 <= spec.momentum_range.1);
            assert!(spec.misassigned_hit_probability <= 1.0);
            assert!(scenario.min_efficiency() > 0.0 && scenario.min_efficiency() <= 1.0);
        }
    }
}
