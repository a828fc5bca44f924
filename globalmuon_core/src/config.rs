//! Top-level configuration of the global muon reconstruction.
//!
//! Every section has defaults, so a JSON file only needs the values it
//! overrides:
//!
//! ```json
//! { "matcher": { "max_chi2": 30.0 }, "builder": { "hits_option": "combined" } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::candidate_builder::BuilderConfig;
use crate::error::ConfigError;
use crate::hit_selector::HitSelectionConfig;
use crate::region::RegionConfig;
use crate::track_matcher::MatcherConfig;
use crate::trajectory_chooser::ChooserConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalMuonConfig {
    pub matcher: MatcherConfig,
    pub region: RegionConfig,
    pub hit_selection: HitSelectionConfig,
    pub chooser: ChooserConfig,
    pub builder: BuilderConfig,
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive and finite, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be non-negative and finite, got {}", value)))
    }
}

impl GlobalMuonConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject cuts that would make every comparison meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("matcher.max_chi2", self.matcher.max_chi2)?;
        non_negative("matcher.min_p", self.matcher.min_p)?;
        non_negative("matcher.min_pt", self.matcher.min_pt)?;
        positive("matcher.position_tolerance", self.matcher.position_tolerance)?;

        let r = &self.region;
        positive("region.nominal_delta_eta", r.nominal_delta_eta)?;
        positive("region.nominal_delta_phi", r.nominal_delta_phi)?;
        non_negative("region.eta_disagreement", r.eta_disagreement)?;
        non_negative("region.phi_disagreement", r.phi_disagreement)?;
        non_negative("region.phi_widening", r.phi_widening)?;
        non_negative("region.soft_track_pt", r.soft_track_pt)?;
        positive("region.min_delta_eta", r.min_delta_eta)?;
        positive("region.min_delta_phi", r.min_delta_phi)?;
        positive("region.vertex_sigma_z", r.vertex_sigma_z)?;
        positive("region.max_delta_z", r.max_delta_z)?;
        positive("region.max_delta_r", r.max_delta_r)?;
        non_negative("region.min_pt_floor", r.min_pt_floor)?;
        non_negative("region.pt_fraction", r.pt_fraction)?;
        non_negative("region.direction_momentum_threshold", r.direction_momentum_threshold)?;

        let h = &self.hit_selection;
        positive("hit_selection.dt_chi2_cut", h.dt_chi2_cut)?;
        positive("hit_selection.csc_chi2_cut", h.csc_chi2_cut)?;
        positive("hit_selection.rpc_chi2_cut", h.rpc_chi2_cut)?;
        positive("hit_selection.global_chi2_cut", h.global_chi2_cut)?;

        non_negative("chooser.prob_cut", self.chooser.prob_cut)?;

        let b = &self.builder;
        non_negative("builder.pt_cut", b.pt_cut)?;
        non_negative("builder.min_momentum", b.min_momentum)?;
        positive("builder.error_rescale", b.error_rescale)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate_builder::MuonHitsOption;
    use globalmuon_env::TraversalDirection;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GlobalMuonConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GlobalMuonConfig::from_json_str(
            r#"{ "matcher": { "max_chi2": 30.0 }, "builder": { "hits_option": "combined", "direction": "outside_in" } }"#,
        )
        .unwrap();
        assert_eq!(config.matcher.max_chi2, 30.0);
        assert_eq!(config.matcher.min_p, 2.5);
        assert_eq!(config.builder.hits_option, MuonHitsOption::Combined);
        assert_eq!(config.builder.direction, TraversalDirection::OutsideIn);
        assert_eq!(config.hit_selection.dt_chi2_cut, 10.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = GlobalMuonConfig::from_json_str(r#"{ "matcher": { "max_chi2": -1.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "matcher.max_chi2", .. }));

        let err = GlobalMuonConfig::from_json_str(r#"{ "builder": { "error_rescale": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "builder.error_rescale", .. }));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = GlobalMuonConfig::from_json_str("{ matcher: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = GlobalMuonConfig::from_json_file("/nonexistent/globalmuon.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
