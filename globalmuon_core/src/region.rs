//! Region of interest around a standalone muon.
//!
//! Shortlists tracker tracks before any propagation happens. A track is
//! regional when it lies within a fixed ΔR cone around the muon direction
//! or inside the rectangular η-φ window. The window is built from fixed
//! nominal widths that are widened when the muon's direction estimate
//! disagrees with its own measurements, then clamped to generous floors.
//! A tracker track outside the region is never propagated, so the cone and
//! the floors are safety margins rather than tuning knobs.

use globalmuon_env::{azimuth, pseudorapidity, wrap_angle, Track};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ReconstructionError;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunable widths of the region of interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Nominal half-width in η (default: 0.1)
    pub nominal_delta_eta: f64,

    /// Nominal half-width in φ (default: 0.14 rad)
    pub nominal_delta_phi: f64,

    /// η disagreement above which the window is widened by half of it (default: 0.06)
    pub eta_disagreement: f64,

    /// φ disagreement above which the window is widened (default: 0.07 rad)
    pub phi_disagreement: f64,

    /// Extra φ width added on disagreement (default: 0.3 rad)
    pub phi_widening: f64,

    /// Below this pT a central track takes the disagreement itself as width (default: 6 GeV)
    pub soft_track_pt: f64,

    /// Global floor of the η half-width (default: 0.3)
    pub min_delta_eta: f64,

    /// Global floor of the φ half-width (default: 0.5 rad)
    pub min_delta_phi: f64,

    /// Longitudinal spread of the interaction region, 1σ (default: 5.3 cm)
    pub vertex_sigma_z: f64,

    /// Cap on the longitudinal half-extent (default: 15.9 cm)
    pub max_delta_z: f64,

    /// Radius of the η-φ cone that always counts as regional (default: 1.0)
    pub max_delta_r: f64,

    /// Also require the track's reference z within the longitudinal
    /// half-extent of the vertex (default: false)
    pub vertex_z_cut: bool,

    /// Absolute floor of the pT threshold (default: 1.5 GeV)
    pub min_pt_floor: f64,

    /// Fraction of the muon pT used as threshold (default: 0.6)
    pub pt_fraction: f64,

    /// Above this momentum the vertex momentum defines the direction,
    /// below it the innermost-state momentum does (default: 1 GeV)
    pub direction_momentum_threshold: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            nominal_delta_eta: 0.1,
            nominal_delta_phi: 0.14,
            eta_disagreement: 0.06,
            phi_disagreement: 0.07,
            phi_widening: 0.3,
            soft_track_pt: 6.0,
            min_delta_eta: 0.3,
            min_delta_phi: 0.5,
            vertex_sigma_z: 5.3,
            max_delta_z: 15.9,
            max_delta_r: 1.0,
            vertex_z_cut: false,
            min_pt_floor: 1.5,
            pt_fraction: 0.6,
            direction_momentum_threshold: 1.0,
        }
    }
}

// Barrel/endcap transition bands with their own floors
const OVERLAP_ETA_BAND: (f64, f64) = (0.8, 1.25);
const OVERLAP_ETA_FLOOR: f64 = 0.07;
const OVERLAP_PHI_BAND: (f64, f64) = (1.0, 1.3);
const OVERLAP_PHI_FLOOR: f64 = 0.3;

// ============================================================================
// REGION
// ============================================================================

/// A ΔR cone united with a rectangular η-φ window, anchored at the nominal
/// vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub eta: f64,
    pub phi: f64,
    pub delta_eta: f64,
    pub delta_phi: f64,
    pub delta_r: f64,
    pub delta_z: f64,

    /// Whether membership cuts on `delta_z`
    pub z_cut: bool,

    /// Transverse-momentum floor of the region. Reported for diagnostics;
    /// membership does not cut on it.
    pub min_pt: f64,

    pub vertex: Vector3<f64>,
}

impl RegionOfInterest {
    /// Whether a tracker track lies inside the cone or the window.
    pub fn contains(&self, track: &Track) -> bool {
        let deta = (pseudorapidity(&track.momentum) - self.eta).abs();
        let dphi = wrap_angle(azimuth(&track.momentum) - self.phi).abs();
        let in_cone = deta.hypot(dphi) <= self.delta_r;
        let in_window = deta <= self.delta_eta && dphi <= self.delta_phi;
        if !(in_cone || in_window) {
            return false;
        }
        !self.z_cut || (track.reference_point.z - self.vertex.z).abs() <= self.delta_z
    }
}

/// Builds regions of interest from standalone tracks.
#[derive(Debug, Clone, Default)]
pub struct RegionOfInterestSelector {
    config: RegionConfig,
}

impl RegionOfInterestSelector {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// Define the window around a standalone muon.
    ///
    /// The direction comes from the vertex momentum (or the innermost-state
    /// momentum for very soft tracks); the disagreement is measured against
    /// the position of the second valid hit, or the first when only one exists.
    pub fn define(&self, muon: &Track) -> Result<RegionOfInterest, ReconstructionError> {
        let cfg = &self.config;

        let momentum = if muon.p() > cfg.direction_momentum_threshold {
            muon.momentum
        } else {
            muon.inner_momentum()
        };

        let mut valid = muon.valid_hits();
        let first = valid.next().ok_or(ReconstructionError::EmptyTrack(muon.id))?;
        let reference = valid.next().unwrap_or(first);

        let eta_dir = pseudorapidity(&momentum);
        let phi_dir = azimuth(&momentum);
        let pt = momentum.xy().norm();

        let eta_hit = pseudorapidity(&reference.position);
        let phi_hit = azimuth(&reference.position);

        let deta = (eta_dir - eta_hit).abs();
        let dphi = wrap_angle(phi_dir - phi_hit).abs();

        let mut delta_eta = cfg.nominal_delta_eta;
        let mut delta_phi = cfg.nominal_delta_phi;

        if deta > cfg.eta_disagreement {
            delta_eta += deta / 2.0;
        }
        if dphi > cfg.phi_disagreement {
            delta_phi += cfg.phi_widening;
            if eta_hit.abs() < 1.0 && pt < cfg.soft_track_pt {
                delta_phi = dphi;
            }
        }

        let abs_eta = eta_dir.abs();
        if abs_eta > OVERLAP_ETA_BAND.0 && abs_eta < OVERLAP_ETA_BAND.1 {
            delta_eta = delta_eta.max(OVERLAP_ETA_FLOOR);
        }
        if abs_eta > OVERLAP_PHI_BAND.0 && abs_eta < OVERLAP_PHI_BAND.1 {
            delta_phi = delta_phi.max(OVERLAP_PHI_FLOOR);
        }

        delta_eta = delta_eta.max(cfg.min_delta_eta);
        delta_phi = delta_phi.max(cfg.min_delta_phi);

        let delta_z = cfg.max_delta_z.min(3.0 * cfg.vertex_sigma_z);
        let min_pt = cfg.min_pt_floor.max(cfg.pt_fraction * pt);

        Ok(RegionOfInterest {
            eta: eta_dir,
            phi: phi_dir,
            delta_eta,
            delta_phi,
            delta_r: cfg.max_delta_r,
            delta_z,
            z_cut: cfg.vertex_z_cut,
            min_pt,
            vertex: Vector3::zeros(),
        })
    }
}
