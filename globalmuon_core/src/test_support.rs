//! Shared fixtures for unit tests: a straight-line mock detector that counts
//! its service calls, and builders for simple barrel tracks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use globalmuon_env::{
    DetectorContext, DetectorId, Hit, HitId, LayerId, LayerNavigator, Measurement,
    PropagationDirection, Propagator, Refitter, StateCovariance, Subsystem, Surface, Track,
    TrackId, TrackState, Trajectory, TraversalDirection,
};
use nalgebra::Vector3;

pub(crate) const BOUNDARY_RADIUS: f64 = 120.0;
pub(crate) const TRACKER_RADII: [f64; 6] = [10.0, 30.0, 50.0, 70.0, 90.0, 108.0];
pub(crate) const MUON_RADII: [f64; 4] = [420.0, 500.0, 610.0, 720.0];

/// Field-free mock context.
///
/// Propagation follows straight lines and leaves the covariance untouched.
/// Refits return one trajectory through the given hits (in the given order)
/// with a configurable per-hit estimate.
pub(crate) struct MockDetector {
    propagations: AtomicUsize,
    refits: AtomicUsize,
    layers: HashMap<LayerId, Vec<Hit>>,
    estimates: HashMap<HitId, f64>,
    default_estimate: f64,
    refit_multiplicity: usize,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            propagations: AtomicUsize::new(0),
            refits: AtomicUsize::new(0),
            layers: HashMap::new(),
            estimates: HashMap::new(),
            default_estimate: 0.5,
            refit_multiplicity: 1,
        }
    }

    /// Register event hits so that occupancy lookups can find them.
    pub fn with_event_hits(mut self, hits: impl IntoIterator<Item = Hit>) -> Self {
        for hit in hits {
            self.layers.entry(layer_for(hit.detector)).or_default().push(hit);
        }
        self
    }

    /// Force the fit estimate of one hit.
    pub fn with_estimate(mut self, hit: HitId, estimate: f64) -> Self {
        self.estimates.insert(hit, estimate);
        self
    }

    /// Number of trajectories every refit returns.
    pub fn with_refit_multiplicity(mut self, n: usize) -> Self {
        self.refit_multiplicity = n;
        self
    }

    pub fn propagation_calls(&self) -> usize {
        self.propagations.load(Ordering::SeqCst)
    }

    pub fn refit_calls(&self) -> usize {
        self.refits.load(Ordering::SeqCst)
    }
}

fn layer_for(detector: DetectorId) -> LayerId {
    let code = match detector.subsystem {
        Subsystem::Tracker => 0,
        Subsystem::Dt => 1,
        Subsystem::Csc => 2,
        Subsystem::Rpc => 3,
    };
    match detector.subsystem {
        Subsystem::Tracker => LayerId(detector.chamber),
        _ => LayerId(1000 * code + u32::from(detector.station)),
    }
}

/// Path length along `direction` from `position` to `target`.
fn intersect(
    position: &Vector3<f64>,
    direction: &Vector3<f64>,
    target: &Surface,
    mode: PropagationDirection,
) -> Option<f64> {
    const EPS: f64 = 1e-9;
    let roots: Vec<f64> = match *target {
        Surface::Cylinder { radius } => {
            let a = direction.xy().norm_squared();
            if a < EPS {
                return None;
            }
            let b = 2.0 * position.xy().dot(&direction.xy());
            let c = position.xy().norm_squared() - radius * radius;
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        }
        Surface::Disk { z } => {
            if direction.z.abs() < EPS {
                return None;
            }
            vec![(z - position.z) / direction.z]
        }
    };

    match mode {
        PropagationDirection::AlongMomentum => {
            roots.into_iter().filter(|t| *t >= -EPS).min_by(|a, b| a.total_cmp(b))
        }
        PropagationDirection::OppositeToMomentum => {
            roots.into_iter().filter(|t| *t <= EPS).max_by(|a, b| a.total_cmp(b))
        }
        PropagationDirection::Any => roots.into_iter().min_by(|a, b| a.abs().total_cmp(&b.abs())),
    }
}

impl Propagator for MockDetector {
    fn propagate(
        &self,
        state: &TrackState,
        target: &Surface,
        direction: PropagationDirection,
    ) -> Option<TrackState> {
        self.propagations.fetch_add(1, Ordering::SeqCst);
        let position = state.global_position();
        let dir = state.direction();
        let t = intersect(&position, &dir, target, direction)?;
        TrackState::from_global(
            *target,
            position + dir * t,
            state.global_momentum(),
            state.charge(),
            *state.covariance(),
        )
        .ok()
    }
}

impl Refitter for MockDetector {
    fn refit(&self, seed: &TrackState, hits: &[Hit], direction: TraversalDirection) -> Vec<Trajectory> {
        self.refits.fetch_add(1, Ordering::SeqCst);
        if self.refit_multiplicity == 0 || !hits.iter().any(|h| h.valid) {
            return Vec::new();
        }

        let mut chi2 = 0.0;
        let mut measurements = Vec::with_capacity(hits.len());
        for hit in hits {
            let surface = Surface::Cylinder { radius: hit.position.xy().norm() };
            let state = match TrackState::from_global(
                surface,
                hit.position,
                seed.global_momentum(),
                seed.charge(),
                *seed.covariance(),
            ) {
                Ok(state) => state,
                Err(_) => return Vec::new(),
            };
            let estimate = if hit.valid {
                self.estimates
                    .get(&hit.id)
                    .copied()
                    .unwrap_or(self.default_estimate * f64::from(hit.dimension))
            } else {
                0.0
            };
            chi2 += estimate;
            measurements.push(Measurement::new(state, hit.clone(), estimate));
        }

        match Trajectory::new(measurements, chi2, direction) {
            Ok(traj) => vec![traj; self.refit_multiplicity],
            Err(_) => Vec::new(),
        }
    }
}

impl LayerNavigator for MockDetector {
    fn layer_of(&self, detector: DetectorId) -> Option<LayerId> {
        Some(layer_for(detector))
    }

    fn hits_on_layer(&self, layer: LayerId) -> Vec<Hit> {
        self.layers.get(&layer).cloned().unwrap_or_default()
    }

    fn next_layers(&self, _state: &TrackState, _direction: PropagationDirection) -> Vec<LayerId> {
        Vec::new()
    }
}

impl DetectorContext for MockDetector {
    fn tracker_boundary(&self) -> Surface {
        Surface::Cylinder { radius: BOUNDARY_RADIUS }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

fn unit_direction(phi: f64, eta: f64) -> Vector3<f64> {
    Vector3::new(phi.cos() / eta.cosh(), phi.sin() / eta.cosh(), eta.tanh())
}

fn point_at_radius(r: f64, phi: f64, eta: f64) -> Vector3<f64> {
    Vector3::new(r * phi.cos(), r * phi.sin(), r * eta.sinh())
}

/// A straight track from the origin with one hit per radius.
pub(crate) fn line_track(
    seed: u64,
    p: f64,
    phi: f64,
    eta: f64,
    hits: Vec<Hit>,
    covariance: StateCovariance,
) -> Track {
    let momentum = unit_direction(phi, eta) * p;
    let state_at = |hit: &Hit| {
        let r = hit.position.xy().norm();
        TrackState::from_global(Surface::Cylinder { radius: r }, hit.position, momentum, 1, covariance)
            .expect("fixture state")
    };
    let innermost_state = state_at(hits.first().expect("fixture hits"));
    let outermost_state = state_at(hits.last().expect("fixture hits"));
    Track {
        id: TrackId::from_seed(seed),
        charge: 1,
        reference_point: Vector3::zeros(),
        momentum,
        innermost_state,
        outermost_state,
        hits,
        chi2: 0.0,
        ndof: 0,
    }
}

pub(crate) fn muon_covariance() -> StateCovariance {
    StateCovariance::from_diagonal(&nalgebra::Vector5::new(1e-3, 1e-3, 1e-3, 1.0, 1.0))
}

pub(crate) fn tracker_covariance() -> StateCovariance {
    StateCovariance::from_diagonal(&nalgebra::Vector5::new(1e-5, 1e-5, 1e-5, 1e-2, 1e-2))
}

/// Standalone muon with one 2-D drift-tube hit per barrel station.
pub(crate) fn barrel_muon(seed: u64, p: f64, phi: f64, eta: f64) -> Track {
    let hits = MUON_RADII
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Hit::new(
                HitId(seed * 100 + i as u64),
                DetectorId::new(Subsystem::Dt, i as u8 + 1, 0),
                point_at_radius(*r, phi, eta),
                0.1,
                2,
            )
        })
        .collect();
    line_track(seed, p, phi, eta, hits, muon_covariance())
}

/// Tracker track with one 2-D hit per tracker layer.
pub(crate) fn barrel_tracker_track(seed: u64, p: f64, phi: f64, eta: f64) -> Track {
    let hits = TRACKER_RADII
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Hit::new(
                HitId(seed * 100 + i as u64),
                DetectorId::tracker(i as u32),
                point_at_radius(*r, phi, eta),
                0.01,
                2,
            )
        })
        .collect();
    line_track(seed, p, phi, eta, hits, tracker_covariance())
}

/// A muon-system hit at the given position.
pub(crate) fn muon_hit(id: u64, subsystem: Subsystem, station: u8, position: Vector3<f64>, dimension: u8) -> Hit {
    Hit::new(HitId(id), DetectorId::new(subsystem, station, 0), position, 0.1, dimension)
}

/// Trajectory through `hits` with the given per-hit estimates.
pub(crate) fn trajectory_with(hits: Vec<(Hit, f64)>, direction: TraversalDirection) -> Trajectory {
    let momentum = Vector3::new(5.0, 0.0, 0.0);
    let chi2 = hits.iter().map(|(_, e)| e).sum();
    let measurements = hits
        .into_iter()
        .map(|(hit, estimate)| {
            let r = hit.position.xy().norm().max(1.0);
            let state = TrackState::from_global(
                Surface::Cylinder { radius: r },
                hit.position,
                momentum,
                1,
                StateCovariance::identity(),
            )
            .expect("fixture state");
            Measurement::new(state, hit, estimate)
        })
        .collect();
    Trajectory::new(measurements, chi2, direction).expect("fixture trajectory")
}

/// Trajectory with a given χ² and `n` valid 2-D hits.
pub(crate) fn trajectory_with_chi2(chi2: f64, n: usize) -> Trajectory {
    let hits = (0..n)
        .map(|i| {
            let hit = muon_hit(i as u64, Subsystem::Dt, 1, Vector3::new(400.0 + i as f64, 0.0, 0.0), 2);
            (hit, chi2 / n as f64)
        })
        .collect();
    trajectory_with(hits, TraversalDirection::InsideOut)
}
