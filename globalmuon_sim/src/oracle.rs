//! Ground truth oracle for simulation.
//!
//! The Oracle generates events from a single physics seed:
//! - True muons (straight lines from a smeared vertex, one scattering kink)
//! - The tracker track and standalone muon each true muon leaves behind
//! - Background tracker tracks and noise hits in the muon stations

use std::sync::Arc;

use globalmuon_core::{EventInput, TrackCandidate};
use globalmuon_env::{Hit, HitId, StateCovariance, Subsystem, Surface, Track, TrackId, TrackState};
use nalgebra::{Vector3, Vector5};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::detector::SimDetector;
use crate::geometry::{scattering_variance, Crossing, SimGeometry, MATERIAL_THICKNESS};

/// Relative momentum and absolute angle/position resolutions of a track
/// state: `[σ(q/p)/|q/p|, σφ, σθ, σu, σv]`.
type Resolution = [f64; 5];

const STANDALONE_RESOLUTION: Resolution = [0.15, 0.01, 0.01, 1.41, 1.41];
const TRACKER_RESOLUTION: Resolution = [0.02, 0.001, 0.001, 0.1, 0.1];

/// Reference-point z resolution of the two track types (cm)
const TRACKER_Z0_SIGMA: f64 = 0.01;
const STANDALONE_Z0_SIGMA: f64 = 5.0;

/// Displacement range of a wrongly assigned muon hit (cm)
const MISASSIGNED_OFFSET: (f64, f64) = (3.0, 8.0);

/// Half-width of the window noise hits are thrown in around a track hit (cm)
const NOISE_WINDOW: f64 = 6.0;

const MIN_TRACKER_HITS: usize = 3;
const MIN_MUON_HITS: usize = 2;

/// What one event looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSpec {
    /// Number of true muons (default: 1)
    pub muons: usize,

    /// Muon momentum range in GeV (default: 5-50)
    pub momentum_range: (f64, f64),

    /// Range of |η| for muons (default: 0-2.1)
    pub eta_range: (f64, f64),

    /// Extra tracker tracks without a muon (default: 0)
    pub background_tracks: usize,

    /// Background momentum range in GeV (default: 1-10)
    pub background_momentum: (f64, f64),

    /// Half-width in η and φ of the cone around the first muon that
    /// background tracks are thrown in; anywhere when unset (default: none)
    pub jet_cone: Option<f64>,

    /// Noise hits added next to every muon hit (default: 0)
    pub noise_hits_per_station: usize,

    /// Probability that a standalone muon carries a displaced hit in a
    /// station (default: 0)
    pub misassigned_hit_probability: f64,

    /// Longitudinal vertex spread (default: 5.3 cm)
    pub vertex_sigma_z: f64,
}

impl Default for EventSpec {
    fn default() -> Self {
        Self {
            muons: 1,
            momentum_range: (5.0, 50.0),
            eta_range: (0.0, 2.1),
            background_tracks: 0,
            background_momentum: (1.0, 10.0),
            jet_cone: None,
            noise_hits_per_station: 0,
            misassigned_hit_probability: 0.0,
            vertex_sigma_z: 5.3,
        }
    }
}

/// A generated muon and the tracks it left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthMuon {
    pub charge: i8,
    pub momentum: Vector3<f64>,
    pub vertex: Vector3<f64>,

    /// Standalone reconstruction, if enough stations were hit
    pub muon_track: Option<TrackId>,

    /// Tracker reconstruction, if enough layers were hit
    pub tracker_track: Option<TrackId>,
}

impl TruthMuon {
    /// Both halves were reconstructed, so a global muon is expected.
    pub fn is_reconstructable(&self) -> bool {
        self.muon_track.is_some() && self.tracker_track.is_some()
    }
}

/// One generated event.
#[derive(Debug, Clone)]
pub struct SimEvent {
    pub index: u64,
    pub truth: Vec<TruthMuon>,
    pub input: EventInput,

    /// Every hit recorded in the event, noise included
    pub hits: Vec<Hit>,
}

impl SimEvent {
    /// Detector services holding this event's hits.
    pub fn detector(&self, geometry: Arc<SimGeometry>) -> SimDetector {
        SimDetector::new(geometry).with_hits(&self.hits)
    }

    /// The tracker track produced by the same true muon as `muon`.
    pub fn truth_partner(&self, muon: TrackId) -> Option<TrackId> {
        self.truth
            .iter()
            .find(|t| t.muon_track == Some(muon))
            .and_then(|t| t.tracker_track)
    }
}

fn unit_direction(phi: f64, eta: f64) -> Vector3<f64> {
    Vector3::new(phi.cos() / eta.cosh(), phi.sin() / eta.cosh(), eta.tanh())
}

fn covariance_for(resolution: &Resolution, q_over_p: f64) -> StateCovariance {
    StateCovariance::from_diagonal(&Vector5::new(
        (resolution[0] * q_over_p).powi(2),
        resolution[1].powi(2),
        resolution[2].powi(2),
        resolution[3].powi(2),
        resolution[4].powi(2),
    ))
}

/// The Oracle - generates events and remembers what is true.
pub struct Oracle {
    /// RNG for physics (kinematics, smearing, noise)
    physics_rng: ChaCha8Rng,

    geometry: Arc<SimGeometry>,

    /// Multiplies every smearing width and the scattering kink; 0 gives a
    /// perfect detector
    resolution_scale: f64,

    next_hit: u64,
    next_track: u64,
    next_event: u64,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    pub fn new(physics_seed: u64, geometry: Arc<SimGeometry>) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            geometry,
            resolution_scale: 1.0,
            next_hit: 0,
            next_track: 0,
            next_event: 0,
        }
    }

    pub fn with_resolution_scale(mut self, scale: f64) -> Self {
        self.resolution_scale = scale;
        self
    }

    pub fn geometry(&self) -> &Arc<SimGeometry> {
        &self.geometry
    }

    fn gauss(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.physics_rng.sample(StandardNormal);
        z * sigma * self.resolution_scale
    }

    fn uniform(&mut self, range: (f64, f64)) -> f64 {
        if range.1 > range.0 {
            self.physics_rng.gen_range(range.0..range.1)
        } else {
            range.0
        }
    }

    fn random_charge(&mut self) -> i8 {
        if self.physics_rng.gen_bool(0.5) {
            1
        } else {
            -1
        }
    }

    fn new_hit_id(&mut self) -> HitId {
        let id = HitId(self.next_hit);
        self.next_hit += 1;
        id
    }

    fn new_track_id(&mut self) -> TrackId {
        let id = TrackId::from_seed(self.next_track);
        self.next_track += 1;
        id
    }

    /// Generate one event.
    pub fn generate_event(&mut self, spec: &EventSpec) -> SimEvent {
        let index = self.next_event;
        self.next_event += 1;

        let mut truth = Vec::with_capacity(spec.muons);
        let mut muons = Vec::new();
        let mut tracker_tracks = Vec::new();
        let mut hits = Vec::new();
        let mut first_direction = None;

        for _ in 0..spec.muons {
            let phi = self.uniform((-std::f64::consts::PI, std::f64::consts::PI));
            let abs_eta = self.uniform(spec.eta_range);
            let eta = if self.physics_rng.gen_bool(0.5) { abs_eta } else { -abs_eta };
            let p = self.uniform(spec.momentum_range);
            let charge = self.random_charge();
            let vertex = Vector3::new(0.0, 0.0, self.physics_rng.sample::<f64, _>(StandardNormal) * spec.vertex_sigma_z);
            let momentum = unit_direction(phi, eta) * p;
            first_direction.get_or_insert((phi, eta));

            let tracker = self.tracker_track(charge, &momentum, &vertex, &mut hits);
            let standalone = self.standalone_muon(charge, &momentum, &vertex, spec, &mut hits);

            truth.push(TruthMuon {
                charge,
                momentum,
                vertex,
                muon_track: standalone.as_ref().map(|t| t.id),
                tracker_track: tracker.as_ref().map(|t| t.id),
            });
            if let Some(track) = standalone {
                muons.push(TrackCandidate::new(Arc::new(track)));
            }
            if let Some(track) = tracker {
                tracker_tracks.push(TrackCandidate::new(Arc::new(track)));
            }
        }

        for _ in 0..spec.background_tracks {
            let (phi, eta) = match (spec.jet_cone, first_direction) {
                (Some(cone), Some((phi0, eta0))) => (
                    phi0 + self.uniform((-cone, cone)),
                    eta0 + self.uniform((-cone, cone)),
                ),
                _ => (
                    self.uniform((-std::f64::consts::PI, std::f64::consts::PI)),
                    self.uniform((-2.1, 2.1)),
                ),
            };
            let p = self.uniform(spec.background_momentum);
            let charge = self.random_charge();
            let vertex = Vector3::new(0.0, 0.0, self.physics_rng.sample::<f64, _>(StandardNormal) * spec.vertex_sigma_z);
            if let Some(track) = self.tracker_track(charge, &(unit_direction(phi, eta) * p), &vertex, &mut hits) {
                tracker_tracks.push(TrackCandidate::new(Arc::new(track)));
            }
        }

        tracker_tracks.shuffle(&mut self.physics_rng);

        SimEvent {
            index,
            truth,
            input: EventInput { muons, tracker_tracks },
            hits,
        }
    }

    /// Smear the true state on `surface` with `resolution`; the covariance
    /// always carries the nominal resolution.
    fn measured_state(
        &mut self,
        surface: Surface,
        point: &Vector3<f64>,
        momentum: &Vector3<f64>,
        charge: i8,
        resolution: &Resolution,
    ) -> Option<TrackState> {
        let exact = TrackState::from_global(surface, *point, *momentum, charge, StateCovariance::identity()).ok()?;
        let mut parameters = *exact.parameters();
        let q_over_p = exact.q_over_p();
        parameters[0] += self.gauss(resolution[0] * q_over_p.abs());
        for i in 1..5 {
            parameters[i] += self.gauss(resolution[i]);
        }
        TrackState::new(surface, parameters, covariance_for(resolution, q_over_p)).ok()
    }

    /// A measured hit at `crossing`, smeared within its layer.
    fn measured_hit(&mut self, crossing: &Crossing) -> Option<Hit> {
        let layer = self.geometry.layer(crossing.layer)?.clone();
        let (along_u, along_v) = surface_axes(&layer.surface, &crossing.point);
        let mut position = crossing.point + along_u * self.gauss(layer.sigma);
        if layer.dimension >= 2 {
            position += along_v * self.gauss(layer.sigma);
        }
        let id = self.new_hit_id();
        Some(Hit::new(id, layer.detector, position, layer.sigma, layer.dimension))
    }

    fn tracker_track(
        &mut self,
        charge: i8,
        momentum: &Vector3<f64>,
        vertex: &Vector3<f64>,
        event_hits: &mut Vec<Hit>,
    ) -> Option<Track> {
        let direction = momentum.normalize();
        let crossings: Vec<Crossing> = self
            .geometry
            .crossings(vertex, &direction, true)
            .into_iter()
            .filter(|c| self.is_subsystem(c, Subsystem::Tracker))
            .collect();
        if crossings.len() < MIN_TRACKER_HITS {
            return None;
        }

        let hits: Vec<Hit> = crossings.iter().filter_map(|c| self.measured_hit(c)).collect();
        let (first, last) = (crossings.first()?, crossings.last()?);
        let first_surface = self.geometry.layer(first.layer)?.surface;
        let last_surface = self.geometry.layer(last.layer)?.surface;
        let innermost_state = self.measured_state(first_surface, &first.point, momentum, charge, &TRACKER_RESOLUTION)?;
        let outermost_state = self.measured_state(last_surface, &last.point, momentum, charge, &TRACKER_RESOLUTION)?;

        event_hits.extend(hits.iter().cloned());
        let ndof = (2 * hits.len() as u32).saturating_sub(5);
        Some(Track {
            id: self.new_track_id(),
            charge,
            reference_point: Vector3::new(0.0, 0.0, vertex.z + self.gauss(TRACKER_Z0_SIGMA)),
            momentum: innermost_state.global_momentum(),
            innermost_state,
            outermost_state,
            hits,
            chi2: ndof as f64,
            ndof,
        })
    }

    fn standalone_muon(
        &mut self,
        charge: i8,
        momentum: &Vector3<f64>,
        vertex: &Vector3<f64>,
        spec: &EventSpec,
        event_hits: &mut Vec<Hit>,
    ) -> Option<Track> {
        let p = momentum.norm();
        let direction = momentum.normalize();
        let kink = self.geometry.kink_point(vertex, &direction)?;

        // one scattering kink in the lumped material
        let theta0 = scattering_variance(p, MATERIAL_THICKNESS).sqrt();
        let phi = direction.y.atan2(direction.x) + self.gauss(theta0);
        let theta = direction.xy().norm().atan2(direction.z) + self.gauss(theta0);
        let kinked = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());

        let crossings: Vec<Crossing> = self
            .geometry
            .crossings(&kink, &kinked, true)
            .into_iter()
            .filter(|c| !self.is_subsystem(c, Subsystem::Tracker))
            .collect();
        if crossings.len() < MIN_MUON_HITS {
            return None;
        }

        let mut hits = Vec::with_capacity(crossings.len());
        for crossing in &crossings {
            let Some(mut hit) = self.measured_hit(crossing) else {
                continue;
            };
            if spec.misassigned_hit_probability > 0.0 && self.physics_rng.gen_bool(spec.misassigned_hit_probability.min(1.0)) {
                let layer = self.geometry.layer(crossing.layer)?;
                let (along_u, _) = surface_axes(&layer.surface, &crossing.point);
                let sign = if self.physics_rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                hit.position += along_u * sign * self.uniform(MISASSIGNED_OFFSET);
            }
            for _ in 0..spec.noise_hits_per_station {
                let noise = self.noise_hit(&hit, crossing);
                event_hits.extend(noise);
            }
            hits.push(hit);
        }

        let (first, last) = (crossings.first()?, crossings.last()?);
        let first_surface = self.geometry.layer(first.layer)?.surface;
        let last_surface = self.geometry.layer(last.layer)?.surface;
        let kinked_momentum = kinked * p;
        let innermost_state =
            self.measured_state(first_surface, &first.point, &kinked_momentum, charge, &STANDALONE_RESOLUTION)?;
        let outermost_state =
            self.measured_state(last_surface, &last.point, &kinked_momentum, charge, &STANDALONE_RESOLUTION)?;

        event_hits.extend(hits.iter().cloned());
        let ndof = hits.iter().map(|h| u32::from(h.dimension)).sum::<u32>().saturating_sub(5);
        Some(Track {
            id: self.new_track_id(),
            charge,
            reference_point: Vector3::new(0.0, 0.0, vertex.z + self.gauss(STANDALONE_Z0_SIGMA)),
            momentum: innermost_state.global_momentum(),
            innermost_state,
            outermost_state,
            hits,
            chi2: ndof as f64,
            ndof,
        })
    }

    /// A noise hit on the same layer close to `hit`.
    fn noise_hit(&mut self, hit: &Hit, crossing: &Crossing) -> Option<Hit> {
        let layer = self.geometry.layer(crossing.layer)?.clone();
        let (along_u, along_v) = surface_axes(&layer.surface, &crossing.point);
        let mut position = hit.position + along_u * self.physics_rng.gen_range(-NOISE_WINDOW..NOISE_WINDOW);
        if layer.dimension >= 2 {
            position += along_v * self.physics_rng.gen_range(-NOISE_WINDOW..NOISE_WINDOW);
        }
        let id = self.new_hit_id();
        Some(Hit::new(id, layer.detector, position, layer.sigma, layer.dimension))
    }

    fn is_subsystem(&self, crossing: &Crossing, subsystem: Subsystem) -> bool {
        self.geometry
            .layer(crossing.layer)
            .is_some_and(|l| l.detector.subsystem == subsystem)
    }
}

/// Unit vectors spanning the surface at `point`: (φ̂, ẑ) on a cylinder,
/// (x̂, ŷ) on a disk.
fn surface_axes(surface: &Surface, point: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    match surface {
        Surface::Cylinder { .. } => {
            let rho = point.xy().norm().max(f64::EPSILON);
            (Vector3::new(-point.y / rho, point.x / rho, 0.0), Vector3::z())
        }
        Surface::Disk { .. } => (Vector3::x(), Vector3::y()),
    }
}
