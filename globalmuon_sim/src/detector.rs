//! Simulated detector services implementing [`DetectorContext`].
//!
//! One `SimDetector` holds the hits of one event on top of a shared
//! geometry. Propagation is along straight lines with covariance growth
//! from the transported angular error plus multiple scattering. The
//! refitter is a weighted least-squares line fit in which muon hits beyond
//! the scattering layer get their resolution widened by the expected
//! scattering displacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use globalmuon_env::{
    DetectorContext, DetectorId, Hit, LayerId, LayerNavigator, Measurement, PropagationDirection, Propagator,
    Refitter, StateCovariance, Surface, TrackState, Trajectory, TraversalDirection, IDX_PHI, IDX_THETA, IDX_U,
    IDX_V,
};
use nalgebra::{Matrix3, SymmetricEigen, Vector3, Vector5};
use tracing::debug;

use crate::geometry::{intersections, scattering_variance, SimGeometry, BOUNDARY_RADIUS, MATERIAL_THICKNESS};

/// Relative momentum error attached to refitted states (a line fit has no
/// curvature information)
const REFIT_MOMENTUM_ERROR: f64 = 0.05;

const EPS: f64 = 1e-9;

pub struct SimDetector {
    geometry: Arc<SimGeometry>,
    hits: HashMap<LayerId, Vec<Hit>>,
    propagations: AtomicUsize,
    refits: AtomicUsize,
}

impl SimDetector {
    pub fn new(geometry: Arc<SimGeometry>) -> Self {
        Self {
            geometry,
            hits: HashMap::new(),
            propagations: AtomicUsize::new(0),
            refits: AtomicUsize::new(0),
        }
    }

    /// Store the event's hits by layer. Hits on unknown detectors are dropped.
    pub fn with_hits<'a>(mut self, hits: impl IntoIterator<Item = &'a Hit>) -> Self {
        for hit in hits {
            match self.geometry.layer_of(hit.detector) {
                Some(layer) => self.hits.entry(layer).or_default().push(hit.clone()),
                None => debug!("Hit {:?} on unknown detector {:?}", hit.id, hit.detector),
            }
        }
        self
    }

    pub fn geometry(&self) -> &SimGeometry {
        &self.geometry
    }

    pub fn propagation_calls(&self) -> usize {
        self.propagations.load(Ordering::Relaxed)
    }

    pub fn refit_calls(&self) -> usize {
        self.refits.load(Ordering::Relaxed)
    }

    /// Hit variance including the scattering displacement expected at
    /// momentum `p`.
    fn effective_variance(&self, hit: &Hit, p: f64) -> f64 {
        let depth = self.geometry.depth_beyond_kink(&hit.position);
        hit.sigma * hit.sigma + scattering_variance(p, MATERIAL_THICKNESS) * depth * depth
    }

    /// Residual of a hit against the point of closest approach on the line.
    /// 1-D hits only measure the azimuthal coordinate.
    fn residual(hit: &Hit, on_line: &Vector3<f64>) -> f64 {
        let delta = hit.position - on_line;
        if hit.dimension >= 2 {
            return delta.norm();
        }
        let rho = hit.position.xy().norm();
        if rho < EPS {
            return delta.norm();
        }
        let phi_hat = Vector3::new(-hit.position.y / rho, hit.position.x / rho, 0.0);
        delta.dot(&phi_hat)
    }

    fn fit_line(&self, seed: &TrackState, hits: &[Hit], direction: TraversalDirection) -> Option<Trajectory> {
        let p = seed.momentum_magnitude();
        let weighted: Vec<(&Hit, f64)> = hits
            .iter()
            .filter(|h| h.valid)
            .map(|h| (h, 1.0 / self.effective_variance(h, p)))
            .collect();
        if weighted.len() < 2 {
            return None;
        }

        let weight_sum: f64 = weighted.iter().map(|(_, w)| w).sum();
        let centroid = weighted
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, (h, w)| acc + h.position * *w)
            / weight_sum;

        let scatter = weighted.iter().fold(Matrix3::<f64>::zeros(), |acc, (h, w)| {
            let d = h.position - centroid;
            acc + d * d.transpose() * *w
        });
        let eigen = SymmetricEigen::new(scatter);
        let (axis_index, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        let mut axis: Vector3<f64> = eigen.eigenvectors.column(axis_index).into_owned();
        if axis.dot(&seed.direction()) < 0.0 {
            axis = -axis;
        }

        let spread: f64 = weighted
            .iter()
            .map(|(h, w)| w * (h.position - centroid).dot(&axis).powi(2))
            .sum();
        if spread < EPS {
            return None;
        }
        let angle_variance = 1.0 / spread;
        let qop_variance = (REFIT_MOMENTUM_ERROR * seed.q_over_p()).powi(2);

        let mut chi2 = 0.0;
        let mut measurements = Vec::with_capacity(hits.len());
        for hit in hits {
            let s = (hit.position - centroid).dot(&axis);
            let on_line = centroid + axis * s;
            let estimate = if hit.valid {
                Self::residual(hit, &on_line).powi(2) / self.effective_variance(hit, p)
            } else {
                0.0
            };
            chi2 += estimate;

            let position_variance = 1.0 / weight_sum + s * s * angle_variance;
            let covariance = StateCovariance::from_diagonal(&Vector5::new(
                qop_variance,
                angle_variance,
                angle_variance,
                position_variance,
                position_variance,
            ));
            let surface = self.geometry.measurement_surface(hit.detector, &hit.position);
            let state = TrackState::from_global(surface, on_line, axis * p, seed.charge(), covariance).ok()?;
            measurements.push(Measurement::new(state, hit.clone(), estimate));
        }

        Trajectory::new(measurements, chi2, direction).ok()
    }
}

/// Covariance after a straight path of `length`: angular errors move the
/// position, scattering adds to both.
fn transport_covariance(state: &TrackState, length: f64) -> StateCovariance {
    let p = state.momentum_magnitude();
    let mut covariance = *state.covariance();
    let sin_theta = state.parameters()[IDX_THETA].sin();

    let angular = (covariance[(IDX_PHI, IDX_PHI)] * sin_theta * sin_theta).max(covariance[(IDX_THETA, IDX_THETA)]);
    let scattering = scattering_variance(p, length);
    let position = length * length * (angular + scattering / 3.0);

    covariance[(IDX_PHI, IDX_PHI)] += scattering;
    covariance[(IDX_THETA, IDX_THETA)] += scattering;
    covariance[(IDX_U, IDX_U)] += position;
    covariance[(IDX_V, IDX_V)] += position;
    covariance
}

impl Propagator for SimDetector {
    fn propagate(&self, state: &TrackState, target: &Surface, direction: PropagationDirection) -> Option<TrackState> {
        self.propagations.fetch_add(1, Ordering::Relaxed);

        let origin = state.global_position();
        let dir = state.direction();
        let roots = intersections(&origin, &dir, target).into_iter();
        let t = match direction {
            PropagationDirection::AlongMomentum => roots.filter(|t| *t >= -EPS).min_by(|a, b| a.total_cmp(b)),
            PropagationDirection::OppositeToMomentum => roots.filter(|t| *t <= EPS).max_by(|a, b| a.total_cmp(b)),
            PropagationDirection::Any => roots.min_by(|a, b| a.abs().total_cmp(&b.abs())),
        }?;

        TrackState::from_global(
            *target,
            origin + dir * t,
            state.global_momentum(),
            state.charge(),
            transport_covariance(state, t.abs()),
        )
        .ok()
    }
}

impl Refitter for SimDetector {
    fn refit(&self, seed: &TrackState, hits: &[Hit], direction: TraversalDirection) -> Vec<Trajectory> {
        self.refits.fetch_add(1, Ordering::Relaxed);
        self.fit_line(seed, hits, direction).into_iter().collect()
    }
}

impl LayerNavigator for SimDetector {
    fn layer_of(&self, detector: DetectorId) -> Option<LayerId> {
        self.geometry.layer_of(detector)
    }

    fn hits_on_layer(&self, layer: LayerId) -> Vec<Hit> {
        self.hits.get(&layer).cloned().unwrap_or_default()
    }

    fn next_layers(&self, state: &TrackState, direction: PropagationDirection) -> Vec<LayerId> {
        let origin = state.global_position();
        let dir = state.direction();
        let mut crossings = match direction {
            PropagationDirection::AlongMomentum => self.geometry.crossings(&origin, &dir, true),
            PropagationDirection::OppositeToMomentum => self.geometry.crossings(&origin, &dir, false),
            PropagationDirection::Any => {
                let mut both = self.geometry.crossings(&origin, &dir, true);
                both.extend(self.geometry.crossings(&origin, &dir, false));
                both.sort_by(|a, b| a.path.total_cmp(&b.path));
                both
            }
        };
        crossings.dedup_by_key(|c| c.layer);
        crossings.into_iter().map(|c| c.layer).collect()
    }
}

impl DetectorContext for SimDetector {
    fn tracker_boundary(&self) -> Surface {
        Surface::Cylinder {
            radius: BOUNDARY_RADIUS,
        }
    }
}
