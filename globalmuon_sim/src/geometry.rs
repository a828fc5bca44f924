//! Simplified detector layout for the simulation.
//!
//! Field-free world: tracks are straight lines. The tracker is a set of
//! barrel cylinders; the muon system has drift-tube and resistive-plate
//! barrel stations and cathode-strip endcap disks. Material between the
//! tracker boundary and the first muon station is lumped into a single
//! scattering layer.

use std::collections::HashMap;

use globalmuon_env::{DetectorId, LayerId, Subsystem, Surface};
use nalgebra::Vector3;

// ============================================================================
// LAYOUT (cm)
// ============================================================================

pub const TRACKER_RADII: [f64; 13] = [
    4.4, 7.3, 10.2, 25.5, 33.9, 41.8, 49.8, 60.8, 69.2, 78.0, 86.8, 96.5, 108.0,
];

/// Barrel tracker half-length; long enough to cover |η| < 2.1 at the outer layer
pub const TRACKER_HALF_LENGTH: f64 = 450.0;

/// Tracker boundary, the matching surface
pub const BOUNDARY_RADIUS: f64 = 120.0;

pub const DT_RADII: [f64; 4] = [420.0, 500.0, 610.0, 720.0];
pub const RPC_RADII: [f64; 2] = [440.0, 520.0];
pub const BARREL_HALF_LENGTH: f64 = 650.0;

pub const CSC_Z: [f64; 4] = [680.0, 790.0, 920.0, 1040.0];
pub const CSC_R_MIN: f64 = 100.0;
pub const CSC_R_MAX: f64 = 690.0;

/// Lumped scattering layer (calorimeters + solenoid)
pub const KINK_RADIUS: f64 = 270.0;
pub const KINK_Z: f64 = 560.0;

/// Radiation-length equivalent path through the lumped material
pub const MATERIAL_THICKNESS: f64 = 300.0;

/// Scattering strength: θ₀² = K·L/p² (GeV², cm)
pub const SCATTERING_K: f64 = 1.5e-5;

const TRACKER_SIGMA: f64 = 0.003;
const CHAMBER_SIGMA: f64 = 0.1;
const RPC_SIGMA: f64 = 0.8;

const EPS: f64 = 1e-9;

/// Multiple-scattering angle variance after a path `length` at momentum `p`.
pub fn scattering_variance(p: f64, length: f64) -> f64 {
    SCATTERING_K * length / (p * p)
}

/// Signed path lengths from `origin` along unit `direction` to `surface`.
pub fn intersections(origin: &Vector3<f64>, direction: &Vector3<f64>, surface: &Surface) -> Vec<f64> {
    match *surface {
        Surface::Cylinder { radius } => {
            let a = direction.xy().norm_squared();
            if a < EPS {
                return Vec::new();
            }
            let b = 2.0 * origin.xy().dot(&direction.xy());
            let c = origin.xy().norm_squared() - radius * radius;
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return Vec::new();
            }
            let sq = disc.sqrt();
            vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        }
        Surface::Disk { z } => {
            if direction.z.abs() < EPS {
                return Vec::new();
            }
            vec![(z - origin.z) / direction.z]
        }
    }
}

/// One sensitive layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub detector: DetectorId,
    pub surface: Surface,

    /// Active extent: z range on a cylinder, r range on a disk
    pub extent: (f64, f64),

    /// Single-hit resolution (cm)
    pub sigma: f64,

    pub dimension: u8,
}

impl Layer {
    fn covers(&self, point: &Vector3<f64>) -> bool {
        let coordinate = match self.surface {
            Surface::Cylinder { .. } => point.z,
            Surface::Disk { .. } => point.xy().norm(),
        };
        coordinate >= self.extent.0 && coordinate <= self.extent.1
    }
}

/// A line crossing a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub layer: LayerId,

    /// Unsigned path length from the line origin
    pub path: f64,

    pub point: Vector3<f64>,
}

#[derive(Debug, Clone)]
pub struct SimGeometry {
    layers: Vec<Layer>,
    index: HashMap<LayerId, usize>,
    by_detector: HashMap<DetectorId, LayerId>,
}

impl Default for SimGeometry {
    fn default() -> Self {
        Self::standard()
    }
}

impl SimGeometry {
    pub fn new(layers: Vec<Layer>) -> Self {
        let index = layers.iter().enumerate().map(|(i, l)| (l.id, i)).collect();
        let by_detector = layers.iter().map(|l| (l.detector, l.id)).collect();
        Self {
            layers,
            index,
            by_detector,
        }
    }

    /// The default barrel + endcap layout.
    pub fn standard() -> Self {
        let mut layers = Vec::new();

        for (i, radius) in TRACKER_RADII.iter().enumerate() {
            layers.push(Layer {
                id: LayerId(i as u32),
                detector: DetectorId::tracker(i as u32),
                surface: Surface::Cylinder { radius: *radius },
                extent: (-TRACKER_HALF_LENGTH, TRACKER_HALF_LENGTH),
                sigma: TRACKER_SIGMA,
                dimension: 2,
            });
        }

        for (i, radius) in DT_RADII.iter().enumerate() {
            let station = i as u8 + 1;
            layers.push(Layer {
                id: LayerId(100 + u32::from(station)),
                detector: DetectorId::new(Subsystem::Dt, station, 0),
                surface: Surface::Cylinder { radius: *radius },
                extent: (-BARREL_HALF_LENGTH, BARREL_HALF_LENGTH),
                sigma: CHAMBER_SIGMA,
                dimension: 2,
            });
        }

        for (i, radius) in RPC_RADII.iter().enumerate() {
            let station = i as u8 + 1;
            layers.push(Layer {
                id: LayerId(200 + u32::from(station)),
                detector: DetectorId::new(Subsystem::Rpc, station, 0),
                surface: Surface::Cylinder { radius: *radius },
                extent: (-BARREL_HALF_LENGTH, BARREL_HALF_LENGTH),
                sigma: RPC_SIGMA,
                dimension: 1,
            });
        }

        // chamber 0 is the +z endcap, 1 the -z endcap
        for (endcap, sign) in [(0u32, 1.0), (1u32, -1.0)] {
            for (i, z) in CSC_Z.iter().enumerate() {
                let station = i as u8 + 1;
                layers.push(Layer {
                    id: LayerId(300 + 100 * endcap + u32::from(station)),
                    detector: DetectorId::new(Subsystem::Csc, station, endcap),
                    surface: Surface::Disk { z: sign * z },
                    extent: (CSC_R_MIN, CSC_R_MAX),
                    sigma: CHAMBER_SIGMA,
                    dimension: 2,
                });
            }
        }

        Self::new(layers)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.index.get(&id).map(|i| &self.layers[*i])
    }

    pub fn layer_of(&self, detector: DetectorId) -> Option<LayerId> {
        self.by_detector.get(&detector).copied()
    }

    /// Layers crossed by the line from `origin` along unit `direction`,
    /// nearest first. `forward` selects the sign of the path.
    pub fn crossings(&self, origin: &Vector3<f64>, direction: &Vector3<f64>, forward: bool) -> Vec<Crossing> {
        let mut found: Vec<Crossing> = self
            .layers
            .iter()
            .flat_map(|layer| {
                intersections(origin, direction, &layer.surface)
                    .into_iter()
                    .filter(move |t| if forward { *t > EPS } else { *t < -EPS })
                    .map(move |t| (layer, t))
            })
            .filter_map(|(layer, t)| {
                let point = origin + direction * t;
                layer.covers(&point).then(|| Crossing {
                    layer: layer.id,
                    path: t.abs(),
                    point,
                })
            })
            .collect();
        found.sort_by(|a, b| a.path.total_cmp(&b.path));
        found
    }

    /// Point where a line from `origin` enters the lumped scattering layer.
    pub fn kink_point(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<Vector3<f64>> {
        let surfaces = [
            Surface::Cylinder { radius: KINK_RADIUS },
            Surface::Disk { z: KINK_Z },
            Surface::Disk { z: -KINK_Z },
        ];
        surfaces
            .iter()
            .flat_map(|s| intersections(origin, direction, s))
            .filter(|t| *t > EPS)
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| origin + direction * t)
    }

    /// Distance of a point beyond the scattering layer along its ray from
    /// the origin; zero inside.
    pub fn depth_beyond_kink(&self, point: &Vector3<f64>) -> f64 {
        let distance = point.norm();
        if distance < EPS {
            return 0.0;
        }
        let direction = point / distance;
        match self.kink_point(&Vector3::zeros(), &direction) {
            Some(kink) => (distance - kink.norm()).max(0.0),
            None => 0.0,
        }
    }

    /// Surface a hit at `point` on `detector` lies on.
    pub fn measurement_surface(&self, detector: DetectorId, point: &Vector3<f64>) -> Surface {
        match self.layer_of(detector).and_then(|id| self.layer(id)) {
            Some(layer) => layer.surface,
            None => Surface::Cylinder {
                radius: point.xy().norm(),
            },
        }
    }
}
