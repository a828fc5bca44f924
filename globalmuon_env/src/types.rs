//! Common identifier and geometry types shared by the reconstruction engines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a reconstructed track.
///
/// Identity of a track is authoritative: candidates built from it refer back
/// through this id, never through a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Creates a new random TrackId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic TrackId from a seed (for simulation and tests).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell tracks apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identifier of a single position measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitId(pub u64);

/// Identifier of a navigable detector layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u32);

/// Detection subsystem a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Inner high-resolution tracker
    Tracker,
    /// Drift tubes (muon barrel)
    Dt,
    /// Cathode strip chambers (muon endcap)
    Csc,
    /// Resistive plate chambers (muon trigger, barrel and endcap)
    Rpc,
}

impl Subsystem {
    /// True for the outer (muon) detection systems.
    pub fn is_muon(&self) -> bool {
        !matches!(self, Subsystem::Tracker)
    }
}

/// Ownership-free reference to a detector element.
///
/// `station` is the ordinal subdivision used for occupancy accounting
/// (1..=4 for muon stations, 0 inside the tracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectorId {
    pub subsystem: Subsystem,
    pub station: u8,
    pub chamber: u32,
}

impl DetectorId {
    pub fn new(subsystem: Subsystem, station: u8, chamber: u32) -> Self {
        Self { subsystem, station, chamber }
    }

    /// Tracker element on the given layer.
    pub fn tracker(layer: u32) -> Self {
        Self::new(Subsystem::Tracker, 0, layer)
    }

    pub fn is_muon(&self) -> bool {
        self.subsystem.is_muon()
    }

    /// Station number for drift-tube and cathode-strip chambers only.
    ///
    /// RPC and tracker elements have no station in the first-hit logic.
    pub fn chamber_station(&self) -> Option<u8> {
        match self.subsystem {
            Subsystem::Dt | Subsystem::Csc => Some(self.station),
            _ => None,
        }
    }
}

/// Reference surface on which track states are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Barrel cylinder around the beam line, radius in cm
    Cylinder { radius: f64 },
    /// Endcap disk perpendicular to the beam line at position z (cm)
    Disk { z: f64 },
}

impl Surface {
    /// Length of the azimuthal period of the `u` coordinate, if any.
    ///
    /// On a cylinder `u = R·φ` wraps every `2πR`; on a disk it does not wrap.
    pub fn u_period(&self) -> Option<f64> {
        match self {
            Surface::Cylinder { radius } => Some(2.0 * std::f64::consts::PI * radius),
            Surface::Disk { .. } => None,
        }
    }
}

/// Direction semantics for a single propagation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationDirection {
    AlongMomentum,
    OppositeToMomentum,
    Any,
}

/// Order in which hits of a trajectory are traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    InsideOut,
    OutsideIn,
}

impl TraversalDirection {
    /// Propagation direction that follows this traversal order.
    pub fn propagation(&self) -> PropagationDirection {
        match self {
            TraversalDirection::InsideOut => PropagationDirection::AlongMomentum,
            TraversalDirection::OutsideIn => PropagationDirection::OppositeToMomentum,
        }
    }
}

/// Wrap an angle into (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_track_id_from_seed_is_deterministic() {
        assert_eq!(TrackId::from_seed(7), TrackId::from_seed(7));
        assert_ne!(TrackId::from_seed(7), TrackId::from_seed(8));
    }

    #[test]
    fn test_chamber_station_excludes_rpc() {
        assert_eq!(DetectorId::new(Subsystem::Dt, 2, 0).chamber_station(), Some(2));
        assert_eq!(DetectorId::new(Subsystem::Csc, 3, 0).chamber_station(), Some(3));
        assert_eq!(DetectorId::new(Subsystem::Rpc, 1, 0).chamber_station(), None);
        assert!(!DetectorId::tracker(4).is_muon());
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(0.3), 0.3, epsilon = 1e-12);
    }
}
