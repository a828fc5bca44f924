//! Muon-system hits of a standalone track: ordering, the "first hits"
//! subset and per-station occupancy.

use globalmuon_env::{Hit, LayerNavigator, Subsystem};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of muon stations.
pub const STATIONS: usize = 4;

/// Cone (cm) around a drift-tube or cathode-strip hit for occupancy counting
const CHAMBER_CONE: f64 = 10.0;

/// Cone (cm) around a resistive-plate hit for occupancy counting
const RPC_CONE: f64 = 100.0;

/// Two 2-D drift-tube hits closer than this (cm) are the same hit
const DUPLICATE_DISTANCE: f64 = 0.01;

/// Maximum number of nearby hits seen in each muon station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationOccupancy([u32; STATIONS]);

impl StationOccupancy {
    pub fn new(counts: [u32; STATIONS]) -> Self {
        Self(counts)
    }

    /// Occupancy of a station (1..=4).
    pub fn get(&self, station: u8) -> Option<u32> {
        match station {
            1..=4 => Some(self.0[usize::from(station) - 1]),
            _ => None,
        }
    }

    /// Keep the larger of the stored and the new count. Stations outside
    /// 1..=4 are ignored.
    pub fn record(&mut self, station: u8, count: u32) {
        if matches!(station, 1..=4) {
            let slot = &mut self.0[usize::from(station) - 1];
            *slot = (*slot).max(count);
        }
    }

    /// Whether a station in 1..=4 has more than `threshold` hits.
    pub fn exceeds(&self, station: u8, threshold: u32) -> bool {
        self.get(station).is_some_and(|count| count > threshold)
    }

    pub fn counts(&self) -> [u32; STATIONS] {
        self.0
    }
}

/// Muon hits of one standalone track, ready to be merged into refits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedMuonHits {
    /// All valid muon hits, inside-out
    pub all: Vec<Hit>,

    /// Hits up to the end of the first drift-tube/cathode-strip station
    pub first: Vec<Hit>,

    pub occupancy: StationOccupancy,
}

/// Put hits in inside-out order if they are stored outside-in.
///
/// Returns true when the order was changed.
pub fn order_inside_out(hits: &mut [Hit]) -> bool {
    match (hits.first(), hits.last()) {
        (Some(first), Some(last)) if first.distance_from_origin() > last.distance_from_origin() => {
            hits.sort_by(|a, b| a.distance_from_origin().total_cmp(&b.distance_from_origin()));
            true
        }
        _ => false,
    }
}

/// Hits up to and including the last hit of the first DT/CSC station.
///
/// The run ends when the following hit lies in a later station or is not a
/// DT/CSC hit. Empty when no DT/CSC hit closes a run.
pub fn first_station_hits(hits: &[Hit]) -> Vec<Hit> {
    let mut first = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        first.push(hit.clone());
        let Some(station) = hit.detector.chamber_station() else {
            continue;
        };
        match hits.get(i + 1) {
            Some(next) => match next.detector.chamber_station() {
                None => return first,
                Some(next_station) if next_station > station => return first,
                Some(_) => {}
            },
            None => return first,
        }
    }
    Vec::new()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MuonHitCollector;

impl MuonHitCollector {
    pub fn new() -> Self {
        Self
    }

    /// Gather the valid muon hits of a standalone track.
    ///
    /// Occupancy is only measured when `measure_occupancy` is set, since it
    /// costs one layer lookup per hit.
    pub fn collect<C>(&self, ctx: &C, hits: &[Hit], measure_occupancy: bool) -> CollectedMuonHits
    where
        C: LayerNavigator + ?Sized,
    {
        let mut occupancy = StationOccupancy::default();
        let mut all = Vec::new();

        for hit in hits.iter().filter(|h| h.valid && h.is_muon()) {
            if measure_occupancy {
                if let Some(count) = self.hits_in_cone(ctx, hit) {
                    occupancy.record(hit.detector.station, count);
                }
            }
            all.push(hit.clone());
        }

        if measure_occupancy {
            debug!("Station occupancy: {:?}", occupancy.counts());
        }
        if order_inside_out(&mut all) {
            debug!("Muon hits stored outside-in, reordered");
        }

        let first = first_station_hits(&all);
        CollectedMuonHits { all, first, occupancy }
    }

    /// Number of hits on the same layer within the subsystem's cone.
    fn hits_in_cone<C>(&self, ctx: &C, hit: &Hit) -> Option<u32>
    where
        C: LayerNavigator + ?Sized,
    {
        let layer = ctx.layer_of(hit.detector)?;
        let layer_hits = ctx.hits_on_layer(layer);

        let (candidates, cone) = match hit.detector.subsystem {
            Subsystem::Dt => (unique_2d_hits(layer_hits), CHAMBER_CONE),
            Subsystem::Csc => (layer_hits, CHAMBER_CONE),
            Subsystem::Rpc => (layer_hits, RPC_CONE),
            Subsystem::Tracker => return None,
        };

        let count = candidates
            .iter()
            .filter(|other| (other.position - hit.position).norm() < cone)
            .count();
        Some(count as u32)
    }
}

/// Distinct 2-D hits of a drift-tube layer.
fn unique_2d_hits(hits: Vec<Hit>) -> Vec<Hit> {
    let mut unique: Vec<Hit> = Vec::new();
    for hit in hits.into_iter().filter(|h| h.dimension == 2) {
        if unique
            .iter()
            .all(|u| (u.position - hit.position).norm() >= DUPLICATE_DISTANCE)
        {
            unique.push(hit);
        }
    }
    unique
}
