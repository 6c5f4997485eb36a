//! Parking space statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Transaction;
use crate::utils::{describe, Stats};

/// Basement floor buckets of the ramp-plane breakdown, shallowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BasementFloor {
    B1,
    B2,
    B3,
    B4,
    #[serde(rename = "B5_below")]
    B5Below,
}

impl BasementFloor {
    /// Parse a recorded floor such as "B2" or "b7". Anything else is `None`.
    pub fn parse(floor: &str) -> Option<Self> {
        let digits = floor.trim().strip_prefix(['B', 'b'])?;
        match digits.parse::<u32>().ok()? {
            1 => Some(BasementFloor::B1),
            2 => Some(BasementFloor::B2),
            3 => Some(BasementFloor::B3),
            4 => Some(BasementFloor::B4),
            n if n >= 5 => Some(BasementFloor::B5Below),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BasementFloor::B1 => "B1",
            BasementFloor::B2 => "B2",
            BasementFloor::B3 => "B3",
            BasementFloor::B4 => "B4",
            BasementFloor::B5Below => "B5_below",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingRatio {
    pub with_parking: usize,
    pub without_parking: usize,
    /// Percent of transactions with a space, 0 for an empty set
    pub with_parking_pct: f64,
    pub without_parking_pct: f64,
}

/// Price statistics of one parking type. Spaces priced at 0 are bundled into the
/// unit's total price and are only counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingTypeRow {
    pub parking_type: String,
    pub count: usize,
    pub priced_count: usize,
    pub price: Stats,
}

/// A min or max value with the transaction it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extremum {
    pub value: f64,
    pub project_name: String,
    pub unit_label: Option<String>,
    pub floor: Option<i32>,
}

impl Extremum {
    fn of(tx: &Transaction, value: f64) -> Self {
        Self {
            value,
            project_name: tx.project_name.clone(),
            unit_label: tx.unit_label.clone(),
            floor: tx.floor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RampFloorRow {
    pub floor: BasementFloor,
    pub count: usize,
    pub price: Stats,
    pub min: Option<Extremum>,
    pub max: Option<Extremum>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingAnalysis {
    pub ratio: ParkingRatio,
    /// Ordered by parking type
    pub by_type: Vec<ParkingTypeRow>,
    /// Ramp-plane spaces by basement floor, B1 first
    pub ramp_plane_by_floor: Vec<RampFloorRow>,
}

pub fn parking_analysis(filtered: &[&Transaction]) -> ParkingAnalysis {
    let with_parking = filtered.iter().filter(|tx| tx.has_parking()).count();
    let without_parking = filtered.len() - with_parking;
    let pct = |n: usize| {
        if filtered.is_empty() {
            0.0
        } else {
            n as f64 / filtered.len() as f64 * 100.0
        }
    };

    let mut types: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
    let mut floors: BTreeMap<BasementFloor, Vec<(&Transaction, f64)>> = BTreeMap::new();
    for &tx in filtered {
        let Some(parking) = &tx.parking else {
            continue;
        };
        let priced = parking.price.is_finite() && parking.price > 0.0;

        let entry = types.entry(parking.parking_type.as_str()).or_default();
        entry.0 += 1;
        if priced {
            entry.1.push(parking.price);
        }

        if priced && parking.is_ramp_plane() {
            if let Some(floor) = parking.floor.as_deref().and_then(BasementFloor::parse) {
                floors.entry(floor).or_default().push((tx, parking.price));
            }
        }
    }

    let by_type = types
        .into_iter()
        .map(|(parking_type, (count, prices))| ParkingTypeRow {
            parking_type: parking_type.to_string(),
            count,
            priced_count: prices.len(),
            price: describe(&prices),
        })
        .collect();

    let ramp_plane_by_floor = floors
        .into_iter()
        .map(|(floor, spaces)| {
            let prices: Vec<f64> = spaces.iter().map(|(_, price)| *price).collect();
            // first occurrence wins on ties
            let min = spaces
                .iter()
                .fold(None::<&(&Transaction, f64)>, |best, s| match best {
                    Some(b) if b.1 <= s.1 => Some(b),
                    _ => Some(s),
                });
            let max = spaces
                .iter()
                .fold(None::<&(&Transaction, f64)>, |best, s| match best {
                    Some(b) if b.1 >= s.1 => Some(b),
                    _ => Some(s),
                });
            RampFloorRow {
                floor,
                count: spaces.len(),
                price: describe(&prices),
                min: min.map(|(tx, price)| Extremum::of(tx, *price)),
                max: max.map(|(tx, price)| Extremum::of(tx, *price)),
            }
        })
        .collect();

    ParkingAnalysis {
        ratio: ParkingRatio {
            with_parking,
            without_parking,
            with_parking_pct: pct(with_parking),
            without_parking_pct: pct(without_parking),
        },
        by_type,
        ramp_plane_by_floor,
    }
}
