//! # Common Types
//!
//! This module contains the common types used throughout the crate for representing
//! pre-sale transaction records and the results of analysing them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{
    AreaHeatmap, AvailableRoomTypes, KeyMetrics, ParkingAnalysis, PriceBandRow, PriceGrid,
    ProjectPriceGrid, ProjectRankingRow, UsageStatsRow, VelocityTable,
};

/// Remark keywords that mark a sale as not at arm's length (terrace bundles,
/// sales to relatives or employees).
pub const SPECIAL_REMARK_KEYWORDS: [&str; 3] = ["露台", "親友", "員工"];

/// Parking space attached to a transaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingInfo {
    /// Parking type as recorded, e.g. "坡道平面" or "升降機械"
    #[serde(rename = "type")]
    pub parking_type: String,
    /// Price of the space in 萬 (0 when bundled into the total price)
    pub price: f64,
    /// Floor of the space, e.g. "B2"
    #[serde(default)]
    pub floor: Option<String>,
}

impl ParkingInfo {
    /// Ramp-accessed flat spaces, the only type broken down by floor.
    pub fn is_ramp_plane(&self) -> bool {
        self.parking_type.contains("坡道平面")
    }
}

/// One real-estate unit sale record.
///
/// Transactions are immutable once loaded. Derived values such as the room category are
/// recomputed on demand and never stored on the record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Record number, used by the external detail lookup
    #[serde(default)]
    pub id: String,
    /// Name of the pre-sale project
    pub project_name: String,
    /// County or city
    pub county: String,
    /// District within the county
    pub district: String,
    /// Contract date
    pub transaction_date: NaiveDate,
    /// Building type, e.g. "住宅大樓", "店舖", "工廠"
    pub building_type: String,
    /// Registered main purpose, e.g. "住家用", "商業用"
    #[serde(default)]
    pub main_purpose: String,
    /// Number of rooms, when recorded
    #[serde(default)]
    pub room_count: Option<u32>,
    /// Number of bathrooms, when recorded
    #[serde(default)]
    pub bathroom_count: Option<u32>,
    /// House area in 坪
    pub house_area_ping: f64,
    /// House total price in 萬
    pub total_price: f64,
    /// Unit price in 萬/坪 (total price / house area)
    pub unit_price: f64,
    /// Floor of the unit
    #[serde(default)]
    pub floor: Option<i32>,
    /// Unit label within the floor, e.g. "A1"
    #[serde(default)]
    pub unit_label: Option<String>,
    /// Attached parking space
    #[serde(default, rename = "parkingInfo")]
    pub parking: Option<ParkingInfo>,
    /// Free-form remark
    #[serde(default)]
    pub remark: String,
}

impl Transaction {
    pub fn has_special_remark(&self) -> bool {
        SPECIAL_REMARK_KEYWORDS
            .iter()
            .any(|keyword| self.remark.contains(keyword))
    }

    pub fn has_parking(&self) -> bool {
        self.parking.is_some()
    }
}

/// Room/usage category derived from a transaction.
///
/// The declaration order is the display order used by every grouped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomCategory {
    Studio,
    OneRoom,
    TwoRoom,
    ThreeRoom,
    FourRoom,
    FiveRoomPlus,
    Shell,
    Storefront,
    Office,
    IndustrialWarehouse,
    Other,
}

impl RoomCategory {
    pub const ALL: [RoomCategory; 11] = [
        RoomCategory::Studio,
        RoomCategory::OneRoom,
        RoomCategory::TwoRoom,
        RoomCategory::ThreeRoom,
        RoomCategory::FourRoom,
        RoomCategory::FiveRoomPlus,
        RoomCategory::Shell,
        RoomCategory::Storefront,
        RoomCategory::Office,
        RoomCategory::IndustrialWarehouse,
        RoomCategory::Other,
    ];

    /// Label as shown in the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            RoomCategory::Studio => "套房",
            RoomCategory::OneRoom => "1房",
            RoomCategory::TwoRoom => "2房",
            RoomCategory::ThreeRoom => "3房",
            RoomCategory::FourRoom => "4房",
            RoomCategory::FiveRoomPlus => "5房以上",
            RoomCategory::Shell => "毛胚",
            RoomCategory::Storefront => "店舖",
            RoomCategory::Office => "辦公/事務所",
            RoomCategory::IndustrialWarehouse => "廠辦/工廠",
            RoomCategory::Other => "其他",
        }
    }

    pub fn usage_class(self) -> UsageClass {
        match self {
            RoomCategory::Storefront => UsageClass::Storefront,
            RoomCategory::Office => UsageClass::Office,
            RoomCategory::IndustrialWarehouse => UsageClass::Industrial,
            RoomCategory::Other => UsageClass::Other,
            _ => UsageClass::Residential,
        }
    }

    /// Storefront, office and industrial units.
    pub fn is_commercial(self) -> bool {
        matches!(
            self.usage_class(),
            UsageClass::Storefront | UsageClass::Office | UsageClass::Industrial
        )
    }
}

impl fmt::Display for RoomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse usage grouping of room categories for the unit-price comparison view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsageClass {
    Residential,
    Office,
    Storefront,
    Industrial,
    Other,
}

/// Which average the dashboard headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageType {
    #[default]
    Arithmetic,
    Weighted,
    Median,
}

/// Single-select legend filter used to highlight grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LegendFilter {
    /// A class of the heatmap count color scale
    Magnitude { level: usize },
    /// A room category column
    Category { category: RoomCategory },
}

/// The complete set of derived views for one filter state.
///
/// This struct is produced by a single aggregation pass over the filtered transaction
/// set. It is ephemeral: any filter change replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Filter revision the result was computed at
    pub revision: u64,
    /// Number of transactions left after filtering
    pub transaction_count: usize,
    /// Overview figures for the filtered set
    pub key_metrics: KeyMetrics,
    /// Per-project summary rows in project discovery order
    pub project_ranking: Vec<ProjectRankingRow>,
    /// Total-price distribution per (room category, bathrooms)
    pub price_bands: Vec<PriceBandRow>,
    /// Unit-price statistics per usage class
    pub unit_price_stats: Vec<UsageStatsRow>,
    /// Parking ratio, per-type and per-floor price statistics
    pub parking: ParkingAnalysis,
    /// Sales velocity at the selected time granularity
    pub velocity: VelocityTable,
    /// Room category × area bucket counts
    pub area_heatmap: AreaHeatmap,
    /// Unit-price bucket × total-price bucket counts
    pub price_grid: PriceGrid,
    /// Floor × unit sales control chart per project
    pub project_grids: Vec<ProjectPriceGrid>,
    /// Room categories present in the filtered set
    pub available_room_types: AvailableRoomTypes,
    /// Projects present in the filtered set, in discovery order
    pub available_projects: Vec<String>,
}
