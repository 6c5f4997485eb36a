//! Two-dimensional views: the area heatmap, the unit-price × total-price grid and the
//! per-project floor × unit price grid.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::aggregate::group_by_key;
use super::categorize::categorize;
use crate::error::InvalidRangeError;
use crate::types::{LegendFilter, RoomCategory, Transaction};
use crate::utils::{Bucket, MagnitudeScale, RangeBinner};

/// Transaction ids kept per heatmap cell for tooltips.
pub const REPRESENTATIVE_IDS_PER_CELL: usize = 5;

/// Unit price with the floor premium taken out, for grid placement only.
///
/// The base floor of a project is its lowest observed floor; each floor above it
/// removes `premium` from the unit price.
#[derive(Debug, Clone)]
pub struct FloorAdjuster<'a> {
    premium: f64,
    base_floors: HashMap<&'a str, i32>,
}

impl<'a> FloorAdjuster<'a> {
    pub fn new(filtered: &[&'a Transaction], premium: f64) -> Self {
        let mut base_floors: HashMap<&'a str, i32> = HashMap::new();
        for &tx in filtered {
            if let Some(floor) = tx.floor {
                base_floors
                    .entry(tx.project_name.as_str())
                    .and_modify(|base| *base = (*base).min(floor))
                    .or_insert(floor);
            }
        }
        Self {
            premium,
            base_floors,
        }
    }

    pub fn premium(&self) -> f64 {
        self.premium
    }

    pub fn base_floor(&self, project: &str) -> Option<i32> {
        self.base_floors.get(project).copied()
    }

    pub fn effective_unit_price(&self, tx: &Transaction) -> f64 {
        if self.premium == 0.0 {
            return tx.unit_price;
        }
        match (tx.floor, self.base_floor(&tx.project_name)) {
            (Some(floor), Some(base)) => tx.unit_price - f64::from(floor - base) * self.premium,
            _ => tx.unit_price,
        }
    }
}

/// One cell of the area heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    /// Area bucket label, e.g. "20.0-25.0"
    pub row_key: String,
    pub col_key: RoomCategory,
    pub count: usize,
    pub representative_transaction_ids: Vec<String>,
    pub magnitude_level: Option<usize>,
    pub highlighted: bool,
}

/// Area bucket × room category counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaHeatmap {
    pub buckets: Vec<Bucket>,
    pub categories: Vec<RoomCategory>,
    /// `cells[bucket][category]`
    pub cells: Vec<Vec<HeatmapCell>>,
    pub row_totals: Vec<usize>,
    pub col_totals: Vec<usize>,
    pub grand_total: usize,
    pub max_cell_value: usize,
    pub scale: MagnitudeScale,
}

impl AreaHeatmap {
    pub fn cell(&self, category: RoomCategory, bucket_index: usize) -> Option<&HeatmapCell> {
        let col = self.categories.iter().position(|&c| c == category)?;
        self.cells.get(bucket_index)?.get(col)
    }
}

/// Build the area heatmap for the selected categories that occur in `filtered`.
pub fn area_heatmap(
    filtered: &[&Transaction],
    selected: &BTreeSet<RoomCategory>,
    binner: &RangeBinner,
    legend: Option<&LegendFilter>,
) -> AreaHeatmap {
    let present: BTreeSet<RoomCategory> = filtered.iter().map(|tx| categorize(tx)).collect();
    let categories: Vec<RoomCategory> = selected.intersection(&present).copied().collect();

    let mut cells: Vec<Vec<HeatmapCell>> = binner
        .buckets()
        .iter()
        .map(|bucket| {
            categories
                .iter()
                .map(|&category| HeatmapCell {
                    row_key: bucket.label(),
                    col_key: category,
                    count: 0,
                    representative_transaction_ids: Vec::new(),
                    magnitude_level: None,
                    highlighted: false,
                })
                .collect()
        })
        .collect();

    for &tx in filtered {
        let category = categorize(tx);
        let Some(col) = categories.iter().position(|&c| c == category) else {
            continue;
        };
        let Some(row) = binner.bucket_of(tx.house_area_ping) else {
            continue;
        };
        let cell = &mut cells[row][col];
        cell.count += 1;
        if cell.representative_transaction_ids.len() < REPRESENTATIVE_IDS_PER_CELL {
            cell.representative_transaction_ids.push(tx.id.clone());
        }
    }

    let row_totals: Vec<usize> = cells.iter().map(|row| row.iter().map(|c| c.count).sum()).collect();
    let col_totals: Vec<usize> = (0..categories.len())
        .map(|col| cells.iter().map(|row| row[col].count).sum())
        .collect();
    let max_cell_value = cells.iter().flatten().map(|c| c.count).max().unwrap_or(0);
    let scale = MagnitudeScale::for_max(max_cell_value as u64);

    for cell in cells.iter_mut().flatten() {
        cell.magnitude_level = scale.level_of(cell.count as u64);
        cell.highlighted = match legend {
            Some(LegendFilter::Magnitude { level }) => cell.magnitude_level == Some(*level),
            Some(LegendFilter::Category { category }) => cell.col_key == *category,
            None => false,
        };
    }

    AreaHeatmap {
        buckets: binner.buckets().to_vec(),
        categories,
        cells,
        grand_total: row_totals.iter().sum(),
        row_totals,
        col_totals,
        max_cell_value,
        scale,
    }
}

/// Unit-price bucket × total-price bucket counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceGrid {
    pub floor_premium: f64,
    pub unit_price_buckets: Vec<Bucket>,
    pub total_price_buckets: Vec<Bucket>,
    /// `counts[unit_price_bucket][total_price_bucket]`
    pub counts: Vec<Vec<usize>>,
    pub row_totals: Vec<usize>,
    pub col_totals: Vec<usize>,
    pub grand_total: usize,
    pub max_cell_value: usize,
    pub scale: MagnitudeScale,
}

/// Axes of a [`PriceGrid`], derived from the data.
#[derive(Debug, Clone)]
pub struct PriceGridAxes {
    pub unit_price: RangeBinner,
    pub total_price: RangeBinner,
}

impl PriceGridAxes {
    pub fn spanning(
        filtered: &[&Transaction],
        adjuster: &FloorAdjuster<'_>,
        unit_price_interval: f64,
        total_price_interval: f64,
        max_buckets: usize,
    ) -> Result<Option<Self>, InvalidRangeError> {
        let unit_price = RangeBinner::spanning(
            filtered.iter().map(|tx| adjuster.effective_unit_price(tx)),
            unit_price_interval,
            max_buckets,
        )?;
        let total_price = RangeBinner::spanning(
            filtered.iter().map(|tx| tx.total_price),
            total_price_interval,
            max_buckets,
        )?;
        Ok(unit_price
            .zip(total_price)
            .map(|(unit_price, total_price)| Self {
                unit_price,
                total_price,
            }))
    }
}

pub fn price_grid(
    filtered: &[&Transaction],
    adjuster: &FloorAdjuster<'_>,
    axes: Option<&PriceGridAxes>,
) -> PriceGrid {
    let Some(axes) = axes else {
        return PriceGrid {
            floor_premium: adjuster.premium(),
            ..Default::default()
        };
    };

    let rows = axes.unit_price.len();
    let cols = axes.total_price.len();
    let mut counts = vec![vec![0usize; cols]; rows];
    for &tx in filtered {
        let row = axes.unit_price.bucket_of(adjuster.effective_unit_price(tx));
        let col = axes.total_price.bucket_of(tx.total_price);
        if let (Some(row), Some(col)) = (row, col) {
            counts[row][col] += 1;
        }
    }

    let row_totals: Vec<usize> = counts.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<usize> = (0..cols)
        .map(|col| counts.iter().map(|row| row[col]).sum())
        .collect();
    let max_cell_value = counts.iter().flatten().copied().max().unwrap_or(0);

    PriceGrid {
        floor_premium: adjuster.premium(),
        unit_price_buckets: axes.unit_price.buckets().to_vec(),
        total_price_buckets: axes.total_price.buckets().to_vec(),
        grand_total: row_totals.iter().sum(),
        counts,
        row_totals,
        col_totals,
        max_cell_value,
        scale: MagnitudeScale::for_max(max_cell_value as u64),
    }
}

/// One sold unit positioned in a project's price grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceGridUnit {
    pub floor: i32,
    pub unit_label: String,
    pub transaction_id: String,
    pub room_category: RoomCategory,
    pub total_price: f64,
    pub unit_price: f64,
    pub adjusted_unit_price: f64,
    pub house_area_ping: f64,
    pub transaction_date: NaiveDate,
    pub special_remark: bool,
    pub highlighted: bool,
}

/// Floor × unit sales control chart of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPriceGrid {
    pub project_name: String,
    pub base_floor: Option<i32>,
    /// Highest floor first
    pub floors: Vec<i32>,
    pub unit_labels: Vec<String>,
    pub units: Vec<PriceGridUnit>,
    /// Transactions without a floor or unit label
    pub unplaced: usize,
}

impl ProjectPriceGrid {
    pub fn units_at<'a>(
        &'a self,
        floor: i32,
        unit_label: &'a str,
    ) -> impl Iterator<Item = &'a PriceGridUnit> + 'a {
        self.units
            .iter()
            .filter(move |u| u.floor == floor && u.unit_label == unit_label)
    }
}

pub fn project_grids(
    filtered: &[&Transaction],
    adjuster: &FloorAdjuster<'_>,
    legend: Option<&LegendFilter>,
) -> Vec<ProjectPriceGrid> {
    group_by_key(filtered, |tx| tx.project_name.clone())
        .into_iter()
        .map(|(project_name, members)| {
            let mut floors = BTreeSet::new();
            let mut unit_labels = BTreeSet::new();
            let mut units = Vec::new();
            let mut unplaced = 0;

            for tx in members {
                let (Some(floor), Some(label)) = (tx.floor, tx.unit_label.as_ref()) else {
                    unplaced += 1;
                    continue;
                };
                let room_category = categorize(tx);
                floors.insert(floor);
                unit_labels.insert(label.clone());
                units.push(PriceGridUnit {
                    floor,
                    unit_label: label.clone(),
                    transaction_id: tx.id.clone(),
                    room_category,
                    total_price: tx.total_price,
                    unit_price: tx.unit_price,
                    adjusted_unit_price: adjuster.effective_unit_price(tx),
                    house_area_ping: tx.house_area_ping,
                    transaction_date: tx.transaction_date,
                    special_remark: tx.has_special_remark(),
                    highlighted: matches!(
                        legend,
                        Some(LegendFilter::Category { category }) if *category == room_category
                    ),
                });
            }

            ProjectPriceGrid {
                base_floor: adjuster.base_floor(&project_name),
                project_name,
                floors: floors.into_iter().rev().collect(),
                unit_labels: unit_labels.into_iter().collect(),
                units,
                unplaced,
            }
        })
        .collect()
}
