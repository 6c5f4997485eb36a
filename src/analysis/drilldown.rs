//! Heatmap cell drill-down.

use serde::{Deserialize, Serialize};

use super::aggregate::{group_by_key, price_totals};
use super::categorize::categorize;
use crate::types::{RoomCategory, Transaction};
use crate::utils::{describe, Bucket, RangeBinner};

/// Inclusive min/max of a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    fn of(values: &[f64]) -> Option<Self> {
        let mut finite = values.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        Some(finite.fold(Self { min: first, max: first }, |range, v| Self {
            min: range.min.min(v),
            max: range.max.max(v),
        }))
    }
}

/// Total and unit price under one kind of average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePair {
    pub total_price: Option<f64>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrillDownMetrics {
    pub median: PricePair,
    pub arithmetic: PricePair,
    /// Only the unit price is area-weighted; the total price repeats the arithmetic mean.
    pub weighted: PricePair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project_name: String,
    pub count: usize,
    pub price_range: Option<ValueRange>,
    pub unit_price_range: Option<ValueRange>,
    pub metrics: DrillDownMetrics,
    pub transaction_ids: Vec<String>,
}

/// Transactions behind one heatmap cell, grouped by project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownResult {
    pub category: RoomCategory,
    pub bucket_range: Bucket,
    /// Largest project first; equal counts keep discovery order
    pub per_project_details: Vec<ProjectDetail>,
}

impl DrillDownResult {
    pub fn total_count(&self) -> usize {
        self.per_project_details.iter().map(|p| p.count).sum()
    }
}

/// Resolve the heatmap cell `(category, bucket_index)` of `binner` against `filtered`.
///
/// Bucket membership goes through the same binner the heatmap used, so the result
/// always adds up to the cell count. Returns `None` for an unknown bucket.
pub fn resolve(
    filtered: &[&Transaction],
    category: RoomCategory,
    binner: &RangeBinner,
    bucket_index: usize,
) -> Option<DrillDownResult> {
    let bucket = *binner.bucket(bucket_index)?;
    let matching: Vec<&Transaction> = filtered
        .iter()
        .copied()
        .filter(|tx| {
            categorize(tx) == category && binner.bucket_of(tx.house_area_ping) == Some(bucket_index)
        })
        .collect();

    let mut per_project_details: Vec<ProjectDetail> =
        group_by_key(&matching, |tx| tx.project_name.clone())
            .into_iter()
            .map(|(project_name, members)| project_detail(project_name, &members))
            .collect();
    // stable, so ties stay in discovery order
    per_project_details.sort_by(|a, b| b.count.cmp(&a.count));

    log::debug!(
        "drill-down {} {}: {} transactions in {} projects",
        category,
        bucket.label(),
        matching.len(),
        per_project_details.len()
    );

    Some(DrillDownResult {
        category,
        bucket_range: bucket,
        per_project_details,
    })
}

fn project_detail(project_name: String, members: &[&Transaction]) -> ProjectDetail {
    let prices: Vec<f64> = members.iter().map(|tx| tx.total_price).collect();
    let unit_prices: Vec<f64> = members.iter().map(|tx| tx.unit_price).collect();
    let price_stats = describe(&prices);
    let unit_stats = describe(&unit_prices);

    ProjectDetail {
        project_name,
        count: members.len(),
        price_range: ValueRange::of(&prices),
        unit_price_range: ValueRange::of(&unit_prices),
        metrics: DrillDownMetrics {
            median: PricePair {
                total_price: price_stats.median,
                unit_price: unit_stats.median,
            },
            arithmetic: PricePair {
                total_price: price_stats.arithmetic_mean,
                unit_price: unit_stats.arithmetic_mean,
            },
            weighted: PricePair {
                total_price: price_stats.arithmetic_mean,
                unit_price: price_totals(members).weighted_unit_price(),
            },
        },
        transaction_ids: members.iter().map(|tx| tx.id.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_room(id: &str, project: &str, area: f64, price: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            project_name: project.to_string(),
            building_type: "住宅大樓".to_string(),
            room_count: Some(2),
            house_area_ping: area,
            total_price: price,
            unit_price: price / area,
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_by_project_largest_first() {
        let rows = vec![
            two_room("1", "A", 21.0, 630.0),
            two_room("2", "B", 22.0, 660.0),
            two_room("3", "B", 24.0, 960.0),
            two_room("4", "C", 23.0, 690.0),
            two_room("5", "B", 31.0, 930.0),
        ];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let binner = RangeBinner::new(20.0, 30.0, 5.0).unwrap();

        let result = resolve(&refs, RoomCategory::TwoRoom, &binner, 0).unwrap();
        let names: Vec<&str> = result
            .per_project_details
            .iter()
            .map(|p| p.project_name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(result.total_count(), 4);

        let b = &result.per_project_details[0];
        assert_eq!(b.transaction_ids, vec!["2", "3"]);
        assert_eq!(b.price_range, Some(ValueRange { min: 660.0, max: 960.0 }));
        assert_eq!(b.metrics.weighted.unit_price, Some(1620.0 / 46.0));
        assert_eq!(b.metrics.arithmetic.unit_price, Some(35.0));
        // weighted total price is the arithmetic mean
        assert_eq!(b.metrics.weighted.total_price, Some(810.0));
    }

    #[test]
    fn test_other_category_and_unknown_bucket() {
        let rows = vec![two_room("1", "A", 21.0, 630.0)];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let binner = RangeBinner::new(20.0, 30.0, 5.0).unwrap();

        let result = resolve(&refs, RoomCategory::ThreeRoom, &binner, 0).unwrap();
        assert!(result.per_project_details.is_empty());
        assert!(resolve(&refs, RoomCategory::TwoRoom, &binner, 9).is_none());
    }
}
