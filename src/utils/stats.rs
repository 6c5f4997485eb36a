//! Descriptive statistics over plain numeric sequences.
//!
//! Nothing here panics on empty input: an empty sequence yields a [`Stats`] whose
//! fields are all `None`.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::types::AverageType;

/// Five-number summary plus means and sum of one group.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub count: usize,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
    pub arithmetic_mean: Option<f64>,
    /// Only set when the caller supplies weights (see [`PriceTotals`])
    pub weighted_mean: Option<f64>,
    pub sum: Option<f64>,
}

impl Stats {
    pub fn with_weighted_mean(mut self, weighted_mean: Option<f64>) -> Self {
        self.weighted_mean = weighted_mean;
        self
    }

    /// The figure to headline for the selected average type.
    pub fn average(&self, kind: AverageType) -> Option<f64> {
        match kind {
            AverageType::Arithmetic => self.arithmetic_mean,
            AverageType::Weighted => self.weighted_mean,
            AverageType::Median => self.median,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Type 7 quantile of an ascending slice: linear interpolation between the
/// order statistics around rank `(n - 1) * p`.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Describe a sequence of values. Non-finite values are ignored.
pub fn describe(values: &[f64]) -> Stats {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Stats::default();
    }
    sorted.sort_by(f64::total_cmp);

    let sum: f64 = sorted.iter().sum();
    Stats {
        count: sorted.len(),
        min: sorted.first().copied(),
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted.last().copied(),
        arithmetic_mean: Some(sorted.iter().mean()),
        weighted_mean: None,
        sum: Some(sum),
    }
}

/// Result of [`describe_weighted`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedSummary {
    pub weighted_mean: Option<f64>,
    pub weighted_sum: f64,
    pub weight_sum: f64,
}

/// `sum(value * weight) / sum(weight)` over `(value, weight)` pairs.
pub fn describe_weighted(pairs: &[(f64, f64)]) -> WeightedSummary {
    let (weighted_sum, weight_sum) = pairs
        .iter()
        .filter(|(v, w)| v.is_finite() && w.is_finite())
        .fold((0.0, 0.0), |(vs, ws), (v, w)| (vs + v * w, ws + w));

    WeightedSummary {
        weighted_mean: (weight_sum > 0.0).then(|| weighted_sum / weight_sum),
        weighted_sum,
        weight_sum,
    }
}

/// Running price and area totals of a group.
///
/// The weighted unit price is always re-derived from these totals
/// (`sum(totalPrice) / sum(area)`), never averaged from per-unit prices,
/// which keeps it associative across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTotals {
    pub count: usize,
    pub price_sum: f64,
    pub area_sum: f64,
}

impl PriceTotals {
    pub fn add(&mut self, price: f64, area: f64) {
        self.count += 1;
        if price.is_finite() {
            self.price_sum += price;
        }
        if area.is_finite() {
            self.area_sum += area;
        }
    }

    pub fn merge(self, other: PriceTotals) -> PriceTotals {
        PriceTotals {
            count: self.count + other.count,
            price_sum: self.price_sum + other.price_sum,
            area_sum: self.area_sum + other.area_sum,
        }
    }

    pub fn weighted_unit_price(&self) -> Option<f64> {
        (self.area_sum > 0.0).then(|| self.price_sum / self.area_sum)
    }
}
