//! Grouped statistics over the filtered transaction set.
//!
//! Every view in this module takes the same filtered slice produced by
//! [`TransactionFilter::apply`], so all views agree on which transactions they see.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use super::categorize::categorize;
use crate::types::{RoomCategory, Transaction, UsageClass};
use crate::utils::{describe, format_week_range, DateRange, PriceTotals, Stats, TimeGranularity};

/// Row-level predicate shared by every view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub county: Option<String>,
    /// Empty means every district
    pub districts: Vec<String>,
    /// Empty means every project
    pub projects: Vec<String>,
    pub date_range: Option<DateRange>,
    /// Substring of the building type, e.g. "住宅大樓"
    pub building_type: Option<String>,
    pub residential_only: bool,
    pub exclude_commercial: bool,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(county) = &self.county {
            if &tx.county != county {
                return false;
            }
        }
        if !self.districts.is_empty() && !self.districts.contains(&tx.district) {
            return false;
        }
        if !self.projects.is_empty() && !self.projects.contains(&tx.project_name) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if !range.contains(tx.transaction_date) {
                return false;
            }
        }
        if let Some(building_type) = &self.building_type {
            if !tx.building_type.contains(building_type.as_str()) {
                return false;
            }
        }
        if self.residential_only || self.exclude_commercial {
            let category = categorize(tx);
            if self.residential_only && category.usage_class() != UsageClass::Residential {
                return false;
            }
            if self.exclude_commercial && category.is_commercial() {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions.iter().filter(|tx| self.matches(tx)).collect()
    }
}

/// Numeric field summarised by [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    UnitPrice,
    TotalPrice,
    HouseArea,
}

impl Metric {
    pub fn value(self, tx: &Transaction) -> f64 {
        match self {
            Metric::UnitPrice => tx.unit_price,
            Metric::TotalPrice => tx.total_price,
            Metric::HouseArea => tx.house_area_ping,
        }
    }
}

/// Statistics of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateGroup {
    pub group_key: String,
    pub count: usize,
    pub stats: Stats,
    pub totals: PriceTotals,
}

/// Group the transactions accepted by `filter` with `group_by` and describe `metric` per group.
///
/// Groups come back in discovery order. Transactions for which `group_by` returns `None`
/// are left out. For [`Metric::UnitPrice`] the weighted mean is `sum(totalPrice) / sum(area)`.
pub fn aggregate<'a, I, G, P>(
    transactions: I,
    group_by: G,
    filter: P,
    metric: Metric,
) -> Vec<AggregateGroup>
where
    I: IntoIterator<Item = &'a Transaction>,
    G: Fn(&Transaction) -> Option<String>,
    P: Fn(&Transaction) -> bool,
{
    let accepted = transactions
        .into_iter()
        .filter(|tx| filter(*tx))
        .filter_map(|tx| group_by(tx).map(|key| (key, tx)));

    group_pairs(accepted)
        .into_iter()
        .map(|(group_key, members)| {
            let totals = price_totals(&members);
            let values: Vec<f64> = members.iter().map(|tx| metric.value(tx)).collect();
            let weighted = match metric {
                Metric::UnitPrice => totals.weighted_unit_price(),
                _ => None,
            };
            AggregateGroup {
                group_key,
                count: members.len(),
                stats: describe(&values).with_weighted_mean(weighted),
                totals,
            }
        })
        .collect()
}

/// Group by a key function, keeping first-seen order of keys and members.
pub(crate) fn group_by_key<'a, K, F>(
    transactions: &[&'a Transaction],
    key: F,
) -> Vec<(K, Vec<&'a Transaction>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Transaction) -> K,
{
    group_pairs(transactions.iter().map(|&tx| (key(tx), tx)))
}

fn group_pairs<'a, K, I>(pairs: I) -> Vec<(K, Vec<&'a Transaction>)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, &'a Transaction)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a Transaction>)> = Vec::new();
    for (key, tx) in pairs {
        match index.get(&key) {
            Some(&i) => groups[i].1.push(tx),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![tx]));
            }
        }
    }
    groups
}

pub(crate) fn price_totals(transactions: &[&Transaction]) -> PriceTotals {
    transactions.iter().fold(PriceTotals::default(), |mut acc, tx| {
        acc.add(tx.total_price, tx.house_area_ping);
        acc
    })
}

pub(crate) fn unit_price_stats(transactions: &[&Transaction]) -> Stats {
    let values: Vec<f64> = transactions.iter().map(|tx| tx.unit_price).collect();
    describe(&values).with_weighted_mean(price_totals(transactions).weighted_unit_price())
}

/// Overview figures of the filtered set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    pub transaction_count: usize,
    pub project_count: usize,
    pub total_sale_amount: f64,
    pub total_house_area: f64,
    pub weighted_unit_price: Option<f64>,
    pub median_unit_price: Option<f64>,
}

pub fn key_metrics(filtered: &[&Transaction]) -> KeyMetrics {
    let totals = price_totals(filtered);
    let projects: BTreeSet<&str> = filtered.iter().map(|tx| tx.project_name.as_str()).collect();
    KeyMetrics {
        transaction_count: filtered.len(),
        project_count: projects.len(),
        total_sale_amount: totals.price_sum,
        total_house_area: totals.area_sum,
        weighted_unit_price: totals.weighted_unit_price(),
        median_unit_price: unit_price_stats(filtered).median,
    }
}

/// One row of the project ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRankingRow {
    pub project_name: String,
    pub county: String,
    pub district: String,
    pub transaction_count: usize,
    pub sale_amount_sum: f64,
    pub house_area_sum: f64,
    pub weighted_unit_price: Option<f64>,
    /// Percentiles and means of per-unit prices within the project
    pub unit_price: Stats,
    /// Share of the filtered set's total sale amount, in percent
    pub market_share: f64,
    pub first_transaction: Option<NaiveDate>,
    pub last_transaction: Option<NaiveDate>,
}

/// Per-project summary in project discovery order.
pub fn project_ranking(filtered: &[&Transaction]) -> Vec<ProjectRankingRow> {
    let grand_total = price_totals(filtered).price_sum;

    group_by_key(filtered, |tx| tx.project_name.clone())
        .into_iter()
        .map(|(project_name, members)| {
            let totals = price_totals(&members);
            let first = members[0];
            ProjectRankingRow {
                project_name,
                county: first.county.clone(),
                district: first.district.clone(),
                transaction_count: totals.count,
                sale_amount_sum: totals.price_sum,
                house_area_sum: totals.area_sum,
                weighted_unit_price: totals.weighted_unit_price(),
                unit_price: unit_price_stats(&members),
                market_share: if grand_total > 0.0 {
                    totals.price_sum / grand_total * 100.0
                } else {
                    0.0
                },
                first_transaction: members.iter().map(|tx| tx.transaction_date).min(),
                last_transaction: members.iter().map(|tx| tx.transaction_date).max(),
            }
        })
        .collect()
}

/// Total-price distribution of one (room category, bathroom count) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBandRow {
    pub room_category: RoomCategory,
    pub bathrooms: Option<u32>,
    pub count: usize,
    pub total_price: Stats,
}

impl PriceBandRow {
    pub fn label(&self) -> String {
        match self.bathrooms {
            Some(n) => format!("{}-{}衛", self.room_category.label(), n),
            None => self.room_category.label().to_string(),
        }
    }
}

/// Price bands for the selected categories, ordered by category then bathrooms.
pub fn price_bands(
    filtered: &[&Transaction],
    selected: &BTreeSet<RoomCategory>,
) -> Vec<PriceBandRow> {
    let mut groups: BTreeMap<(RoomCategory, Option<u32>), Vec<f64>> = BTreeMap::new();
    for &tx in filtered {
        let category = categorize(tx);
        if selected.contains(&category) {
            groups
                .entry((category, tx.bathroom_count))
                .or_default()
                .push(tx.total_price);
        }
    }

    groups
        .into_iter()
        .map(|((room_category, bathrooms), prices)| PriceBandRow {
            room_category,
            bathrooms,
            count: prices.len(),
            total_price: describe(&prices),
        })
        .collect()
}

/// Unit and total price statistics of one usage class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatsRow {
    pub usage: UsageClass,
    pub count: usize,
    pub unit_price: Stats,
    pub total_price: Stats,
}

pub fn usage_stats(filtered: &[&Transaction]) -> Vec<UsageStatsRow> {
    let mut groups: BTreeMap<UsageClass, Vec<&Transaction>> = BTreeMap::new();
    for &tx in filtered {
        groups.entry(categorize(tx).usage_class()).or_default().push(tx);
    }

    groups
        .into_iter()
        .map(|(usage, members)| {
            let prices: Vec<f64> = members.iter().map(|tx| tx.total_price).collect();
            UsageStatsRow {
                usage,
                count: members.len(),
                unit_price: unit_price_stats(&members),
                total_price: describe(&prices),
            }
        })
        .collect()
}

/// Room categories offered by the category pickers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRoomTypes {
    /// Categories with at least one priced transaction
    pub price_band: Vec<RoomCategory>,
    pub velocity: Vec<RoomCategory>,
}

pub fn available_room_types(filtered: &[&Transaction]) -> AvailableRoomTypes {
    let mut price_band = BTreeSet::new();
    let mut velocity = BTreeSet::new();
    for &tx in filtered {
        let category = categorize(tx);
        velocity.insert(category);
        if tx.total_price.is_finite() && tx.total_price > 0.0 {
            price_band.insert(category);
        }
    }
    AvailableRoomTypes {
        price_band: price_band.into_iter().collect(),
        velocity: velocity.into_iter().collect(),
    }
}

/// One time bucket of the velocity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityPeriod {
    pub key: String,
    /// Monday..Sunday span for weekly buckets
    pub date_label: Option<String>,
    pub cells: BTreeMap<RoomCategory, PriceTotals>,
    /// Sum over the selected categories
    pub total: PriceTotals,
}

impl VelocityPeriod {
    pub fn count(&self, category: RoomCategory) -> usize {
        self.cells.get(&category).map_or(0, |cell| cell.count)
    }
}

/// Sales velocity by (room category, time bucket).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityTable {
    pub granularity: TimeGranularity,
    pub categories: Vec<RoomCategory>,
    /// Oldest first
    pub periods: Vec<VelocityPeriod>,
}

impl VelocityTable {
    /// Periods for tabular display, newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = &VelocityPeriod> {
        self.periods.iter().rev()
    }

    /// Transaction counts of one category per period, oldest first, 0 where absent.
    pub fn series(&self, category: RoomCategory) -> Vec<usize> {
        self.periods.iter().map(|p| p.count(category)).collect()
    }
}

pub fn velocity(
    filtered: &[&Transaction],
    selected: &BTreeSet<RoomCategory>,
    granularity: TimeGranularity,
) -> VelocityTable {
    let mut periods: BTreeMap<String, BTreeMap<RoomCategory, PriceTotals>> = BTreeMap::new();
    for &tx in filtered {
        let category = categorize(tx);
        if !selected.contains(&category) {
            continue;
        }
        periods
            .entry(granularity.bucket_key(tx.transaction_date))
            .or_default()
            .entry(category)
            .or_default()
            .add(tx.total_price, tx.house_area_ping);
    }

    let periods = periods
        .into_iter()
        .map(|(key, cells)| {
            let total = cells
                .values()
                .fold(PriceTotals::default(), |acc, cell| acc.merge(*cell));
            let date_label = (granularity == TimeGranularity::Weekly).then(|| format_week_range(&key));
            VelocityPeriod {
                key,
                date_label,
                cells,
                total,
            }
        })
        .collect();

    VelocityTable {
        granularity,
        categories: selected.iter().copied().collect(),
        periods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sale(project: &str, area: f64, price: f64) -> Transaction {
        Transaction {
            project_name: project.to_string(),
            county: "台北市".to_string(),
            district: "大安區".to_string(),
            building_type: "住宅大樓".to_string(),
            room_count: Some(2),
            bathroom_count: Some(1),
            house_area_ping: area,
            total_price: price,
            unit_price: price / area,
            transaction_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_ranking_sums() {
        let rows = vec![sale("X", 30.0, 900.0), sale("X", 20.0, 500.0)];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let ranking = project_ranking(&refs);

        assert_eq!(ranking.len(), 1);
        let x = &ranking[0];
        assert_eq!(x.transaction_count, 2);
        assert_eq!(x.sale_amount_sum, 1400.0);
        assert_eq!(x.house_area_sum, 50.0);
        assert_eq!(x.weighted_unit_price, Some(28.0));
        assert_eq!(x.market_share, 100.0);
        // the arithmetic mean of unit prices (30 and 25) differs from the weighted figure
        assert_eq!(x.unit_price.arithmetic_mean, Some(27.5));
    }

    #[test]
    fn test_ranking_keeps_discovery_order() {
        let rows = vec![sale("B", 10.0, 100.0), sale("A", 10.0, 100.0), sale("B", 10.0, 100.0)];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let names: Vec<String> = project_ranking(&refs)
            .into_iter()
            .map(|r| r.project_name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_aggregate_with_predicate() {
        let rows = vec![sale("X", 10.0, 300.0), sale("Y", 10.0, 200.0), sale("X", 30.0, 600.0)];
        let groups = aggregate(
            &rows,
            |tx| Some(tx.project_name.clone()),
            |tx| tx.total_price > 250.0,
            Metric::UnitPrice,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_key, "X");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].stats.weighted_mean, Some(900.0 / 40.0));
        assert_eq!(groups[0].stats.median, Some(25.0));
    }

    #[test]
    fn test_filter_matches_membership_and_dates() {
        let mut other = sale("Z", 10.0, 100.0);
        other.district = "信義區".to_string();
        other.transaction_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let rows = vec![sale("X", 10.0, 100.0), other];

        let filter = TransactionFilter {
            county: Some("台北市".to_string()),
            districts: vec!["大安區".to_string()],
            ..Default::default()
        };
        assert_eq!(filter.apply(&rows).len(), 1);

        let filter = TransactionFilter {
            date_range: Some(
                DateRange::new(
                    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                )
                .unwrap(),
            ),
            ..Default::default()
        };
        assert_eq!(filter.apply(&rows)[0].project_name, "Z");
    }

    #[test]
    fn test_exclude_commercial() {
        let mut shop = sale("S", 20.0, 2000.0);
        shop.building_type = "店舖".to_string();
        let rows = vec![sale("X", 10.0, 100.0), shop];
        let filter = TransactionFilter {
            exclude_commercial: true,
            ..Default::default()
        };
        assert_eq!(filter.apply(&rows).len(), 1);
    }

    #[test]
    fn test_price_bands_respect_selection() {
        let mut studio = sale("X", 12.0, 600.0);
        studio.room_count = Some(0);
        let rows = vec![sale("X", 30.0, 900.0), sale("X", 20.0, 500.0), studio];
        let refs: Vec<&Transaction> = rows.iter().collect();

        let selected: BTreeSet<RoomCategory> = [RoomCategory::TwoRoom].into_iter().collect();
        let bands = price_bands(&refs, &selected);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].label(), "2房-1衛");
        assert_eq!(bands[0].total_price.median, Some(700.0));

        assert!(price_bands(&refs, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_velocity_rows_and_totals() {
        let mut later = sale("X", 20.0, 500.0);
        later.transaction_date = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();
        let mut three = sale("X", 40.0, 1600.0);
        three.room_count = Some(3);
        let rows = vec![sale("X", 30.0, 900.0), later, three];
        let refs: Vec<&Transaction> = rows.iter().collect();

        let selected: BTreeSet<RoomCategory> =
            [RoomCategory::TwoRoom, RoomCategory::ThreeRoom].into_iter().collect();
        let table = velocity(&refs, &selected, TimeGranularity::Monthly);

        let keys: Vec<&str> = table.periods.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-06", "2024-08"]);
        assert_eq!(table.series(RoomCategory::TwoRoom), vec![1, 1]);
        assert_eq!(table.series(RoomCategory::ThreeRoom), vec![1, 0]);
        assert_eq!(table.periods[0].total.count, 2);
        assert_eq!(table.periods[0].total.price_sum, 2500.0);
        assert_eq!(table.newest_first().next().unwrap().key, "2024-08");
        assert!(table.periods[0].date_label.is_none());
    }

    #[test]
    fn test_usage_stats_split_residential_and_shops() {
        let mut shop = sale("S", 20.0, 2000.0);
        shop.building_type = "店舖".to_string();
        let rows = vec![sale("X", 10.0, 100.0), shop];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let usage: Vec<UsageClass> = usage_stats(&refs).into_iter().map(|r| r.usage).collect();
        assert_eq!(usage, vec![UsageClass::Residential, UsageClass::Storefront]);
    }
}
