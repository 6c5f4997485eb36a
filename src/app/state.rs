use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::watch;

use crate::analysis::TransactionFilter;
use crate::config::{HeatmapRange, Settings};
use crate::error::AnalysisError;
use crate::remote::FetchRequest;
use crate::types::{AverageType, LegendFilter, RoomCategory};
use crate::utils::binning::DEFAULT_MAX_BUCKETS;
use crate::utils::{DateRange, TimeGranularity};

/// The selection driving every aggregate, as plain data.
///
/// This is the form that is shared and restored; [`FilterState`] wraps it with
/// change tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filters {
    /// County or city; required before fetching
    pub region: Option<String>,
    pub districts: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    /// Required before fetching
    pub date_range: Option<DateRange>,
    pub building_type: Option<String>,
    pub residential_only: bool,
    pub exclude_commercial: bool,
    /// Categories shown in the price-band view
    pub price_band_categories: BTreeSet<RoomCategory>,
    /// Categories shown in the velocity view and the area heatmap
    pub velocity_categories: BTreeSet<RoomCategory>,
    pub average_type: AverageType,
    pub granularity: TimeGranularity,
    pub heatmap: HeatmapRange,
    pub legend: Option<LegendFilter>,
    /// 萬/坪 removed per floor above a project's lowest floor
    pub floor_premium: f64,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            region: None,
            districts: BTreeSet::new(),
            projects: BTreeSet::new(),
            date_range: None,
            building_type: None,
            residential_only: false,
            exclude_commercial: false,
            price_band_categories: RoomCategory::ALL.into_iter().collect(),
            velocity_categories: RoomCategory::ALL.into_iter().collect(),
            average_type: AverageType::default(),
            granularity: TimeGranularity::default(),
            heatmap: HeatmapRange::default(),
            legend: None,
            floor_premium: 0.0,
        }
    }
}

impl Filters {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            average_type: settings.average_type,
            granularity: settings.granularity,
            heatmap: settings.heatmap,
            floor_premium: settings.floor_premium,
            ..Default::default()
        }
    }

    /// Row predicate for the local dataset.
    pub fn transaction_filter(&self) -> TransactionFilter {
        TransactionFilter {
            county: self.region.clone(),
            districts: self.districts.iter().cloned().collect(),
            projects: self.projects.iter().cloned().collect(),
            date_range: self.date_range,
            building_type: self.building_type.clone(),
            residential_only: self.residential_only,
            exclude_commercial: self.exclude_commercial,
        }
    }

    /// Check the fields a fetch cannot do without.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.region.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(AnalysisError::Validation("region is required".into()));
        }
        if self.date_range.is_none() {
            return Err(AnalysisError::Validation("date range is required".into()));
        }
        Ok(())
    }

    pub fn to_fetch_request(&self) -> Result<FetchRequest, AnalysisError> {
        self.validate()?;
        let (Some(region), Some(range)) = (&self.region, self.date_range) else {
            return Err(AnalysisError::Validation("region and date range are required".into()));
        };
        Ok(FetchRequest {
            region: region.clone(),
            districts: self.districts.iter().cloned().collect(),
            project_names: self.projects.iter().cloned().collect(),
            building_type: self.building_type.clone(),
            date_start: range.start,
            date_end: range.end,
            residential_only: self.residential_only,
            exclude_commercial: self.exclude_commercial,
            page: 1,
            page_size: None,
        })
    }
}

/// Mutable filter selection with a single invalidation signal.
///
/// Every setter that changes something bumps the revision and publishes it on the
/// watch channel. Derived aggregates compare revisions to know they are stale; there
/// is no partial invalidation.
#[derive(Debug)]
pub struct FilterState {
    filters: Filters,
    revision: u64,
    changes: watch::Sender<u64>,
    max_buckets: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(Filters::default())
    }
}

impl FilterState {
    pub fn new(filters: Filters) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            filters,
            revision: 0,
            changes,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut state = Self::new(Filters::from_settings(settings));
        state.max_buckets = settings.max_buckets;
        state
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn snapshot(&self) -> Filters {
        self.filters.clone()
    }

    /// Replace every field at once, e.g. from a shared report.
    pub fn restore(&mut self, filters: Filters) {
        self.filters = filters;
        self.invalidate();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Receiver that observes the revision after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn invalidate(&mut self) {
        self.revision += 1;
        self.changes.send_replace(self.revision);
        log::debug!("filters changed, revision {}", self.revision);
    }

    /// Apply `change` and invalidate when it reports a modification.
    fn update(&mut self, change: impl FnOnce(&mut Filters) -> bool) -> bool {
        let changed = change(&mut self.filters);
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Selecting another region drops the district and project selection.
    pub fn set_region(&mut self, region: Option<String>) -> bool {
        self.update(|f| {
            if f.region == region {
                return false;
            }
            f.region = region;
            f.districts.clear();
            f.projects.clear();
            true
        })
    }

    /// Project choices are scoped to the selected districts, so they are dropped too.
    pub fn toggle_district(&mut self, district: &str) -> bool {
        self.update(|f| {
            if !f.districts.remove(district) {
                f.districts.insert(district.to_string());
            }
            f.projects.clear();
            true
        })
    }

    pub fn clear_districts(&mut self) -> bool {
        self.update(|f| {
            if f.districts.is_empty() && f.projects.is_empty() {
                return false;
            }
            f.districts.clear();
            f.projects.clear();
            true
        })
    }

    pub fn toggle_project(&mut self, project: &str) -> bool {
        self.update(|f| {
            if !f.projects.remove(project) {
                f.projects.insert(project.to_string());
            }
            true
        })
    }

    pub fn clear_projects(&mut self) -> bool {
        self.update(|f| {
            let changed = !f.projects.is_empty();
            f.projects.clear();
            changed
        })
    }

    pub fn set_date_range(&mut self, range: DateRange) -> bool {
        self.update(|f| {
            let changed = f.date_range != Some(range);
            f.date_range = Some(range);
            changed
        })
    }

    pub fn set_building_type(&mut self, building_type: Option<String>) -> bool {
        self.update(|f| {
            let changed = f.building_type != building_type;
            f.building_type = building_type;
            changed
        })
    }

    pub fn set_residential_only(&mut self, enabled: bool) -> bool {
        self.update(|f| std::mem::replace(&mut f.residential_only, enabled) != enabled)
    }

    pub fn set_exclude_commercial(&mut self, enabled: bool) -> bool {
        self.update(|f| std::mem::replace(&mut f.exclude_commercial, enabled) != enabled)
    }

    /// Toggle a category of the price-band view.
    pub fn toggle_room_category(&mut self, category: RoomCategory) -> bool {
        self.update(|f| {
            if !f.price_band_categories.remove(&category) {
                f.price_band_categories.insert(category);
            }
            true
        })
    }

    /// Toggle a category of the velocity view and area heatmap.
    pub fn toggle_velocity_category(&mut self, category: RoomCategory) -> bool {
        self.update(|f| {
            if !f.velocity_categories.remove(&category) {
                f.velocity_categories.insert(category);
            }
            true
        })
    }

    pub fn set_average_type(&mut self, average_type: AverageType) -> bool {
        self.update(|f| std::mem::replace(&mut f.average_type, average_type) != average_type)
    }

    pub fn set_time_granularity(&mut self, granularity: TimeGranularity) -> bool {
        self.update(|f| std::mem::replace(&mut f.granularity, granularity) != granularity)
    }

    /// Rejects degenerate ranges and leaves the current range in place.
    pub fn set_heatmap_range(&mut self, range: HeatmapRange) -> Result<bool, AnalysisError> {
        range.binner(self.max_buckets)?;
        Ok(self.update(|f| std::mem::replace(&mut f.heatmap, range) != range))
    }

    /// Single-select: choosing the active legend entry again clears it.
    pub fn set_legend_filter(&mut self, legend: LegendFilter) -> bool {
        self.update(|f| {
            f.legend = if f.legend == Some(legend) {
                None
            } else {
                Some(legend)
            };
            true
        })
    }

    pub fn clear_legend_filter(&mut self) -> bool {
        self.update(|f| f.legend.take().is_some())
    }

    pub fn set_floor_premium(&mut self, premium: f64) -> Result<bool, AnalysisError> {
        if !premium.is_finite() {
            return Err(AnalysisError::Validation(format!(
                "floor premium must be a number, got {}",
                premium
            )));
        }
        Ok(self.update(|f| std::mem::replace(&mut f.floor_premium, premium) != premium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup_state() -> FilterState {
        let mut state = FilterState::default();
        state.set_region(Some("台北市".to_string()));
        state.toggle_district("大安區");
        state.toggle_project("X");
        state
    }

    #[test]
    fn test_region_change_clears_selection() {
        let mut state = setup_state();
        assert_eq!(state.filters().projects.len(), 1);

        assert!(state.set_region(Some("新北市".to_string())));
        assert!(state.filters().districts.is_empty());
        assert!(state.filters().projects.is_empty());
        // same region again is a no-op
        let revision = state.revision();
        assert!(!state.set_region(Some("新北市".to_string())));
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn test_clearing_districts_clears_projects() {
        let mut state = setup_state();
        assert!(state.clear_districts());
        assert!(state.filters().projects.is_empty());
        assert!(!state.clear_districts());
    }

    #[test]
    fn test_every_change_bumps_revision() {
        let mut state = FilterState::default();
        let mut rx = state.subscribe();

        state.set_average_type(AverageType::Weighted);
        state.toggle_room_category(RoomCategory::Studio);
        state.set_time_granularity(TimeGranularity::Weekly);
        assert_eq!(state.revision(), 3);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 3);

        assert!(!state.set_average_type(AverageType::Weighted));
        assert_eq!(state.revision(), 3);
        assert!(!state.filters().price_band_categories.contains(&RoomCategory::Studio));
    }

    #[test]
    fn test_legend_is_single_select_toggle() {
        let mut state = FilterState::default();
        let level = LegendFilter::Magnitude { level: 2 };
        let category = LegendFilter::Category {
            category: RoomCategory::TwoRoom,
        };

        state.set_legend_filter(level);
        state.set_legend_filter(category);
        assert_eq!(state.filters().legend, Some(category));
        state.set_legend_filter(category);
        assert_eq!(state.filters().legend, None);
    }

    #[test]
    fn test_bad_heatmap_range_keeps_previous() {
        let mut state = FilterState::default();
        let revision = state.revision();
        let bad = HeatmapRange {
            min_area: 50.0,
            max_area: 10.0,
            interval: 5.0,
        };
        assert!(matches!(
            state.set_heatmap_range(bad),
            Err(AnalysisError::InvalidRange(_))
        ));
        assert_eq!(state.filters().heatmap, HeatmapRange::default());
        assert_eq!(state.revision(), revision);

        let zero = HeatmapRange {
            interval: 0.0,
            ..Default::default()
        };
        assert!(state.set_heatmap_range(zero).is_err());
    }

    #[test]
    fn test_fetch_request_requires_region_and_dates() {
        let mut state = FilterState::default();
        assert!(matches!(
            state.filters().to_fetch_request(),
            Err(AnalysisError::Validation(_))
        ));

        state.set_region(Some("台北市".to_string()));
        assert!(state.filters().to_fetch_request().is_err());

        state.set_date_range(DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap());
        state.set_exclude_commercial(true);
        let request = state.filters().to_fetch_request().unwrap();
        assert_eq!(request.region, "台北市");
        assert_eq!(request.date_start, date(2024, 1, 1));
        assert!(request.exclude_commercial);
        assert_eq!(request.page, 1);
    }

    #[test]
    fn test_snapshot_round_trip_through_json() {
        let mut state = setup_state();
        state.set_floor_premium(0.3).unwrap();
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        let filters: Filters = serde_json::from_str(&json).unwrap();

        let mut restored = FilterState::default();
        restored.restore(filters);
        assert_eq!(restored.filters(), state.filters());
    }

    #[test]
    fn test_floor_premium_must_be_finite() {
        let mut state = FilterState::default();
        assert!(state.set_floor_premium(f64::NAN).is_err());
        assert_eq!(state.filters().floor_premium, 0.0);
    }
}
