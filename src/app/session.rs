use chrono::NaiveDate;
use std::sync::Arc;

use super::state::FilterState;
use crate::analysis::{
    analyze, paginate, resolve, sort_rows, CacheManager, DrillDownResult, Page, ProjectRankingRow,
    SortKey, SortSpec,
};
use crate::config::Settings;
use crate::error::AnalysisError;
use crate::remote::{
    DateConfig, FetchRequest, FetchResponse, ReportStore, ShareRequest, ShareResponse,
    TransactionSource, ViewMode, ViewOptions,
};
use crate::types::{AnalysisResult, RoomCategory, Transaction};

/// Where the session stands with respect to its data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last query matched nothing
    NoData,
    /// The last fetch failed; earlier aggregates are still shown
    Failed(String),
}

/// Identifies one fetch; only the most recent ticket is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    sequence: u64,
    request: FetchRequest,
}

impl RequestTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }
}

/// What [`App::complete_fetch`] did with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchDisposition {
    Applied,
    NoData,
    /// A newer request was started after this one
    Superseded,
    Failed(AnalysisError),
}

/// Analysis session
pub struct App {
    pub settings: Settings,
    filters: FilterState,
    dataset: Arc<Vec<Transaction>>,
    dataset_dirty: bool,
    analysis: Option<AnalysisResult>,
    analysis_error: Option<AnalysisError>,
    drill_down: Option<DrillDownResult>,
    ranking_sort: SortSpec,
    ranking_page: usize,
    request_sequence: u64,
    cache: CacheManager,
    status: LoadStatus,
}

impl Default for App {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            filters: FilterState::from_settings(&settings),
            cache: CacheManager::new(settings.cache_capacity),
            settings,
            dataset: Arc::new(Vec::new()),
            dataset_dirty: false,
            analysis: None,
            analysis_error: None,
            drill_down: None,
            ranking_sort: SortSpec::default(),
            ranking_page: 1,
            request_sequence: 0,
            status: LoadStatus::Idle,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Every change made through the returned state invalidates the aggregates.
    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn dataset(&self) -> &[Transaction] {
        &self.dataset
    }

    /// Validate the filters and start a fetch. Any earlier ticket becomes stale.
    pub fn begin_fetch(&mut self) -> Result<RequestTicket, AnalysisError> {
        let request = self.filters.filters().to_fetch_request()?;
        self.request_sequence += 1;
        self.status = LoadStatus::Loading;
        Ok(RequestTicket {
            sequence: self.request_sequence,
            request,
        })
    }

    pub fn complete_fetch(
        &mut self,
        ticket: RequestTicket,
        response: Result<FetchResponse, AnalysisError>,
    ) -> FetchDisposition {
        if ticket.sequence != self.request_sequence {
            log::warn!(
                "discarding response to request {} (current is {})",
                ticket.sequence,
                self.request_sequence
            );
            return FetchDisposition::Superseded;
        }

        match response.and_then(FetchResponse::into_transactions) {
            Ok(rows) => {
                let rows = Arc::new(rows);
                self.cache.store(ticket.request, Arc::clone(&rows));
                self.set_dataset(rows);
                FetchDisposition::Applied
            }
            Err(AnalysisError::EmptyResult) => {
                log::info!("query matched no transactions");
                self.dataset = Arc::new(Vec::new());
                self.analysis = None;
                self.drill_down = None;
                self.dataset_dirty = false;
                self.status = LoadStatus::NoData;
                FetchDisposition::NoData
            }
            Err(e) => {
                log::warn!("fetch failed: {}", e);
                self.status = LoadStatus::Failed(e.to_string());
                FetchDisposition::Failed(e)
            }
        }
    }

    /// Fetch the current selection, reusing a cached dataset for an identical request.
    pub async fn load(
        &mut self,
        source: &dyn TransactionSource,
    ) -> Result<FetchDisposition, AnalysisError> {
        let ticket = self.begin_fetch()?;
        if let Some(rows) = self.cache.get(ticket.request()) {
            log::debug!("dataset cache hit for {}", ticket.request().region);
            self.set_dataset(rows);
            return Ok(FetchDisposition::Applied);
        }

        let response = source.fetch(ticket.request()).await;
        Ok(self.complete_fetch(ticket, response))
    }

    fn set_dataset(&mut self, rows: Arc<Vec<Transaction>>) {
        log::info!("loaded {} transactions", rows.len());
        self.dataset = rows;
        self.dataset_dirty = true;
        self.drill_down = None;
        self.ranking_page = 1;
        self.status = LoadStatus::Ready;
    }

    /// Recompute the aggregates if the filters or the dataset moved since the last pass.
    ///
    /// On failure the previous result stays in place and the error is kept for
    /// [`App::analysis_error`].
    pub fn refresh(&mut self) -> Result<(), AnalysisError> {
        let revision = self.filters.revision();
        let fresh = self
            .analysis
            .as_ref()
            .is_some_and(|a| a.revision == revision);
        if (fresh && !self.dataset_dirty) || self.dataset.is_empty() {
            return Ok(());
        }

        match analyze(&self.dataset, self.filters.filters(), &self.settings) {
            Ok(mut result) => {
                result.revision = revision;
                self.analysis = Some(result);
                self.analysis_error = None;
                self.dataset_dirty = false;
                Ok(())
            }
            Err(e) => {
                log::warn!("keeping previous aggregates: {}", e);
                self.analysis_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Current aggregates, recomputed first when stale.
    pub fn analysis(&mut self) -> Option<&AnalysisResult> {
        // the error is kept on the session and the old result is still returned
        let _ = self.refresh();
        self.analysis.as_ref()
    }

    /// True when the held aggregates were computed for an older filter revision and could
    /// not be recomputed, e.g. after a filter change on a restored report. A fetch brings
    /// them back in line.
    pub fn is_stale(&self) -> bool {
        self.analysis
            .as_ref()
            .is_some_and(|a| a.revision != self.filters.revision())
    }

    pub fn analysis_error(&self) -> Option<&AnalysisError> {
        self.analysis_error.as_ref()
    }

    /// Resolve a heatmap cell and keep the result until the next selection or filter change.
    pub fn select_heatmap_cell(
        &mut self,
        category: RoomCategory,
        bucket_index: usize,
    ) -> Result<&DrillDownResult, AnalysisError> {
        if self.dataset.is_empty() {
            return Err(AnalysisError::Validation("no transactions loaded".into()));
        }
        self.refresh()?;

        let filters = self.filters.filters();
        let binner = filters.heatmap.binner(self.settings.max_buckets)?;
        let filtered = filters.transaction_filter().apply(&self.dataset);
        let result = resolve(&filtered, category, &binner, bucket_index).ok_or_else(|| {
            AnalysisError::Validation(format!("no heatmap bucket {}", bucket_index))
        })?;

        Ok(&*self.drill_down.insert(result))
    }

    /// The last drill-down, unless the aggregates were recomputed since.
    pub fn drill_down(&self) -> Option<&DrillDownResult> {
        let current = self
            .analysis
            .as_ref()
            .is_some_and(|a| a.revision == self.filters.revision() && !self.dataset_dirty);
        self.drill_down.as_ref().filter(|_| current)
    }

    pub fn ranking_sort(&self) -> SortSpec {
        self.ranking_sort
    }

    /// Sort by `key`, flipping the order when it is already active. Back to page 1.
    pub fn toggle_ranking_sort(&mut self, key: SortKey) {
        self.ranking_sort = self.ranking_sort.toggle(key);
        self.ranking_page = 1;
    }

    pub fn set_ranking_page(&mut self, page: usize) {
        self.ranking_page = page;
    }

    /// Sorted and paginated ranking rows. Never triggers re-aggregation by itself.
    pub fn ranking_page(&mut self) -> Option<Page<ProjectRankingRow>> {
        let _ = self.refresh();
        let mut rows = self.analysis.as_ref()?.project_ranking.clone();
        sort_rows(&mut rows, self.ranking_sort);
        let page = paginate(&rows, self.ranking_page, self.settings.page_size);
        self.ranking_page = page.page;
        Some(page)
    }

    /// Publish the current filters together with the computed aggregates.
    pub async fn share(
        &mut self,
        store: &dyn ReportStore,
        view_mode: ViewMode,
        date_config: DateConfig,
    ) -> Result<ShareResponse, AnalysisError> {
        self.refresh()?;
        let analysis_data = self
            .analysis
            .clone()
            .ok_or_else(|| AnalysisError::Validation("nothing to share yet".into()))?;
        let filters = self.filters.snapshot();
        let floor_premium = (filters.floor_premium != 0.0).then_some(filters.floor_premium);

        let response = store
            .store(ShareRequest {
                filters,
                view_mode,
                view_options: ViewOptions { floor_premium },
                date_config,
                analysis_data,
            })
            .await?;
        log::info!("shared report at {}", response.public_url);
        Ok(response)
    }

    /// Rebuild the filters of a shared report and show its aggregates as transmitted.
    ///
    /// Relative date ranges are resolved against `today`. No raw rows come with a report,
    /// so drill-down needs a fresh fetch, and later filter changes leave the aggregates
    /// [`App::is_stale`] until one completes.
    pub async fn restore(
        &mut self,
        store: &dyn ReportStore,
        token: &str,
        today: NaiveDate,
    ) -> Result<ViewMode, AnalysisError> {
        let report = store.load(token).await?;
        let mut filters = report.filters;
        filters.date_range = Some(report.date_config.resolve(today)?);
        if let Some(premium) = report.view_options.floor_premium {
            filters.floor_premium = premium;
        }

        self.filters.restore(filters);
        let mut analysis = report.analysis_data;
        analysis.revision = self.filters.revision();
        self.analysis = Some(analysis);
        self.analysis_error = None;
        self.dataset = Arc::new(Vec::new());
        self.dataset_dirty = false;
        self.drill_down = None;
        self.ranking_page = 1;
        self.status = LoadStatus::Ready;
        log::info!("restored report {}", token);
        Ok(report.view_mode)
    }
}
