//! Request/response shapes of the storage and share services, and the traits the
//! session talks to them through.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::TransactionFilter;
use crate::app::Filters;
use crate::error::AnalysisError;
use crate::types::{AnalysisResult, Transaction};
use crate::utils::DateRange;

pub mod memory;

pub use memory::MemoryBackend;

/// Query for raw transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub region: String,
    pub districts: Vec<String>,
    pub project_names: Vec<String>,
    pub building_type: Option<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub residential_only: bool,
    pub exclude_commercial: bool,
    /// 1-based
    pub page: usize,
    /// `None` asks for every matching row
    pub page_size: Option<usize>,
}

impl FetchRequest {
    pub fn transaction_filter(&self) -> TransactionFilter {
        TransactionFilter {
            county: Some(self.region.clone()),
            districts: self.districts.clone(),
            projects: self.project_names.clone(),
            date_range: Some(DateRange {
                start: self.date_start,
                end: self.date_end,
            }),
            building_type: self.building_type.clone(),
            residential_only: self.residential_only,
            exclude_commercial: self.exclude_commercial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FetchResponse {
    Rows {
        transactions: Vec<Transaction>,
        #[serde(rename = "totalCount")]
        total_count: usize,
    },
    Empty {
        message: String,
    },
}

impl FetchResponse {
    pub fn no_data() -> Self {
        FetchResponse::Empty {
            message: "no data".to_string(),
        }
    }

    /// Rows of a successful query; zero rows is [`AnalysisError::EmptyResult`].
    pub fn into_transactions(self) -> Result<Vec<Transaction>, AnalysisError> {
        match self {
            FetchResponse::Rows { transactions, .. } if !transactions.is_empty() => {
                Ok(transactions)
            }
            _ => Err(AnalysisError::EmptyResult),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Standard,
    Heatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_premium: Option<f64>,
}

/// Date range of a shared report, fixed or trailing from the day it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DateConfig {
    Absolute { start: NaiveDate, end: NaiveDate },
    /// `<n>d`, `<n>m` or `<n>y`
    Relative { value: String },
}

impl DateConfig {
    pub fn resolve(&self, today: NaiveDate) -> Result<DateRange, AnalysisError> {
        match self {
            DateConfig::Absolute { start, end } => DateRange::new(*start, *end),
            DateConfig::Relative { value } => DateRange::trailing(value, today),
        }
    }
}

/// Everything needed to reopen a view without recomputing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub filters: Filters,
    pub view_mode: ViewMode,
    pub view_options: ViewOptions,
    pub date_config: DateConfig,
    pub analysis_data: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub public_url: String,
}

impl ShareResponse {
    /// Last path segment of the public URL.
    pub fn token(&self) -> &str {
        self.public_url
            .rsplit('/')
            .next()
            .unwrap_or(self.public_url.as_str())
    }
}

/// A stored report as returned by the read endpoint.
pub type SharedReport = ShareRequest;

/// Storage/query service holding the raw transactions.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, AnalysisError>;
}

/// Share service persisting report snapshots behind a token.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn store(&self, request: ShareRequest) -> Result<ShareResponse, AnalysisError>;
    async fn load(&self, token: &str) -> Result<SharedReport, AnalysisError>;
}
