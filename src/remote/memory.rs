use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{
    FetchRequest, FetchResponse, ReportStore, ShareRequest, ShareResponse, SharedReport,
    TransactionSource,
};
use crate::error::AnalysisError;
use crate::types::Transaction;

/// In-process storage and share service over a fixed transaction list.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    transactions: Vec<Transaction>,
    reports: Mutex<HashMap<String, SharedReport>>,
    next_report: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            ..Default::default()
        }
    }

    /// While set, every call fails with [`AnalysisError::Upstream`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AnalysisError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AnalysisError::Upstream("memory backend is unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TransactionSource for MemoryBackend {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, AnalysisError> {
        self.check_available()?;

        let filter = request.transaction_filter();
        let matching: Vec<&Transaction> = filter.apply(&self.transactions);
        if matching.is_empty() {
            return Ok(FetchResponse::no_data());
        }

        let total_count = matching.len();
        let page: Vec<Transaction> = match request.page_size {
            Some(size) if size > 0 => matching
                .into_iter()
                .skip(request.page.saturating_sub(1) * size)
                .take(size)
                .cloned()
                .collect(),
            _ => matching.into_iter().cloned().collect(),
        };
        log::debug!(
            "memory backend returned {} of {} rows for {}",
            page.len(),
            total_count,
            request.region
        );
        Ok(FetchResponse::Rows {
            transactions: page,
            total_count,
        })
    }
}

#[async_trait]
impl ReportStore for MemoryBackend {
    async fn store(&self, request: ShareRequest) -> Result<ShareResponse, AnalysisError> {
        self.check_available()?;
        let id = self.next_report.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("report-{}", id);
        self.reports.lock().await.insert(token.clone(), request);
        Ok(ShareResponse {
            public_url: format!("memory://reports/{}", token),
        })
    }

    async fn load(&self, token: &str) -> Result<SharedReport, AnalysisError> {
        self.check_available()?;
        self.reports
            .lock()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| AnalysisError::Upstream(format!("unknown report token '{}'", token)))
    }
}
