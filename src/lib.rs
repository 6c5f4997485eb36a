//! # Pre-sale Transaction Statistics Library
//!
//! `presalestats` is the aggregation and cross-filter engine behind a real-estate
//! pre-sale dashboard. It classifies transactions into room categories, computes
//! grouped statistics, bins continuous fields into heatmaps and price grids, and keeps
//! every view consistent with one shared filter state.
//!
//! ## Features
//!
//! - Ordered room/usage classification
//! - Percentiles, arithmetic and area-weighted means
//! - Project ranking with stable sorting and pagination
//! - Price bands, sales velocity and parking statistics
//! - Area heatmap with cell drill-down
//! - Unit-price × total-price grid with floor premium adjustment
//! - Request sequencing, dataset caching and shareable reports
//!
//! ## Example
//!
//! ```no_run
//! use presalestats::remote::MemoryBackend;
//! use presalestats::utils::DateRange;
//! use presalestats::App;
//! use chrono::NaiveDate;
//!
//! # async fn run(rows: Vec<presalestats::Transaction>) -> Result<(), presalestats::AnalysisError> {
//! let backend = MemoryBackend::new(rows);
//! let mut app = App::default();
//! app.filters_mut().set_region(Some("台北市".to_string()));
//! app.filters_mut().set_date_range(DateRange::new(
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
//! )?);
//! app.load(&backend).await?;
//!
//! if let Some(result) = app.analysis() {
//!     println!("{} transactions", result.transaction_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod app;
pub mod config;
pub mod error;
pub mod remote;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use app::{App, FilterState, Filters};
pub use config::Settings;
pub use error::{AnalysisError, InvalidRangeError};
pub use types::{AnalysisResult, AverageType, LegendFilter, RoomCategory, Transaction};
