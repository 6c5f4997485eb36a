pub mod aggregate;
mod cache;
pub mod categorize;
pub mod drilldown;
pub mod grid;
pub mod parking;
mod pipeline;
pub mod ranking;


pub use aggregate::{
    aggregate, available_room_types, key_metrics, price_bands, project_ranking, usage_stats,
    velocity, AggregateGroup, AvailableRoomTypes, KeyMetrics, Metric, PriceBandRow,
    ProjectRankingRow, TransactionFilter, UsageStatsRow, VelocityPeriod, VelocityTable,
};
pub use cache::CacheManager;
pub use categorize::{categorize, CATEGORY_RULES};
pub use drilldown::{resolve, DrillDownResult, ProjectDetail};
pub use grid::{AreaHeatmap, HeatmapCell, PriceGrid, PriceGridUnit, ProjectPriceGrid};
pub use parking::{parking_analysis, ParkingAnalysis};
pub use pipeline::analyze;
pub use ranking::{page_window, paginate, sort_rows, Page, PageLink, SortKey, SortOrder, SortSpec};
