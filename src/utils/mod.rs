pub mod binning;
pub mod period;
pub mod stats;

pub use binning::{Bucket, MagnitudeRange, MagnitudeScale, RangeBinner};
pub use period::{format_week_range, iso_week_key, week_date_range, DateRange, TimeGranularity};
pub use stats::{describe, describe_weighted, quantile, PriceTotals, Stats, WeightedSummary};
