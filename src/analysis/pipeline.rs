use std::time::Instant;

use super::aggregate::{
    available_room_types, key_metrics, price_bands, project_ranking, usage_stats, velocity,
};
use super::grid::{area_heatmap, price_grid, project_grids, FloorAdjuster, PriceGridAxes};
use super::parking::parking_analysis;
use crate::app::Filters;
use crate::config::Settings;
use crate::error::AnalysisError;
use crate::types::{AnalysisResult, Transaction};

/// Recompute every view for `filters` in one pass over `transactions`.
///
/// The filtered subset is computed once and handed to every view. Fails only when the
/// heatmap range cannot be built; in that case nothing is produced and the caller keeps
/// its previous result. Price grid axes follow the data and never fail the pass.
pub fn analyze(
    transactions: &[Transaction],
    filters: &Filters,
    settings: &Settings,
) -> Result<AnalysisResult, AnalysisError> {
    let start = Instant::now();

    let filtered = filters.transaction_filter().apply(transactions);
    let binner = filters.heatmap.binner(settings.max_buckets)?;
    let adjuster = FloorAdjuster::new(&filtered, filters.floor_premium);
    let axes = PriceGridAxes::spanning(
        &filtered,
        &adjuster,
        settings.unit_price_interval,
        settings.total_price_interval,
        settings.max_buckets,
    )
    .unwrap_or_else(|e| {
        log::warn!("price grid left empty: {}", e);
        None
    });

    let project_ranking = project_ranking(&filtered);
    let available_projects = project_ranking
        .iter()
        .map(|row| row.project_name.clone())
        .collect();

    let result = AnalysisResult {
        revision: 0,
        transaction_count: filtered.len(),
        key_metrics: key_metrics(&filtered),
        price_bands: price_bands(&filtered, &filters.price_band_categories),
        unit_price_stats: usage_stats(&filtered),
        parking: parking_analysis(&filtered),
        velocity: velocity(&filtered, &filters.velocity_categories, filters.granularity),
        area_heatmap: area_heatmap(
            &filtered,
            &filters.velocity_categories,
            &binner,
            filters.legend.as_ref(),
        ),
        price_grid: price_grid(&filtered, &adjuster, axes.as_ref()),
        project_grids: project_grids(&filtered, &adjuster, filters.legend.as_ref()),
        available_room_types: available_room_types(&filtered),
        available_projects,
        project_ranking,
    };

    log::debug!(
        "analyzed {} of {} transactions in {:.1}ms",
        filtered.len(),
        transactions.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(result)
}
