use chrono::NaiveDate;
use presalestats::analysis::SortKey;
use presalestats::app::{FetchDisposition, LoadStatus};
use presalestats::remote::{DateConfig, MemoryBackend, TransactionSource, ViewMode};
use presalestats::types::ParkingInfo;
use presalestats::utils::DateRange;
use presalestats::{AnalysisError, App, LegendFilter, RoomCategory, Settings, Transaction};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sale(id: usize, project: &str, district: &str, rooms: u32, area: f64, price: f64) -> Transaction {
    Transaction {
        id: format!("T{:04}", id),
        project_name: project.to_string(),
        county: "台北市".to_string(),
        district: district.to_string(),
        transaction_date: date(2024, 1 + (id % 12) as u32, 10),
        building_type: "住宅大樓".to_string(),
        main_purpose: "住家用".to_string(),
        room_count: Some(rooms),
        bathroom_count: Some(1),
        house_area_ping: area,
        total_price: price,
        unit_price: price / area,
        floor: Some(3 + (id % 10) as i32),
        unit_label: Some(format!("A{}", id % 3 + 1)),
        parking: (id % 2 == 0).then(|| ParkingInfo {
            parking_type: "坡道平面".to_string(),
            price: 250.0,
            floor: Some("B2".to_string()),
        }),
        remark: String::new(),
    }
}

fn setup_backend() -> MemoryBackend {
    let mut rows = Vec::new();
    for i in 0..30 {
        let (project, district) = match i % 3 {
            0 => ("信義之星", "信義區"),
            1 => ("大安學苑", "大安區"),
            _ => ("松山雲邸", "松山區"),
        };
        let rooms = 1 + (i % 4) as u32;
        let area = 15.0 + 5.0 * rooms as f64 + (i % 5) as f64;
        rows.push(sale(i, project, district, rooms, area, area * (80.0 + i as f64)));
    }
    let mut shop = sale(99, "信義之星", "信義區", 0, 30.0, 5000.0);
    shop.building_type = "店舖".to_string();
    rows.push(shop);
    MemoryBackend::new(rows)
}

fn setup_app(settings: Settings) -> App {
    let mut app = App::new(settings);
    let filters = app.filters_mut();
    filters.set_region(Some("台北市".to_string()));
    filters.set_date_range(DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap());
    app
}

#[tokio::test]
async fn test_load_and_analyze() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());

    let disposition = app.load(&backend).await.unwrap();
    assert_eq!(disposition, FetchDisposition::Applied);
    assert_eq!(app.status(), &LoadStatus::Ready);

    let result = app.analysis().unwrap();
    assert_eq!(result.transaction_count, 31);
    assert_eq!(result.available_projects.len(), 3);
    assert_eq!(result.key_metrics.project_count, 3);
    assert!(result
        .available_room_types
        .velocity
        .contains(&RoomCategory::Storefront));
    assert_eq!(result.parking.ratio.with_parking, 15);
}

#[tokio::test]
async fn test_local_filters_recompute_without_refetch() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());
    app.load(&backend).await.unwrap();
    let before = app.analysis().unwrap().revision;

    app.filters_mut().set_exclude_commercial(true);
    let result = app.analysis().unwrap();
    assert!(result.revision > before);
    assert_eq!(result.transaction_count, 30);

    app.filters_mut().toggle_district("大安區");
    let result = app.analysis().unwrap();
    assert_eq!(result.available_projects, vec!["大安學苑"]);
    assert_eq!(result.transaction_count, 10);
}

#[tokio::test]
async fn test_concurrent_fetches_apply_latest_only() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());

    let first = app.begin_fetch().unwrap();
    app.filters_mut().toggle_district("松山區");
    let second = app.begin_fetch().unwrap();

    let (r1, r2) = futures::join!(backend.fetch(first.request()), backend.fetch(second.request()));
    assert_eq!(app.complete_fetch(second, r2), FetchDisposition::Applied);
    assert_eq!(app.complete_fetch(first, r1), FetchDisposition::Superseded);

    assert_eq!(app.dataset().len(), 10);
    assert!(app
        .dataset()
        .iter()
        .all(|tx| tx.district == "松山區"));
}

#[tokio::test]
async fn test_no_data_and_validation() {
    let backend = setup_backend();
    let mut app = App::default();
    assert!(matches!(
        app.load(&backend).await,
        Err(AnalysisError::Validation(_))
    ));

    let mut app = setup_app(Settings::default());
    app.filters_mut().set_region(Some("花蓮縣".to_string()));
    app.filters_mut()
        .set_date_range(DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap());
    assert_eq!(app.load(&backend).await.unwrap(), FetchDisposition::NoData);
    assert_eq!(app.status(), &LoadStatus::NoData);
    assert!(app.analysis().is_none());
}

#[tokio::test]
async fn test_upstream_failure_is_retryable() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());
    app.load(&backend).await.unwrap();

    backend.set_unavailable(true);
    app.filters_mut().toggle_project("信義之星");
    match app.load(&backend).await.unwrap() {
        FetchDisposition::Failed(err) => assert!(err.is_retryable()),
        other => panic!("unexpected disposition {:?}", other),
    }
    // local aggregates follow the filters over the rows already loaded
    assert_eq!(app.analysis().unwrap().transaction_count, 11);

    backend.set_unavailable(false);
    assert_eq!(app.load(&backend).await.unwrap(), FetchDisposition::Applied);
}

#[tokio::test]
async fn test_heatmap_drill_down_and_legend() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());
    app.load(&backend).await.unwrap();

    let (category, bucket, count) = {
        let heatmap = &app.analysis().unwrap().area_heatmap;
        let (bucket, col) = heatmap
            .cells
            .iter()
            .enumerate()
            .flat_map(|(b, row)| row.iter().enumerate().map(move |(c, cell)| (b, c, cell.count)))
            .max_by_key(|&(_, _, count)| count)
            .map(|(b, c, _)| (b, c))
            .unwrap();
        let cell = &heatmap.cells[bucket][col];
        (cell.col_key, bucket, cell.count)
    };

    let drill = app.select_heatmap_cell(category, bucket).unwrap();
    assert_eq!(drill.total_count(), count);
    let counts: Vec<usize> = drill.per_project_details.iter().map(|p| p.count).collect();
    let mut sorted = counts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(counts, sorted);

    app.filters_mut()
        .set_legend_filter(LegendFilter::Category { category });
    assert!(app.drill_down().is_none());
    let heatmap = &app.analysis().unwrap().area_heatmap;
    assert!(heatmap
        .cells
        .iter()
        .flatten()
        .all(|cell| cell.highlighted == (cell.col_key == category)));
}

#[tokio::test]
async fn test_ranking_pages_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "page_size = 2").unwrap();
    let settings = Settings::load(file.path()).unwrap();

    let backend = setup_backend();
    let mut app = setup_app(settings);
    app.load(&backend).await.unwrap();

    let page = app.ranking_page().unwrap();
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].sale_amount_sum >= page.items[1].sale_amount_sum);

    app.toggle_ranking_sort(SortKey::TransactionCount);
    app.set_ranking_page(2);
    let page = app.ranking_page().unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_share_and_restore() {
    let backend = setup_backend();
    let mut app = setup_app(Settings::default());
    app.load(&backend).await.unwrap();
    app.filters_mut().set_floor_premium(0.5).unwrap();
    let shared = app.analysis().unwrap().clone();

    let response = app
        .share(
            &backend,
            ViewMode::Heatmap,
            DateConfig::Relative {
                value: "6m".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.token(), "report-1");

    let mut viewer = App::default();
    let today = date(2024, 12, 31);
    let mode = viewer.restore(&backend, response.token(), today).await.unwrap();
    assert_eq!(mode, ViewMode::Heatmap);

    let filters = viewer.filters().filters();
    assert_eq!(filters.region.as_deref(), Some("台北市"));
    assert_eq!(filters.floor_premium, 0.5);
    assert_eq!(
        filters.date_range,
        Some(DateRange::new(date(2024, 6, 30), today).unwrap())
    );

    // the transmitted aggregates are shown as-is
    let restored = viewer.analysis().unwrap();
    assert_eq!(restored.project_ranking, shared.project_ranking);
    assert_eq!(restored.area_heatmap, shared.area_heatmap);

    assert!(viewer.restore(&backend, "report-404", today).await.is_err());
}
