//! Pre-sale Transaction Statistics
//!
//! Loads a JSON array of transactions, applies the given filters and prints every
//! aggregate as JSON.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tokio::runtime::Runtime;

use presalestats::analysis::page_window;
use presalestats::app::LoadStatus;
use presalestats::remote::MemoryBackend;
use presalestats::utils::{DateRange, TimeGranularity};
use presalestats::{App, AverageType, Settings, Transaction};

#[derive(Debug, Parser)]
#[command(name = "presalestats", version, about = "Pre-sale transaction statistics")]
struct Args {
    /// JSON file holding an array of transactions
    #[arg(short, long)]
    input: PathBuf,

    /// Settings file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// County or city
    #[arg(short, long)]
    region: String,

    #[arg(long)]
    district: Vec<String>,

    #[arg(long)]
    project: Vec<String>,

    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: NaiveDate,

    /// Last day, YYYY-MM-DD
    #[arg(long)]
    to: NaiveDate,

    #[arg(long)]
    building_type: Option<String>,

    #[arg(long)]
    exclude_commercial: bool,

    #[arg(long)]
    residential_only: bool,

    #[arg(long, value_parser = parse_granularity)]
    granularity: Option<TimeGranularity>,

    #[arg(long, value_parser = parse_average)]
    average: Option<AverageType>,

    /// 萬/坪 per floor above a project's lowest floor
    #[arg(long)]
    floor_premium: Option<f64>,

    /// Print one ranking page instead of the full analysis
    #[arg(long)]
    ranking_page: Option<usize>,
}

fn parse_granularity(value: &str) -> Result<TimeGranularity, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("expected weekly, monthly, quarterly or yearly, got '{}'", value))
}

fn parse_average(value: &str) -> Result<AverageType, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("expected arithmetic, weighted or median, got '{}'", value))
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)?,
        None => Settings::discover()?,
    };
    Ok(settings)
}

fn configure(app: &mut App, args: &Args) -> Result<()> {
    let filters = app.filters_mut();
    filters.set_region(Some(args.region.clone()));
    for district in &args.district {
        filters.toggle_district(district);
    }
    for project in &args.project {
        filters.toggle_project(project);
    }
    filters.set_date_range(DateRange::new(args.from, args.to)?);
    filters.set_building_type(args.building_type.clone());
    filters.set_exclude_commercial(args.exclude_commercial);
    filters.set_residential_only(args.residential_only);
    if let Some(granularity) = args.granularity {
        filters.set_time_granularity(granularity);
    }
    if let Some(average) = args.average {
        filters.set_average_type(average);
    }
    if let Some(premium) = args.floor_premium {
        filters.set_floor_premium(premium)?;
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let settings = load_settings(args.config.as_ref()).context("Failed to load settings")?;

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let rows: Vec<Transaction> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    let backend = MemoryBackend::new(rows);

    let mut app = App::new(settings);
    configure(&mut app, &args)?;
    app.load(&backend).await?;

    match app.status() {
        LoadStatus::NoData => {
            println!("{}", serde_json::json!({ "message": "no data" }));
            return Ok(());
        }
        LoadStatus::Failed(message) => bail!("Failed to load transactions: {}", message),
        _ => {}
    }

    if let Some(page) = args.ranking_page {
        app.set_ranking_page(page);
        let page = app.ranking_page().context("No analysis available")?;
        let links = page_window(page.page, page.total_pages);
        let output = serde_json::json!({ "page": page, "links": links });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    app.refresh().context("Analysis failed")?;
    let result = app.analysis().context("No analysis available")?;
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let rt = Runtime::new().context("Failed to start the Tokio runtime")?;
    rt.block_on(run(args))
}
