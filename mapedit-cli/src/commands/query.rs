//! Query features from a GeoJSON-style file.

use clap::Args;
use mapedit::editor::Editor;
use mapedit::geom::{Feature, LonLat, Rect};
use mapedit::store::{ProviderConfig, Query};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::error::CliError;

/// Arguments for the query command.
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Input file: a JSON array of features
    #[arg(long)]
    input: PathBuf,

    /// Search center as "lon,lat" (requires --radius)
    #[arg(long, conflicts_with = "rect")]
    center: Option<String>,

    /// Search radius in meters
    #[arg(long, requires = "center")]
    radius: Option<f64>,

    /// Search rectangle as "min_lon,min_lat,max_lon,max_lat"
    #[arg(long)]
    rect: Option<String>,
}

/// Run a query against the features in the input file.
pub fn run(args: QueryArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.input).map_err(|source| CliError::Read {
        path: args.input.clone(),
        source,
    })?;
    let features: Vec<Feature> = serde_json::from_str(&raw)
        .map_err(|e| CliError::Parse(format!("{}: {e}", args.input.display())))?;

    let mut editor = Editor::new();
    editor.add_provider(ProviderConfig::new("cli"));
    let store = editor
        .provider_mut("cli")
        .unwrap_or_else(|| unreachable!("just registered"));
    let loaded = store.add_features(features).len();
    info!(loaded, "features loaded");

    let query = build_query(&args)?;
    let results = store.search(&query).features();

    let json = serde_json::to_string_pretty(&results)
        .map_err(|e| CliError::Parse(e.to_string()))?;
    println!("{json}");
    eprintln!("{} of {} features matched", results.len(), loaded);
    Ok(())
}

fn build_query(args: &QueryArgs) -> Result<Query, CliError> {
    match (&args.center, args.radius, &args.rect) {
        (Some(center), Some(radius), None) => {
            if radius < 0.0 {
                return Err(CliError::Parse("radius must be non-negative".into()));
            }
            Ok(Query::radius(parse_lonlat(center)?, radius))
        }
        (None, None, Some(rect)) => Ok(Query::Rect(parse_rect(rect)?)),
        _ => Err(CliError::Parse(
            "give either --center with --radius, or --rect".into(),
        )),
    }
}

fn parse_lonlat(s: &str) -> Result<LonLat, CliError> {
    let nums = parse_floats(s)?;
    let [lon, lat] = nums.as_slice() else {
        return Err(CliError::Parse(format!("expected lon,lat, got {s:?}")));
    };
    Ok(LonLat::new(*lon, *lat))
}

fn parse_rect(s: &str) -> Result<Rect, CliError> {
    let nums = parse_floats(s)?;
    let [min_lon, min_lat, max_lon, max_lat] = nums.as_slice() else {
        return Err(CliError::Parse(format!(
            "expected min_lon,min_lat,max_lon,max_lat, got {s:?}"
        )));
    };
    Ok(Rect::new(*min_lon, *min_lat, *max_lon, *max_lat))
}

fn parse_floats(s: &str) -> Result<Vec<f64>, CliError> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| CliError::Parse(format!("bad number {part:?}")))
        })
        .collect()
}
