//! Area of accumulated change: share of the tile per number of changes in a
//! change-count raster, written as JSON and printed as a table.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdc_core::read_class_grid;
use ccdc_core::tally::{change_histogram, AreaSummary};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "area_change", about = "Summarise a change-count raster as % of tile per number of changes")]
struct Args {
    /// Change-count raster (e.g. CoverPrim1984to2015ct.tif)
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = "area_change.json")]
    output: PathBuf,

    /// Tile / product label stored in the summary
    #[arg(short, long)]
    label: Option<String>,
}

#[derive(Serialize)]
struct Report {
    label: Option<String>,
    input: String,
    #[serde(flatten)]
    summary: AreaSummary,
}

fn print_table(summary: &AreaSummary) {
    eprintln!("\n{:>8} {:>12} {:>9}", "Changes", "Pixels", "% Tile");
    eprintln!("{}", "-".repeat(31));
    for bin in &summary.bins {
        eprintln!("{:>8} {:>12} {:>8.2}%", bin.changes, bin.count, bin.percent);
    }
}

fn run(args: &Args) -> Result<AreaSummary> {
    let grid = read_class_grid(&args.input).with_context(|| format!("Read failed: {}", args.input.display()))?;
    let summary = change_histogram(&grid)
        .with_context(|| format!("{} is not a change-count raster", args.input.display()))?;

    let report = Report {
        label: args.label.clone(),
        input: args.input.display().to_string(),
        summary,
    };
    fs::write(&args.output, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Write failed: {}", args.output.display()))?;
    Ok(report.summary)
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let args = Args::parse();
    let summary = run(&args)?;
    print_table(&summary);
    info!(
        "[area_change] {:.2}% of the tile had at least 1 change; summary in {}",
        summary.percent_changed,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccdc_core::geotiff::write_u8;
    use ccdc_core::{ColorTable, GeoReference, WriteOptions};

    #[test]
    fn report_contains_bins_and_label() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("CoverPrim1984to2015ct.tif");
        write_u8(&input, 2, 2, &[0, 1, 1, 2], &GeoReference::default(), &WriteOptions::default()).unwrap();
        let args = Args {
            input,
            output: dir.path().join("area.json"),
            label: Some("h05v02".into()),
        };

        let summary = run(&args).unwrap();
        assert_eq!(summary.percent_changed, 75.0);

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&args.output).unwrap()).unwrap();
        assert_eq!(json["label"], "h05v02");
        assert_eq!(json["total_pixels"], 4);
        assert_eq!(json["bins"][1]["count"], 2);
    }

    #[test]
    fn reads_count_rasters_written_with_a_palette() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("CoverPrim1984to2015ct.tif");
        let table = ColorTable::parse(
            r#"<Entry c1="255" c2="255" c3="255"/><Entry c1="0" c2="0" c3="255"/><Entry c1="255" c2="0" c3="0"/>"#,
        )
        .unwrap();
        let opts = WriteOptions { color_table: Some(table), nodata: None };
        write_u8(&input, 3, 2, &[0, 0, 1, 2, 2, 2], &GeoReference::default(), &opts).unwrap();
        let args = Args { input, output: dir.path().join("area.json"), label: None };

        let summary = run(&args).unwrap();
        assert_eq!(summary.total_pixels, 6);
        let counts: Vec<u64> = summary.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 3]);
    }
}
