/// Accumulated cover-change counts: for every year `y` in `[from, to]`, writes
/// the number of class changes per pixel between the first year and `y`.
///
/// Inputs:  {input_dir}/*{name}*.tif, one classified cover map per year.
/// Outputs: {output}/{from}_{to}/{name}{first}to{y}ct.tif (8-bit).
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use ccdc_core::discover::{count_output_name, find_layers, interval_dir, layer_year};
use ccdc_core::{read_class_grid, ChangeAccumulator, ColorTable, SentinelClasses, WriteOptions};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info, warn};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cover_changes",
    about = "Count class changes per pixel across annual cover maps, one raster per year interval"
)]
struct Args {
    /// Directory containing the annual cover map layers
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Cover product name matched in file names (e.g. CoverPrim, CoverSec)
    #[arg(short, long)]
    name: String,

    /// Output root directory; a {from}_{to} sub-directory is created in it
    #[arg(short, long)]
    output: PathBuf,

    /// First year of the range
    #[arg(long, default_value = "1984")]
    from: i32,

    /// Last year of the range
    #[arg(long, default_value = "2015")]
    to: i32,

    /// GDAL VRT colour table (<Entry c1=.. c2=.. c3=.. c4=../> lines) embedded as a palette
    #[arg(long)]
    color_table: Option<PathBuf>,

    /// "Insufficient data" class code
    #[arg(long, default_value = "0")]
    insufficient_data: i32,

    /// "Transitional / unclassified" class code
    #[arg(long, default_value = "9")]
    transitional: i32,

    /// Accept layers whose geotransform differs from the first layer
    #[arg(long)]
    ignore_georef: bool,

    /// Rewrite outputs that already exist
    #[arg(long)]
    overwrite: bool,
}

fn needs_write(path: &Path, overwrite: bool) -> bool {
    overwrite || !path.exists()
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn run(args: &Args) -> Result<()> {
    if args.from > args.to {
        bail!("--from {} is after --to {}", args.from, args.to);
    }

    let out_dir = interval_dir(&args.output, args.from, args.to);
    fs::create_dir_all(&out_dir).with_context(|| format!("Cannot create {}", out_dir.display()))?;

    let layers = find_layers(&args.input_dir, &args.name, Some((args.from, args.to)))
        .with_context(|| format!("Cannot list {}", args.input_dir.display()))?;
    if layers.len() < 2 {
        bail!(
            "found {} {} layer(s) for {}-{} in {}; need at least 2",
            layers.len(),
            args.name,
            args.from,
            args.to,
            args.input_dir.display()
        );
    }
    for l in &layers {
        info!("  input {}", l.display());
    }

    let years = layers
        .iter()
        .map(|p| layer_year(p))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs: Vec<PathBuf> = years
        .iter()
        .map(|&y| out_dir.join(count_output_name(&args.name, years[0], y)))
        .collect();

    // Layer i is only needed if some output at or after i still has to be written.
    let Some(last_needed) = (1..outputs.len()).rev().find(|&i| needs_write(&outputs[i], args.overwrite)) else {
        info!("[cover_changes] all {} outputs exist in {}; nothing to do", outputs.len() - 1, out_dir.display());
        return Ok(());
    };

    let color_table = match &args.color_table {
        Some(path) => Some(
            ColorTable::load(path).with_context(|| format!("Cannot load colour table {}", path.display()))?,
        ),
        None => None,
    };
    let opts = WriteOptions { color_table, nodata: None };

    let sentinels = SentinelClasses {
        insufficient_data: args.insufficient_data,
        transitional: args.transitional,
    };
    let first = read_class_grid(&layers[0]).with_context(|| format!("Read failed: {}", layers[0].display()))?;
    info!("[cover_changes] {}x{} pixels, base year {}", first.width, first.height, years[0]);
    debug!("base layer classes {:?}", first.unique_classes());
    if first.georef.is_empty() {
        warn!("{} carries no georeferencing; outputs will not either", layers[0].display());
    }
    let mut acc = ChangeAccumulator::new(first, sentinels).with_georef_check(!args.ignore_georef);

    let mut written = 0usize;
    for i in 1..=last_needed {
        let layer = read_class_grid(&layers[i]).with_context(|| format!("Read failed: {}", layers[i].display()))?;
        acc.push(&layer)
            .with_context(|| format!("Cannot accumulate {}", layers[i].display()))?;
        drop(layer);

        let out = &outputs[i];
        if !needs_write(out, args.overwrite) {
            info!("  {} exists, skipping", out.display());
            continue;
        }
        info!(
            "  generating {} from years {} and {} (max {} changes)",
            out.display(),
            years[0],
            years[i],
            acc.max_count()
        );
        acc.write_counts(out, &opts)?;
        written += 1;
    }

    info!("[cover_changes] wrote {} raster(s) to {}", written, out_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let args = Args::parse();
    let started = Instant::now();
    info!("[cover_changes] processing started");

    run(&args)?;

    info!("[cover_changes] completed in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}
