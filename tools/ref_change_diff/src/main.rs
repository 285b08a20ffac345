/// Compare a model change-count raster against a reference change-count
/// raster (NLCD or Trends) over the same interval.
///
/// Output pixel = model * scale + reference (Float32, nodata 0), so 203 reads
/// "model 2 changes, reference 3". Optionally writes the (model, reference)
/// cross-tabulation as JSON.
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use ccdc_core::crosscode::{agreement, cross_code, pair_table, PairCount, DEFAULT_SCALE};
use ccdc_core::geotiff::write_f32;
use ccdc_core::{read_class_grid, WriteOptions};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "ref_change_diff", about = "Cross-code model vs reference change counts")]
struct Args {
    /// Model (CCDC) accumulated change-count raster
    #[arg(long)]
    model: PathBuf,

    /// Reference (NLCD / Trends) change-count raster
    #[arg(long)]
    reference: PathBuf,

    /// Output GeoTIFF
    #[arg(short, long)]
    output: PathBuf,

    /// Multiplier applied to the model value
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    scale: f32,

    /// Also write the model/reference cross-tabulation to this JSON file
    #[arg(long)]
    table: Option<PathBuf>,

    /// Rewrite the output if it already exists
    #[arg(long)]
    overwrite: bool,
}

#[derive(Serialize)]
struct PairTable {
    model: String,
    reference: String,
    total_pixels: u64,
    agreement: f64,
    pairs: Vec<PairCount>,
}

fn run(args: &Args) -> Result<()> {
    if args.output.exists() && !args.overwrite {
        info!("[ref_change_diff] {} was already processed", args.output.display());
        return Ok(());
    }
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Cannot create {}", parent.display()))?;
    }

    info!("[ref_change_diff] matched layers:");
    info!("  model     {}", args.model.display());
    info!("  reference {}", args.reference.display());

    let model = read_class_grid(&args.model).with_context(|| format!("Read failed: {}", args.model.display()))?;
    let reference =
        read_class_grid(&args.reference).with_context(|| format!("Read failed: {}", args.reference.display()))?;

    let coded = cross_code(&model, &reference, args.scale).context("Model and reference do not align")?;
    let opts = WriteOptions { color_table: None, nodata: Some(0.0) };
    write_f32(&args.output, model.width, model.height, &coded, &model.georef, &opts)?;
    info!("[ref_change_diff] wrote {}", args.output.display());

    if let Some(table_path) = &args.table {
        let pairs = pair_table(&model, &reference)?;
        let table = PairTable {
            model: args.model.display().to_string(),
            reference: args.reference.display().to_string(),
            total_pixels: model.len() as u64,
            agreement: agreement(&pairs),
            pairs,
        };
        fs::write(table_path, serde_json::to_string_pretty(&table)?)
            .with_context(|| format!("Write failed: {}", table_path.display()))?;
        info!(
            "[ref_change_diff] {:.2}% agreement, table in {}",
            table.agreement * 100.0,
            table_path.display()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let args = Args::parse();
    let started = Instant::now();
    run(&args)?;
    info!("[ref_change_diff] processing time {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccdc_core::geotiff::write_u8;
    use ccdc_core::GeoReference;
    use std::path::Path;

    fn args(dir: &Path) -> Args {
        Args {
            model: dir.join("ccdc1984to2015ct.tif"),
            reference: dir.join("nlcd92to11ct.tif"),
            output: dir.join("out").join("diff.tif"),
            scale: DEFAULT_SCALE,
            table: Some(dir.join("pairs.json")),
            overwrite: false,
        }
    }

    #[test]
    fn writes_coded_raster_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(dir.path());
        let g = GeoReference::default();
        write_u8(&a.model, 3, 1, &[0, 2, 1], &g, &WriteOptions::default()).unwrap();
        write_u8(&a.reference, 3, 1, &[0, 3, 1], &g, &WriteOptions::default()).unwrap();

        run(&a).unwrap();

        assert!(a.output.exists());
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(dir.path().join("pairs.json")).unwrap()).unwrap();
        assert_eq!(json["total_pixels"], 3);
        assert_eq!(json["pairs"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn mismatched_inputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(dir.path());
        let g = GeoReference::default();
        write_u8(&a.model, 3, 1, &[0, 2, 1], &g, &WriteOptions::default()).unwrap();
        write_u8(&a.reference, 2, 1, &[0, 3], &g, &WriteOptions::default()).unwrap();
        assert!(run(&a).is_err());
        assert!(!a.output.exists());
    }
}
