//! From-to land-cover change tables: for every from-to class raster in a
//! directory, count pixels per class and group them by "from" class.
//! Output: {output_dir}/{tile}_{stem}_classes.json per input raster.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ccdc_core::read_class_grid;
use ccdc_core::tally::{class_counts, group_by_from, FromGroup, NLCD_RECODE_CLASSES};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "class_tally", about = "Count pixels per from-to class for every raster in a directory")]
struct Args {
    /// Directory of from-to class rasters (*.tif)
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Output directory for the JSON tables
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Tile name used in output names (e.g. h05v02)
    #[arg(short, long)]
    tile: String,

    /// Report the fixed recoded NLCD class list instead of the classes present
    #[arg(long)]
    recode: bool,
}

#[derive(Serialize)]
struct ClassTable {
    tile: String,
    input: String,
    total_pixels: u64,
    groups: Vec<FromGroup>,
}

fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("tif"))
        .collect();
    paths.sort();
    Ok(paths)
}

fn tally_one(path: &Path, args: &Args) -> Result<PathBuf> {
    let grid = read_class_grid(path).with_context(|| format!("Read failed: {}", path.display()))?;
    let classes = args.recode.then_some(&NLCD_RECODE_CLASSES[..]);
    let rows = class_counts(&grid, classes);

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("raster");
    let table = ClassTable {
        tile: args.tile.clone(),
        input: path.display().to_string(),
        total_pixels: grid.len() as u64,
        groups: group_by_from(rows),
    };
    let out = args.output_dir.join(format!("{}_{}_classes.json", args.tile, stem));
    fs::write(&out, serde_json::to_string_pretty(&table)?)
        .with_context(|| format!("Write failed: {}", out.display()))?;
    Ok(out)
}

fn run(args: &Args) -> Result<usize> {
    let inputs = discover(&args.input_dir)?;
    if inputs.is_empty() {
        anyhow::bail!("no .tif files in {}", args.input_dir.display());
    }
    fs::create_dir_all(&args.output_dir)?;
    info!("[class_tally] {} raster(s) in {}", inputs.len(), args.input_dir.display());

    let results: Vec<Result<PathBuf>> = inputs.par_iter().map(|p| tally_one(p, args)).collect();

    let mut written = 0usize;
    for res in results {
        match res {
            Ok(out) => {
                info!("  wrote {}", out.display());
                written += 1;
            }
            Err(e) => warn!("{:#}", e),
        }
    }
    if written < inputs.len() {
        warn!("{} raster(s) skipped due to errors", inputs.len() - written);
    }
    Ok(written)
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let args = Args::parse();
    let written = run(&args)?;
    if written == 0 {
        anyhow::bail!("no tables written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccdc_core::geotiff::{write_f32, write_u8};
    use ccdc_core::{GeoReference, WriteOptions};

    #[test]
    fn tallies_every_raster_and_skips_bad_ones() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let g = GeoReference::default();
        write_u8(&input.path().join("nlcd92to01.tif"), 4, 1, &[11, 11, 41, 82], &g, &WriteOptions::default()).unwrap();
        write_f32(&input.path().join("bad.tif"), 1, 1, &[1.5], &g, &WriteOptions::default()).unwrap();
        fs::write(input.path().join("readme.txt"), b"x").unwrap();

        let args = Args {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            tile: "h05v02".into(),
            recode: false,
        };
        assert_eq!(run(&args).unwrap(), 1);

        let text = fs::read_to_string(output.path().join("h05v02_nlcd92to01_classes.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["total_pixels"], 4);
        let groups = json["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0]["from"], 11);
        assert_eq!(groups[0]["count"], 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let args = Args {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            tile: "h05v02".into(),
            recode: true,
        };
        assert!(run(&args).is_err());
    }
}
