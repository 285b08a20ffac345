//! Locating annual input layers and naming interval outputs.
//!
//! Inputs are single-band GeoTIFFs whose file names contain the product name
//! and a `_`-separated four-digit year, e.g. `h05v02_CoverPrim_1984.tif`.
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use log::debug;

use crate::error::{Error, Result};

/// Every `*{name}*.tif` in `dir`, sorted by path. With a `(from, to)` year
/// range, only files whose name contains one of those years are kept,
/// ordered by year.
pub fn find_layers(dir: &Path, name: &str, years: Option<(i32, i32)>) -> Result<Vec<PathBuf>> {
    // Literal parts are escaped so brackets or wildcards in a path match themselves.
    let base = Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*{}*.tif", base.trim_end_matches('/'), Pattern::escape(name));
    let mut all = Vec::new();
    for entry in glob(&pattern)? {
        all.push(entry?);
    }
    all.sort();
    debug!("{} files match {}", all.len(), pattern);

    let Some((from, to)) = years else {
        return Ok(all);
    };

    let mut picked: Vec<PathBuf> = Vec::new();
    for year in from..=to {
        let needle = year.to_string();
        for path in &all {
            let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if file_name.contains(&needle) && !picked.contains(path) {
                picked.push(path.clone());
            }
        }
    }
    Ok(picked)
}

/// The first `_`-separated four-digit piece of the file stem.
pub fn layer_year(path: &Path) -> Result<i32> {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    stem.split('_')
        .find(|piece| piece.len() == 4 && piece.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|piece| piece.parse().ok())
        .ok_or_else(|| Error::MissingYear(path.to_path_buf()))
}

/// `{out}/{from}_{to}`: one directory per requested year range.
pub fn interval_dir(out: &Path, from: i32, to: i32) -> PathBuf {
    out.join(format!("{from}_{to}"))
}

/// `{name}{first}to{last}ct.tif`, the change count from `first` to `last`.
pub fn count_output_name(name: &str, first: i32, last: i32) -> String {
    format!("{name}{first}to{last}ct.tif")
}
