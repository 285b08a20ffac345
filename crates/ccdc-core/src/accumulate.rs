//! Per-pixel class-change accumulation across an ordered sequence of annual
//! cover maps.
//!
//! The scan keeps two buffers: a *holder* with the most recent valid class of
//! every pixel, and an 8-bit change counter. Sentinel classes (insufficient
//! data, transitional) are never compared: in the current layer they take the
//! holder's value, and a holder that still has no valid observation adopts the
//! first valid class it sees without counting it as a change.
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::geotiff::{read_class_grid, write_u8, WriteOptions};
use crate::georef::GeoReference;
use crate::grid::ClassGrid;

/// Longest sequence whose change count (at most N − 1) fits in a `u8`.
pub const MAX_LAYERS: usize = u8::MAX as usize + 1;

/// Geotransform coefficients closer than this are treated as identical.
const GEOREF_TOLERANCE: f64 = 1e-6;

/// The two class codes that mean "no valid observation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelClasses {
    pub insufficient_data: i32,
    pub transitional: i32,
}

impl Default for SentinelClasses {
    fn default() -> Self {
        Self { insufficient_data: 0, transitional: 9 }
    }
}

impl SentinelClasses {
    #[inline]
    pub fn contains(&self, code: i32) -> bool {
        code == self.insufficient_data || code == self.transitional
    }
}

/// Number of class transitions per pixel, georeferenced like layer 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeCounts {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
    pub georef: GeoReference,
}

impl ChangeCounts {
    /// Write as an 8-bit GeoTIFF with layer 0's georeferencing.
    pub fn write(&self, path: &Path, opts: &WriteOptions) -> Result<()> {
        write_u8(path, self.width, self.height, &self.data, &self.georef, opts)
    }
}

/// One pixel of one layer transition.
#[inline]
fn step(holder: &mut i32, count: &mut u8, current: i32, sentinels: SentinelClasses) {
    if sentinels.contains(*holder) {
        *holder = current;
    }
    let current = if sentinels.contains(current) { *holder } else { current };
    if current != *holder {
        *count += 1;
        *holder = current;
    }
}

#[cfg(not(feature = "threading"))]
fn scan_layer(holder: &mut [i32], counts: &mut [u8], layer: &[i32], _width: usize, sentinels: SentinelClasses) {
    for ((h, c), &cur) in holder.iter_mut().zip(counts.iter_mut()).zip(layer) {
        step(h, c, cur, sentinels);
    }
}

#[cfg(feature = "threading")]
fn scan_layer(holder: &mut [i32], counts: &mut [u8], layer: &[i32], width: usize, sentinels: SentinelClasses) {
    use rayon::prelude::*;

    let row = width.max(1);
    holder
        .par_chunks_mut(row)
        .zip(counts.par_chunks_mut(row))
        .zip(layer.par_chunks(row))
        .for_each(|((hs, cs), ls)| {
            for ((h, c), &cur) in hs.iter_mut().zip(cs.iter_mut()).zip(ls) {
                step(h, c, cur, sentinels);
            }
        });
}

/// Incremental change accumulator.
///
/// After `push`ing layers 1..=i, [`counts`](Self::counts) holds exactly the
/// result for the sequence `layer[0..=i]`, so one pass yields every
/// `year0 → year_i` interval.
pub struct ChangeAccumulator {
    holder: Vec<i32>,
    counts: Vec<u8>,
    width: usize,
    height: usize,
    georef: GeoReference,
    sentinels: SentinelClasses,
    layers_seen: usize,
    check_georef: bool,
}

impl ChangeAccumulator {
    /// Start a scan with `first` as layer 0. The holder takes ownership of its
    /// pixel buffer.
    pub fn new(first: ClassGrid, sentinels: SentinelClasses) -> Self {
        let counts = vec![0u8; first.data.len()];
        Self {
            holder: first.data,
            counts,
            width: first.width,
            height: first.height,
            georef: first.georef,
            sentinels,
            layers_seen: 1,
            check_georef: true,
        }
    }

    /// Disable the check that every layer shares layer 0's geotransform.
    /// Shapes are always checked.
    pub fn with_georef_check(mut self, enabled: bool) -> Self {
        self.check_georef = enabled;
        self
    }

    /// Fold the next layer into the holder and counters.
    pub fn push(&mut self, layer: &ClassGrid) -> Result<()> {
        let index = self.layers_seen;
        if index >= MAX_LAYERS {
            return Err(Error::TooManyLayers(index + 1));
        }
        if layer.width != self.width || layer.height != self.height {
            return Err(Error::ShapeMismatch {
                index,
                width: self.width,
                height: self.height,
                got_width: layer.width,
                got_height: layer.height,
            });
        }
        if self.check_georef && !self.georef.matches(&layer.georef, GEOREF_TOLERANCE) {
            return Err(Error::GeoReferenceMismatch { index });
        }

        scan_layer(&mut self.holder, &mut self.counts, &layer.data, self.width, self.sentinels);
        self.layers_seen += 1;
        debug!("layer {index}: max changes so far {}", self.max_count());
        Ok(())
    }

    pub fn counts(&self) -> &[u8] {
        &self.counts
    }

    pub fn layers_seen(&self) -> usize {
        self.layers_seen
    }

    /// Largest per-pixel count so far.
    pub fn max_count(&self) -> u8 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Write the counts for the layers seen so far as an 8-bit GeoTIFF.
    pub fn write_counts(&self, path: &Path, opts: &WriteOptions) -> Result<()> {
        write_u8(path, self.width, self.height, &self.counts, &self.georef, opts)
    }

    /// Copy of the counts for the layers seen so far.
    pub fn snapshot(&self) -> ChangeCounts {
        ChangeCounts {
            width: self.width,
            height: self.height,
            data: self.counts.clone(),
            georef: self.georef.clone(),
        }
    }

    /// Drop the holder and return the counts. Fails if fewer than two layers
    /// were seen.
    pub fn finish(self) -> Result<ChangeCounts> {
        if self.layers_seen < 2 {
            return Err(Error::TooFewLayers(self.layers_seen));
        }
        Ok(ChangeCounts {
            width: self.width,
            height: self.height,
            data: self.counts,
            georef: self.georef,
        })
    }
}

/// Count changes over in-memory layers.
pub fn count_changes(layers: &[ClassGrid], sentinels: SentinelClasses) -> Result<ChangeCounts> {
    if layers.len() < 2 {
        return Err(Error::TooFewLayers(layers.len()));
    }
    if layers.len() > MAX_LAYERS {
        return Err(Error::TooManyLayers(layers.len()));
    }
    let mut acc = ChangeAccumulator::new(layers[0].clone(), sentinels);
    for layer in &layers[1..] {
        acc.push(layer)?;
    }
    acc.finish()
}

/// Count changes over GeoTIFF layers, holding one input in memory at a time.
pub fn count_changes_from_paths(paths: &[PathBuf], sentinels: SentinelClasses) -> Result<ChangeCounts> {
    if paths.len() < 2 {
        return Err(Error::TooFewLayers(paths.len()));
    }
    if paths.len() > MAX_LAYERS {
        return Err(Error::TooManyLayers(paths.len()));
    }
    let mut acc = ChangeAccumulator::new(read_class_grid(&paths[0])?, sentinels);
    for path in &paths[1..] {
        let layer = read_class_grid(path)?;
        acc.push(&layer)?;
    }
    info!("accumulated {} layers", acc.layers_seen());
    acc.finish()
}
