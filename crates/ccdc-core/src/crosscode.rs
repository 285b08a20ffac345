//! Reference-vs-model comparison of change-count rasters.
//!
//! Each output pixel encodes both inputs as `model * scale + reference`, so
//! with the default scale of 100 the value 203 reads "model saw 2 changes,
//! reference saw 3".
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::grid::ClassGrid;

pub const DEFAULT_SCALE: f32 = 100.0;

fn check_shapes(model: &ClassGrid, reference: &ClassGrid) -> Result<()> {
    if !model.same_shape(reference) {
        return Err(Error::ShapeMismatch {
            index: 1,
            width: model.width,
            height: model.height,
            got_width: reference.width,
            got_height: reference.height,
        });
    }
    Ok(())
}

/// `model * scale + reference` per pixel.
pub fn cross_code(model: &ClassGrid, reference: &ClassGrid, scale: f32) -> Result<Vec<f32>> {
    check_shapes(model, reference)?;
    Ok(model
        .data
        .iter()
        .zip(&reference.data)
        .map(|(&m, &r)| m as f32 * scale + r as f32)
        .collect())
}

/// Pixel count of one (model, reference) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairCount {
    pub model: i32,
    pub reference: i32,
    pub count: u64,
}

/// Cross-tabulation of model against reference values, sorted by
/// (model, reference). Pairs that never occur are omitted.
pub fn pair_table(model: &ClassGrid, reference: &ClassGrid) -> Result<Vec<PairCount>> {
    check_shapes(model, reference)?;
    let mut table: BTreeMap<(i32, i32), u64> = BTreeMap::new();
    for (&m, &r) in model.data.iter().zip(&reference.data) {
        *table.entry((m, r)).or_default() += 1;
    }
    Ok(table
        .into_iter()
        .map(|((model, reference), count)| PairCount { model, reference, count })
        .collect())
}

/// Share of pixels on the diagonal of the pair table (model == reference).
pub fn agreement(pairs: &[PairCount]) -> f64 {
    let total: u64 = pairs.iter().map(|p| p.count).sum();
    if total == 0 {
        return 0.0;
    }
    let same: u64 = pairs.iter().filter(|p| p.model == p.reference).map(|p| p.count).sum();
    same as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(values: &[i32]) -> ClassGrid {
        ClassGrid::from_vec(values.len(), 1, values.to_vec()).unwrap()
    }

    #[test]
    fn cross_code_packs_both_counts() {
        let out = cross_code(&grid(&[0, 2, 1]), &grid(&[0, 3, 1]), DEFAULT_SCALE).unwrap();
        assert_eq!(out, vec![0.0, 203.0, 101.0]);
    }

    #[test]
    fn cross_code_rejects_shape_mismatch() {
        assert!(matches!(
            cross_code(&grid(&[1, 2]), &grid(&[1]), DEFAULT_SCALE),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn pair_table_counts_and_sorts() {
        let pairs = pair_table(&grid(&[1, 0, 1, 1, 2]), &grid(&[1, 0, 2, 1, 0])).unwrap();
        assert_eq!(
            pairs,
            vec![
                PairCount { model: 0, reference: 0, count: 1 },
                PairCount { model: 1, reference: 1, count: 2 },
                PairCount { model: 1, reference: 2, count: 1 },
                PairCount { model: 2, reference: 0, count: 1 },
            ]
        );
        assert_relative_eq!(agreement(&pairs), 0.6);
        assert_eq!(agreement(&[]), 0.0);
    }
}
