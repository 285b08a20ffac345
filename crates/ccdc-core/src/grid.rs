use crate::error::{Error, Result};
use crate::georef::GeoReference;

/// A single-band grid of integer class codes, row-major.
/// Row 0 is the northernmost row, as stored in the GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassGrid {
    /// Row-major class codes.
    pub data: Vec<i32>,
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
}

impl ClassGrid {
    /// Create a new ClassGrid filled with the given class.
    pub fn new(width: usize, height: usize, fill: i32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            georef: GeoReference::default(),
        }
    }

    /// Wrap row-major values; fails if the length is not `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<i32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::Length { width, height, got: data.len() });
        }
        Ok(Self { data, width, height, georef: GeoReference::default() })
    }

    pub fn with_georef(mut self, georef: GeoReference) -> Self {
        self.georef = georef;
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: i32) {
        self.data[row * self.width + col] = val;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &ClassGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Sorted distinct class codes present in the grid.
    pub fn unique_classes(&self) -> Vec<i32> {
        let mut classes = self.data.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = ClassGrid::from_vec(3, 2, vec![1; 5]).unwrap_err();
        assert!(matches!(err, Error::Length { width: 3, height: 2, got: 5 }));
    }

    #[test]
    fn get_set_are_row_major() {
        let mut g = ClassGrid::new(3, 2, 0);
        g.set(1, 2, 42);
        assert_eq!(g.data[5], 42);
        assert_eq!(g.get(1, 2), 42);
    }

    #[test]
    fn unique_classes_sorted() {
        let g = ClassGrid::from_vec(2, 2, vec![5, 1, 5, 3]).unwrap();
        assert_eq!(g.unique_classes(), vec![1, 3, 5]);
    }
}
