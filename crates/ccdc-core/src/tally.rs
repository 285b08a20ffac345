//! Pixel tallies over change-count and from-to class rasters.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::grid::ClassGrid;

/// Recoded NLCD from-to classes (`from * 100 + to` over the recoded legend
/// 1, 2, 5, 6, 7, 8, 9, 11, 81).
#[rustfmt::skip]
pub const NLCD_RECODE_CLASSES: [i32; 81] = [
    101, 102, 105, 106, 107, 108, 109, 111, 181,
    201, 202, 205, 206, 207, 208, 209, 211, 281,
    501, 502, 505, 506, 507, 508, 509, 511, 581,
    601, 602, 605, 606, 607, 608, 609, 611, 681,
    701, 702, 705, 706, 707, 708, 709, 711, 781,
    801, 802, 805, 806, 807, 808, 809, 811, 881,
    901, 902, 905, 906, 907, 908, 909, 911, 981,
    1101, 1102, 1105, 1106, 1107, 1108, 1109, 1111, 1181,
    8101, 8102, 8105, 8106, 8107, 8108, 8109, 8111, 8181,
];

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

// ── Change-count histogram ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaBin {
    /// Number of changes.
    pub changes: i32,
    pub count: u64,
    /// Share of the tile in percent.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSummary {
    pub total_pixels: u64,
    /// Share of the tile with at least one change, in percent.
    pub percent_changed: f64,
    /// One bin per change count from 0 to the maximum observed.
    pub bins: Vec<AreaBin>,
}

/// Bincount of a change-count raster. Negative values are ignored; values
/// above the 8-bit count range mean the raster is not a change count.
pub fn change_histogram(counts: &ClassGrid) -> Result<AreaSummary> {
    let max = counts.data.iter().copied().max().unwrap_or(0).max(0);
    if max > i32::from(u8::MAX) {
        return Err(Error::NotChangeCount(max));
    }
    let max = max as usize;
    let mut bins = vec![0u64; max + 1];
    for &v in &counts.data {
        if v >= 0 {
            bins[v as usize] += 1;
        }
    }
    let total = counts.data.len() as u64;
    let changed: u64 = bins.iter().skip(1).sum();
    Ok(AreaSummary {
        total_pixels: total,
        percent_changed: percent(changed, total),
        bins: bins
            .into_iter()
            .enumerate()
            .map(|(changes, count)| AreaBin {
                changes: changes as i32,
                count,
                percent: percent(count, total),
            })
            .collect(),
    })
}

// ── From-to class counts ──────────────────────────────────────────────────────

/// "From" part of a from-to code: the leading one or two digits of a three
/// or four digit code. Codes below 100 are plain classes and map to themselves.
pub fn from_class(code: i32) -> i32 {
    if code.abs() < 100 {
        code
    } else {
        code / 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub class: i32,
    pub from: i32,
    pub count: u64,
    pub percent: f64,
}

/// Pixel count per class. With `classes` the listed codes are reported in
/// order (absent ones with 0), otherwise every class present, ascending.
pub fn class_counts(grid: &ClassGrid, classes: Option<&[i32]>) -> Vec<ClassCount> {
    let mut present: BTreeMap<i32, u64> = BTreeMap::new();
    for &v in &grid.data {
        *present.entry(v).or_default() += 1;
    }
    let total = grid.data.len() as u64;
    let row = |class: i32, count: u64| ClassCount {
        class,
        from: from_class(class),
        count,
        percent: percent(count, total),
    };
    match classes {
        Some(list) => list
            .iter()
            .map(|&c| row(c, present.get(&c).copied().unwrap_or(0)))
            .collect(),
        None => present.into_iter().map(|(c, n)| row(c, n)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromGroup {
    pub from: i32,
    pub count: u64,
    pub classes: Vec<ClassCount>,
}

/// Group class rows by their "from" class, ascending.
pub fn group_by_from(rows: Vec<ClassCount>) -> Vec<FromGroup> {
    let mut groups: BTreeMap<i32, Vec<ClassCount>> = BTreeMap::new();
    for r in rows {
        groups.entry(r.from).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(from, classes)| FromGroup {
            from,
            count: classes.iter().map(|c| c.count).sum(),
            classes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn histogram_bins_and_changed_share() {
        let g = ClassGrid::from_vec(4, 2, vec![0, 0, 0, 0, 1, 1, 3, 0]).unwrap();
        let s = change_histogram(&g).unwrap();
        assert_eq!(s.total_pixels, 8);
        assert_eq!(s.bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![5, 2, 0, 1]);
        assert_relative_eq!(s.bins[1].percent, 25.0);
        assert_relative_eq!(s.percent_changed, 37.5);
    }

    #[test]
    fn histogram_of_unchanged_tile() {
        let s = change_histogram(&ClassGrid::new(3, 3, 0)).unwrap();
        assert_eq!(s.bins.len(), 1);
        assert_eq!(s.percent_changed, 0.0);
    }

    #[test]
    fn histogram_rejects_values_past_the_count_range() {
        let g = ClassGrid::from_vec(3, 1, vec![0, 255, 1]).unwrap();
        assert_eq!(change_histogram(&g).unwrap().bins.len(), 256);

        let g = ClassGrid::from_vec(2, 1, vec![1101, i32::MAX]).unwrap();
        assert!(matches!(change_histogram(&g), Err(Error::NotChangeCount(v)) if v == i32::MAX));
    }

    #[test]
    fn from_class_leading_digits() {
        assert_eq!(from_class(101), 1);
        assert_eq!(from_class(981), 9);
        assert_eq!(from_class(1105), 11);
        assert_eq!(from_class(8181), 81);
        assert_eq!(from_class(41), 41);
    }

    #[test]
    fn class_counts_present_and_fixed_list() {
        let g = ClassGrid::from_vec(5, 1, vec![101, 101, 205, 1111, 101]).unwrap();
        let rows = class_counts(&g, None);
        assert_eq!(rows.iter().map(|r| (r.class, r.count)).collect::<Vec<_>>(), vec![(101, 3), (205, 1), (1111, 1)]);
        assert_relative_eq!(rows[0].percent, 60.0);

        let fixed = class_counts(&g, Some(&NLCD_RECODE_CLASSES[..]));
        assert_eq!(fixed.len(), NLCD_RECODE_CLASSES.len());
        assert_eq!(fixed[0].count, 3);
        assert_eq!(fixed.iter().map(|r| r.count).sum::<u64>(), 5);
        assert!(fixed.iter().any(|r| r.class == 102 && r.count == 0));
    }

    #[test]
    fn groups_by_from_class() {
        let g = ClassGrid::from_vec(4, 1, vec![101, 102, 1101, 102]).unwrap();
        let groups = group_by_from(class_counts(&g, None));
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].from, groups[0].count), (1, 3));
        assert_eq!(groups[0].classes.len(), 2);
        assert_eq!((groups[1].from, groups[1].count), (11, 1));
    }

    #[test]
    fn summary_serializes() {
        let s = change_histogram(&ClassGrid::from_vec(2, 1, vec![0, 2]).unwrap()).unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["total_pixels"], 2);
        assert_eq!(json["bins"].as_array().unwrap().len(), 3);
    }
}
