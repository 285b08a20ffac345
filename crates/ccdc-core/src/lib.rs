//! Land-cover change tooling: annual class rasters in, change-count and
//! comparison products out.
pub mod accumulate;
pub mod crosscode;
pub mod discover;
pub mod error;
pub mod geotiff;
pub mod georef;
pub mod grid;
pub mod tally;

pub use accumulate::{count_changes, count_changes_from_paths, ChangeAccumulator, ChangeCounts, SentinelClasses};
pub use error::{Error, Result};
pub use geotiff::{read_class_grid, ColorTable, WriteOptions};
pub use georef::GeoReference;
pub use grid::ClassGrid;
