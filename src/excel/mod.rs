pub mod address;
pub mod geometry;

pub use address::{AddressError, CellCoordinate, ParsedRange};
pub use geometry::{contains, overlaps};
