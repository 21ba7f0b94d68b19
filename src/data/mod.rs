//! Input data model: the intensity table, sample groups, contrasts and normalization.

mod contrast;
mod groups;
mod matrix;
pub mod normalize;

pub use contrast::{Contrast, ResolvedContrast};
pub use groups::{GroupAssignment, GroupLayout};
pub use matrix::IntensityMatrix;
pub use normalize::{FoldChangeBasis, Normalization, Scaling};
