//! Label catalogs and size classification.

mod size;
mod taxonomy;

pub use size::{PrSize, SizeBand, SizeClassifier, SizeTier};
pub use taxonomy::{LabelCategory, LabelTarget, Taxonomy, TypeEntry, SCOPE_PREFIX};
