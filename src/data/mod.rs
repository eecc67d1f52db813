//! Dataset preparation: load, clean, split and separate features from labels.

pub mod clean;
pub mod features;
pub mod loader;
pub mod split;
pub mod table;

pub use clean::{clean_table, CleanOptions, CleanSummary, TARGET_COLUMN};
pub use features::{prepare_features_labels, FeatureMatrix};
pub use loader::load_table;
pub use split::{split_by_group, train_test_split, GroupSpec, SplitIndices, Subset};
pub use table::{Column, ColumnData, Table};
