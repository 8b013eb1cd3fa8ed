#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/metrica/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Stock split handling for metrica.

/// The version of the metrica-splits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod adjust;
pub mod detect;

pub use adjust::{SplitAdjuster, SplitTargets};
pub use detect::{
    FORWARD_SPLIT_RATIOS, REVERSE_SPLIT_RATIOS, SplitConfig, SplitDetector, SplitEvent,
    match_split_ratio,
};
