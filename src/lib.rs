//! Split GWAS summary statistics into an LD-pruned genome-wide significant
//! list and a PRS list free of variants in LD with it, using PLINK `--clump`.

pub mod error;
pub mod logging;
pub mod types;

pub mod clump;
pub mod df_utils;
pub mod io;
pub mod paths;
pub mod qc;
pub mod split;

pub use split::{SplitConfig, summary_split};
