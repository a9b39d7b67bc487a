use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;

use crate::error::{Result, SummarySplitError};

/// Checks `min < value <= max`.
pub fn check_unit_interval(value: f64, min: f64, max: f64, name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(SummarySplitError::InvalidArgument(format!(
            "Value of {name} should be finite"
        )));
    }
    if value <= min {
        return Err(SummarySplitError::InvalidArgument(format!(
            "Value of {name} should be above {min}"
        )));
    }
    if value > max {
        return Err(SummarySplitError::InvalidArgument(format!(
            "Value of {name} should not exceed {max}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.is_file() {
        return Err(SummarySplitError::InvalidArgument(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}

/// Appends `.{ext}` to a PLINK prefix without touching dots already in the name.
pub fn plink_member(prefix: &Path, ext: &str) -> PathBuf {
    let mut raw = prefix.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

pub fn check_plink_trio(prefix: &Path) -> Result<()> {
    let missing: Vec<String> = ["bed", "bim", "fam"]
        .iter()
        .map(|ext| plink_member(prefix, ext))
        .filter(|p| !p.is_file())
        .map(|p| p.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SummarySplitError::InvalidArgument(format!(
            "Genotype panel {} is incomplete, missing: {}",
            prefix.display(),
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn check_columns(df: &DataFrame, columns: &[&str], source: &Path) -> Result<()> {
    for col in columns {
        if df.column(col).is_err() {
            return Err(SummarySplitError::MissingColumn(format!(
                "{col} not found in {}",
                source.display()
            )));
        }
    }
    Ok(())
}
