use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::io::compression_ext;

/// Every path one split run touches, derived from the summary file name.
#[derive(Debug, Clone)]
pub struct SplitPaths {
    pub working_dir: PathBuf,
    pub stem: String,
    pub ext: Option<String>,
    pub genome_wide: PathBuf,
    pub prs: PathBuf,
}

impl SplitPaths {
    pub fn from_summary(summary: &Path) -> Result<Self> {
        let resolved = summary
            .canonicalize()
            .with_context(|| format!("resolve {}", summary.display()))?;
        let working_dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = resolved
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow::anyhow!("{} has no usable file name", summary.display()))?;
        Ok(Self::in_dir(&working_dir, file_name))
    }

    /// Splits `file_name` on its last dot (after removing a `.gz`/`.bz2`
    /// suffix) and builds the output names in `working_dir`.
    pub fn in_dir(working_dir: &Path, file_name: &str) -> Self {
        let mut name = file_name;
        if let Some(ext) = compression_ext(Path::new(file_name)) {
            name = &name[..name.len() - ext.len() - 1];
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), Some(ext.to_string())),
            None => (name.to_string(), None),
        };
        let genome_wide = working_dir.join(tagged_name(&stem, "genome_wide", ext.as_deref()));
        let prs = working_dir.join(tagged_name(&stem, "PRS", ext.as_deref()));
        Self {
            working_dir: working_dir.to_path_buf(),
            stem,
            ext,
            genome_wide,
            prs,
        }
    }

    /// Name of an intermediate table inside the temp dir, e.g. `trait.gw_init.txt`.
    pub fn temp_table_name(&self, tag: &str) -> String {
        tagged_name(&self.stem, tag, self.ext.as_deref())
    }

    pub fn log_path(&self, log_name: Option<&str>) -> PathBuf {
        let base = log_name.unwrap_or(&self.stem);
        self.working_dir.join(format!("{base}_split.log"))
    }
}

fn tagged_name(stem: &str, tag: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{stem}.{tag}.{ext}"),
        None => format!("{stem}.{tag}"),
    }
}
