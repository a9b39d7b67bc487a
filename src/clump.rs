//! PLINK `--clump` invocation and `.clumped` parsing.
//!
//! The clumping itself happens in the external program; this module only
//! builds its argument list, checks that it ran, and reads back the markers it
//! kept (`SNP`) and the markers it folded into each clump (`SP2`).

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::df_utils::{format_general, marker_ids};
use crate::error::SummarySplitError;
use crate::io::read_table_whitespace;
use crate::qc::{check_columns, plink_member};

/// Placeholder PLINK writes in `SP2` when a clump has no secondary markers.
const NO_SECONDARY: &str = "NONE";

#[derive(Debug, Clone)]
pub struct ClumpParams {
    pub p1: f64,
    pub p2: f64,
    pub r2: f64,
    pub kb: u32,
    pub p_field: String,
    pub snp_field: String,
}

impl ClumpParams {
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "--clump-field".into(),
            self.p_field.clone().into(),
            "--clump-p1".into(),
            format_general(self.p1).into(),
            "--clump-p2".into(),
            format_general(self.p2).into(),
            "--clump-r2".into(),
            format_general(self.r2).into(),
            "--clump-kb".into(),
            self.kb.to_string().into(),
            "--clump-snp-field".into(),
            self.snp_field.clone().into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PlinkClumper {
    pub program: PathBuf,
    pub bfile: PathBuf,
}

impl PlinkClumper {
    pub fn new(program: impl Into<PathBuf>, bfile: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            bfile: bfile.into(),
        }
    }

    pub fn command(&self, params: &ClumpParams, input: &Path, out_prefix: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--noweb")
            .arg("--bfile")
            .arg(&self.bfile)
            .arg("--clump")
            .arg(input)
            .args(params.to_args())
            .arg("--out")
            .arg(out_prefix);
        cmd
    }

    /// Runs one clumping pass and returns the path of its `.clumped` file.
    pub fn run(&self, params: &ClumpParams, input: &Path, out_prefix: &Path) -> Result<PathBuf> {
        let mut cmd = self.command(params, input, out_prefix);
        debug!("Running {:?}", cmd);
        let output = cmd
            .output()
            .with_context(|| format!("failed to launch {}", self.program.display()))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("{}: {line}", self.program.display());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} failed: {stderr}", self.program.display());
            return Err(SummarySplitError::ClumpFailed {
                program: self.program.display().to_string(),
                status: output.status.to_string(),
                stderr,
            }
            .into());
        }

        let clumped = plink_member(out_prefix, "clumped");
        if !clumped.is_file() {
            return Err(SummarySplitError::MissingClumpOutput(clumped).into());
        }
        Ok(clumped)
    }
}

/// Index and secondary markers recovered from a `.clumped` file.
#[derive(Debug, Clone, Default)]
pub struct ClumpedTable {
    pub index: Vec<String>,
    pub secondary: Vec<String>,
}

impl ClumpedTable {
    pub fn index_set(&self) -> HashSet<String> {
        self.index.iter().cloned().collect()
    }

    pub fn secondary_set(&self) -> HashSet<String> {
        self.secondary.iter().cloned().collect()
    }
}

pub fn read_clumped(path: &Path) -> Result<ClumpedTable> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let df = read_table_whitespace(BufReader::new(file))
        .with_context(|| format!("read {}", path.display()))?;
    check_columns(&df, &["SNP", "SP2"], path)?;

    let index = marker_ids(&df, "SNP")?;
    let secondary = marker_ids(&df, "SP2")?
        .iter()
        .flat_map(|field| parse_secondary_field(field))
        .collect();
    Ok(ClumpedTable { index, secondary })
}

/// Splits an `SP2` cell such as `rs1(1),rs2(1)` into bare marker names.
pub fn parse_secondary_field(field: &str) -> Vec<String> {
    let mut stripped = String::with_capacity(field.len());
    let mut depth = 0usize;
    for c in field.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    stripped
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_SECONDARY)
        .map(str::to_string)
        .collect()
}
