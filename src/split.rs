use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use tempfile::TempDir;

use crate::clump::{ClumpParams, ClumpedTable, PlinkClumper, read_clumped};
use crate::df_utils::{Partition, filter_markers, marker_ids, split_by_threshold};
use crate::error::SummarySplitError;
use crate::io::{read_table, write_table};
use crate::logging::RunLog;
use crate::paths::SplitPaths;
use crate::qc::{check_columns, check_file_exists, check_plink_trio, check_unit_interval};
use crate::types::{SplitOutput, StageCounts};

pub const DEFAULT_SNP_FIELD: &str = "MarkerName";
pub const DEFAULT_P_FIELD: &str = "P.2gc";
pub const DEFAULT_THRESHOLD: f64 = 1e-8;
pub const DEFAULT_CLUMP_R2: f64 = 0.1;
pub const DEFAULT_CLUMP_KB: u32 = 500;
pub const DEFAULT_PLINK: &str = "plink";

#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub summary: PathBuf,
    pub genotype_data: PathBuf,
    pub plink: PathBuf,
    pub snp_field: String,
    pub p_field: String,
    pub threshold: f64,
    pub clump_r2: f64,
    pub clump_kb: u32,
    /// Primary and secondary p-value cut-offs of the self-clump pass. Every
    /// row there already passed `threshold`, so both stay at 1.
    pub self_clump_p1: f64,
    pub clump_p2: f64,
    pub log_name: Option<String>,
}

impl SplitConfig {
    pub fn new(summary: impl Into<PathBuf>, genotype_data: impl Into<PathBuf>) -> Self {
        Self {
            summary: summary.into(),
            genotype_data: genotype_data.into(),
            plink: PathBuf::from(DEFAULT_PLINK),
            snp_field: DEFAULT_SNP_FIELD.to_string(),
            p_field: DEFAULT_P_FIELD.to_string(),
            threshold: DEFAULT_THRESHOLD,
            clump_r2: DEFAULT_CLUMP_R2,
            clump_kb: DEFAULT_CLUMP_KB,
            self_clump_p1: 1.0,
            clump_p2: 1.0,
            log_name: None,
        }
    }

    fn clump_params(&self, p1: f64) -> ClumpParams {
        ClumpParams {
            p1,
            p2: self.clump_p2,
            r2: self.clump_r2,
            kb: self.clump_kb,
            p_field: self.p_field.clone(),
            snp_field: self.snp_field.clone(),
        }
    }
}

fn validate(config: &SplitConfig) -> Result<()> {
    check_file_exists(&config.summary, "summary")?;
    check_plink_trio(&config.genotype_data)?;
    check_unit_interval(config.threshold, 0.0, 1.0, "threshold")?;
    check_unit_interval(config.clump_r2, 0.0, 1.0, "clump-r2")?;
    check_unit_interval(config.self_clump_p1, 0.0, 1.0, "self-clump p1")?;
    check_unit_interval(config.clump_p2, 0.0, 1.0, "clump p2")?;
    if config.clump_kb == 0 {
        return Err(SummarySplitError::InvalidArgument(
            "Value of clump-kb should be above 0".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Splits the summary file into LD-pruned genome-wide and PRS lists written
/// next to the input. Intermediate files live in a temp dir under the input's
/// directory which is removed however this returns.
pub fn summary_split(config: &SplitConfig) -> Result<SplitOutput> {
    validate(config)?;
    let paths = SplitPaths::from_summary(&config.summary)?;
    let mut log = RunLog::create(&paths.log_path(config.log_name.as_deref()))?;
    log.line(&format!(
        "Splitting {} at {} <= {} using panel {}",
        config.summary.display(),
        config.p_field,
        config.threshold,
        config.genotype_data.display()
    ))?;

    let summary = read_table(&config.summary)?;
    check_columns(
        &summary,
        &[config.snp_field.as_str(), config.p_field.as_str()],
        &config.summary,
    )?;

    let temp = tempfile::Builder::new()
        .prefix("summary_split_")
        .tempdir_in(&paths.working_dir)
        .with_context(|| format!("create temp dir in {}", paths.working_dir.display()))?;

    let Partition {
        significant,
        remainder,
        missing_p,
    } = split_by_threshold(&summary, &config.p_field, config.threshold)?;
    let mut counts = StageCounts {
        input: summary.height(),
        significant: significant.height(),
        remainder: remainder.height(),
        missing_p,
        ..Default::default()
    };
    log.line(&format!(
        "{} rows read: {} genome-wide significant, {} remaining",
        counts.input, counts.significant, counts.remainder
    ))?;
    if missing_p > 0 {
        log.warn_line(&format!(
            "{missing_p} rows have no usable {} value and were kept in the PRS list",
            config.p_field
        ))?;
    }

    let clumper = PlinkClumper::new(&config.plink, &config.genotype_data);
    let (genome_wide, prs) = if significant.height() == 0 {
        log.warn_line("No genome-wide significant rows; skipping clumping")?;
        (significant, remainder)
    } else {
        let genome_wide = self_clump(config, &clumper, &paths, &temp, &significant, &mut log)?;
        let prs = cross_clump(config, &clumper, &temp, &genome_wide, &remainder, &mut log)?;
        (genome_wide, prs)
    };

    counts.genome_wide = genome_wide.height();
    counts.prs = prs.height();

    write_table(&genome_wide, &paths.genome_wide)?;
    write_table(&prs, &paths.prs)?;
    log.line(&format!(
        "Wrote {} genome-wide rows to {}",
        counts.genome_wide,
        paths.genome_wide.display()
    ))?;
    log.line(&format!(
        "Wrote {} PRS rows to {}",
        counts.prs,
        paths.prs.display()
    ))?;
    log.flush()?;

    temp.close().context("remove temp dir")?;

    Ok(SplitOutput {
        genome_wide: paths.genome_wide,
        prs: paths.prs,
        log: log.path().to_path_buf(),
        counts,
    })
}

/// Clumps the significant rows against each other and keeps the index markers.
fn self_clump(
    config: &SplitConfig,
    clumper: &PlinkClumper,
    paths: &SplitPaths,
    temp: &TempDir,
    significant: &DataFrame,
    log: &mut RunLog,
) -> Result<DataFrame> {
    let input = temp.path().join(paths.temp_table_name("gw_init"));
    write_table(significant, &input)?;

    let clumped = run_and_read(
        clumper,
        &config.clump_params(config.self_clump_p1),
        &input,
        &temp.path().join("genome_wide_snp_clumping"),
    )?;
    let (genome_wide, removed) =
        filter_markers(significant, &config.snp_field, &clumped.index_set(), true)?;
    log.line(&format!(
        "{removed} genome-wide rows removed by LD clumping, {} kept",
        genome_wide.height()
    ))?;
    Ok(genome_wide)
}

/// Clumps the pruned genome-wide rows together with the remainder, seeding
/// only from genome-wide rows, and drops every remainder marker that ended up
/// in one of their clumps.
fn cross_clump(
    config: &SplitConfig,
    clumper: &PlinkClumper,
    temp: &TempDir,
    genome_wide: &DataFrame,
    remainder: &DataFrame,
    log: &mut RunLog,
) -> Result<DataFrame> {
    let merged = genome_wide
        .vstack(remainder)
        .context("merge genome-wide and PRS rows")?;
    let input = temp.path().join("merged_list");
    write_table(&merged, &input)?;

    let clumped = run_and_read(
        clumper,
        &config.clump_params(config.threshold),
        &input,
        &temp.path().join("genome_wide_prs_clumping"),
    )?;
    let (prs, removed) =
        filter_markers(remainder, &config.snp_field, &clumped.secondary_set(), false)?;
    log.line(&format!(
        "{removed} PRS rows removed for LD with genome-wide rows, {} kept",
        prs.height()
    ))?;

    let genome_wide_ids: HashSet<String> = marker_ids(genome_wide, &config.snp_field)?
        .into_iter()
        .collect();
    let (prs, duplicated) = filter_markers(&prs, &config.snp_field, &genome_wide_ids, false)?;
    if duplicated > 0 {
        log.warn_line(&format!(
            "{duplicated} PRS rows share a marker name with a genome-wide row and were removed"
        ))?;
    }
    Ok(prs)
}

fn run_and_read(
    clumper: &PlinkClumper,
    params: &ClumpParams,
    input: &Path,
    out_prefix: &Path,
) -> Result<ClumpedTable> {
    let clumped = clumper
        .run(params, input, out_prefix)
        .with_context(|| format!("clumping {}", input.display()))?;
    read_clumped(&clumped)
}
