use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use summary_split::logging::init_tracing;
use summary_split::split::{
    DEFAULT_CLUMP_KB, DEFAULT_CLUMP_R2, DEFAULT_P_FIELD, DEFAULT_PLINK, DEFAULT_SNP_FIELD,
    DEFAULT_THRESHOLD, SplitConfig, summary_split,
};

/// Split summary statistics into LD-clumped genome-wide significant and PRS
/// variant lists, written next to the input file.
#[derive(Parser)]
#[command(name = "summary-split")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Summary statistics file (.giant2 style, whitespace delimited).
    #[arg(short = 's', long = "summary")]
    summary: PathBuf,

    /// PLINK reference genotype prefix (.bed, .bim, .fam trio).
    #[arg(short = 'g', long = "genotype-data", alias = "genotype_data")]
    genotype_data: PathBuf,

    /// PLINK executable used for clumping.
    #[arg(long, env = "SUMMARY_SPLIT_PLINK", default_value = DEFAULT_PLINK)]
    plink: PathBuf,

    /// Marker identifier column.
    #[arg(long, default_value = DEFAULT_SNP_FIELD)]
    snp_field: String,

    /// P-value column.
    #[arg(long, default_value = DEFAULT_P_FIELD)]
    p_field: String,

    /// Genome-wide significance threshold (inclusive).
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// LD r^2 threshold for clumping.
    #[arg(long, default_value_t = DEFAULT_CLUMP_R2)]
    clump_r2: f64,

    /// Clumping window in kb.
    #[arg(long, default_value_t = DEFAULT_CLUMP_KB)]
    clump_kb: u32,

    /// Base name of the run log (defaults to the summary file stem).
    #[arg(long)]
    log_name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = SplitConfig {
        plink: cli.plink,
        snp_field: cli.snp_field,
        p_field: cli.p_field,
        threshold: cli.threshold,
        clump_r2: cli.clump_r2,
        clump_kb: cli.clump_kb,
        log_name: cli.log_name,
        ..SplitConfig::new(cli.summary, cli.genotype_data)
    };
    let output = summary_split(&config)?;

    info!(
        "Done: {} genome-wide, {} PRS variants (log: {})",
        output.counts.genome_wide,
        output.counts.prs,
        output.log.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_genotype_data_are_required() {
        assert!(Cli::try_parse_from(["summary-split"]).is_err());
        assert!(Cli::try_parse_from(["summary-split", "-s", "trait.txt"]).is_err());
        assert!(Cli::try_parse_from(["summary-split", "-g", "panel"]).is_err());
    }

    #[test]
    fn short_and_underscore_spellings_parse() {
        let cli = Cli::try_parse_from(["summary-split", "-s", "trait.txt", "-g", "panel"])
            .expect("short flags");
        assert_eq!(cli.summary, PathBuf::from("trait.txt"));
        assert_eq!(cli.genotype_data, PathBuf::from("panel"));

        let cli = Cli::try_parse_from([
            "summary-split",
            "--summary",
            "trait.txt",
            "--genotype_data",
            "ref/panel",
        ])
        .expect("underscore alias");
        assert_eq!(cli.genotype_data, PathBuf::from("ref/panel"));
    }

    #[test]
    fn defaults_reproduce_fixed_parameters() {
        let cli = Cli::try_parse_from(["summary-split", "-s", "trait.txt", "-g", "panel"])
            .expect("parse");
        assert_eq!(cli.snp_field, DEFAULT_SNP_FIELD);
        assert_eq!(cli.p_field, DEFAULT_P_FIELD);
        assert_eq!(cli.threshold, DEFAULT_THRESHOLD);
        assert_eq!(cli.clump_r2, DEFAULT_CLUMP_R2);
        assert_eq!(cli.clump_kb, DEFAULT_CLUMP_KB);
        assert!(cli.log_name.is_none());
    }

    #[test]
    fn plink_comes_from_flag_then_env_then_default() {
        let args = ["summary-split", "-s", "trait.txt", "-g", "panel"];

        // SAFETY: no other test in this binary asserts on this variable.
        unsafe { std::env::remove_var("SUMMARY_SPLIT_PLINK") };
        let cli = Cli::try_parse_from(args).expect("parse");
        assert_eq!(cli.plink, PathBuf::from(DEFAULT_PLINK));

        unsafe { std::env::set_var("SUMMARY_SPLIT_PLINK", "/opt/plink1.9/plink") };
        let cli = Cli::try_parse_from(args).expect("parse");
        assert_eq!(cli.plink, PathBuf::from("/opt/plink1.9/plink"));

        let cli = Cli::try_parse_from(["summary-split", "-s", "t", "-g", "p", "--plink", "plink2"])
            .expect("parse");
        assert_eq!(cli.plink, PathBuf::from("plink2"));

        unsafe { std::env::remove_var("SUMMARY_SPLIT_PLINK") };
    }
}
