#![cfg(unix)]

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use summary_split::df_utils::marker_ids;
use summary_split::error::SummarySplitError;
use summary_split::io::read_table_whitespace;
use summary_split::{SplitConfig, summary_split};

const SUMMARY: &str = "\
MarkerName Allele1 Allele2 Effect StdErr P.2gc N
rs1 a g 0.11 0.01 1e-9 25000
rs2 c t -0.21 0.02 1e-10 25000
rs3 a c 0.01 0.02 0.5 25000
rs4 g t 0.02 0.02 0.2 25000
rs5 a t 0.31 0.05 1e-9 25000
";

/// rs5 falls in the clump of rs2 on the first pass; rs3 falls in the clump of
/// rs2 on the second pass.
const SELF_CLUMPED: &str = " CHR    F   SNP     BP        P  TOTAL  NSIG  S05  S01  S001  S0001  SP2
   1    1   rs2   1200    1e-10      1     0    0    0     0      1  rs5(1)
   1    1   rs1    100    1e-09      0     0    0    0     0      0  NONE

";

const CROSS_CLUMPED: &str = " CHR    F   SNP     BP        P  TOTAL  NSIG  S05  S01  S001  S0001  SP2
   1    1   rs2   1200    1e-10      1     0    0    0     0      1  rs3(1)
   1    1   rs1    100    1e-09      0     0    0    0     0      0  NONE

";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("trait.txt"), SUMMARY).expect("write summary");
        for ext in ["bed", "bim", "fam"] {
            fs::write(dir.path().join(format!("panel.{ext}")), b"").expect("write panel");
        }
        fs::write(dir.path().join("self.clumped"), SELF_CLUMPED).expect("write fixture");
        fs::write(dir.path().join("cross.clumped"), CROSS_CLUMPED).expect("write fixture");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes an executable shell script standing in for plink.
    fn mock_plink(&self, body: &str) -> PathBuf {
        let script = self.path("mock_plink.sh");
        let text = format!(
            "#!/bin/sh\n\
             dir='{dir}'\n\
             while [ $# -gt 0 ]; do\n\
               case \"$1\" in\n\
                 --clump) input=\"$2\"; shift 2 ;;\n\
                 --clump-p1) p1=\"$2\"; shift 2 ;;\n\
                 --out) out=\"$2\"; shift 2 ;;\n\
                 *) shift ;;\n\
               esac\n\
             done\n\
             echo \"$p1\" >> \"$dir/calls.txt\"\n\
             cat \"$input\" >> \"$dir/inputs.txt\"\n\
             {body}\n",
            dir = self.dir.path().display(),
        );
        fs::write(&script, text).expect("write mock");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod mock");
        script
    }

    fn config(&self, plink: &Path) -> SplitConfig {
        SplitConfig {
            plink: plink.to_path_buf(),
            ..SplitConfig::new(self.path("trait.txt"), self.path("panel"))
        }
    }

    fn leftover_temp_dirs(&self) -> Vec<String> {
        fs::read_dir(self.dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("summary_split_"))
            .collect()
    }
}

const CLUMPING_MOCK: &str = "if [ \"$p1\" = \"1\" ]; then\n  \
    cp \"$dir/self.clumped\" \"$out.clumped\"\n\
    else\n  \
    cp \"$dir/cross.clumped\" \"$out.clumped\"\n\
    fi";

fn read_ids(path: &Path) -> Vec<String> {
    let text = fs::read_to_string(path).expect("read output");
    let df = read_table_whitespace(text.as_bytes()).expect("parse output");
    marker_ids(&df, "MarkerName").expect("marker ids")
}

#[test]
fn splits_five_row_table_with_mock_clumper() {
    let fx = Fixture::new();
    let plink = fx.mock_plink(CLUMPING_MOCK);

    let out = summary_split(&fx.config(&plink)).expect("split succeeds");

    assert!(out.genome_wide.ends_with("trait.genome_wide.txt"));
    assert!(out.prs.ends_with("trait.PRS.txt"));
    assert!(fx.path("trait.genome_wide.txt").is_file());
    assert!(fx.path("trait.PRS.txt").is_file());
    assert_eq!(out.counts.input, 5);
    assert_eq!(out.counts.significant, 3);
    assert_eq!(out.counts.remainder, 2);
    assert_eq!(out.counts.genome_wide, 2);
    assert_eq!(out.counts.prs, 1);

    let genome_wide = read_ids(&out.genome_wide);
    let prs = read_ids(&out.prs);
    assert_eq!(genome_wide, vec!["rs1", "rs2"]);
    assert_eq!(prs, vec!["rs4"]);

    let gw: HashSet<&String> = genome_wide.iter().collect();
    assert!(prs.iter().all(|id| !gw.contains(id)));

    let calls = fs::read_to_string(fx.path("calls.txt")).expect("calls");
    assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["1", "1e-08"]);

    // The second pass sees pruned genome-wide rows plus the whole remainder.
    let inputs = fs::read_to_string(fx.path("inputs.txt")).expect("inputs");
    let headers = inputs.lines().filter(|l| l.starts_with("MarkerName")).count();
    assert_eq!(headers, 2);
    let second: Vec<&str> = inputs
        .lines()
        .skip_while(|l| !l.starts_with("rs5"))
        .skip(2)
        .collect();
    let second_ids: Vec<&str> = second
        .iter()
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    assert_eq!(second_ids, vec!["rs1", "rs2", "rs3", "rs4"]);

    let header = fs::read_to_string(&out.genome_wide).expect("read output");
    assert_eq!(
        header.lines().next(),
        Some("MarkerName Allele1 Allele2 Effect StdErr P.2gc N")
    );
    assert!(header.contains("rs1 a g 0.11 0.01 1e-09 25000"));

    assert!(fx.leftover_temp_dirs().is_empty());
    assert!(out.log.is_file());
}

#[test]
fn failing_clumper_is_reported_and_cleaned_up() {
    let fx = Fixture::new();
    let plink = fx.mock_plink("echo 'Error: --bfile missing' >&2\nexit 3");

    let err = summary_split(&fx.config(&plink)).expect_err("split fails");
    assert!(matches!(
        err.downcast_ref::<SummarySplitError>(),
        Some(SummarySplitError::ClumpFailed { .. })
    ));
    assert!(format!("{err:#}").contains("--bfile missing"));
    assert!(!fx.path("trait.genome_wide.txt").exists());
    assert!(!fx.path("trait.PRS.txt").exists());
    assert!(fx.leftover_temp_dirs().is_empty());
}

#[test]
fn missing_clumped_file_is_reported() {
    let fx = Fixture::new();
    let plink = fx.mock_plink("exit 0");

    let err = summary_split(&fx.config(&plink)).expect_err("split fails");
    assert!(matches!(
        err.downcast_ref::<SummarySplitError>(),
        Some(SummarySplitError::MissingClumpOutput(_))
    ));
    assert!(fx.leftover_temp_dirs().is_empty());
}

#[test]
fn nothing_significant_skips_clumping() {
    let fx = Fixture::new();
    let mut config = fx.config(&fx.path("no-such-plink"));
    config.threshold = 1e-12;

    let out = summary_split(&config).expect("split succeeds");
    assert_eq!(out.counts.genome_wide, 0);
    assert_eq!(out.counts.prs, 5);
    assert_eq!(read_ids(&out.prs).len(), 5);
    assert!(!fx.path("calls.txt").exists());
}

#[test]
fn incomplete_panel_is_rejected_up_front() {
    let fx = Fixture::new();
    fs::remove_file(fx.path("panel.fam")).expect("remove fam");
    let plink = fx.mock_plink(CLUMPING_MOCK);

    let err = summary_split(&fx.config(&plink)).expect_err("panel incomplete");
    assert!(matches!(
        err.downcast_ref::<SummarySplitError>(),
        Some(SummarySplitError::InvalidArgument(_))
    ));
    assert!(!fx.path("calls.txt").exists());
}

#[test]
fn missing_marker_column_is_rejected() {
    let fx = Fixture::new();
    let plink = fx.mock_plink(CLUMPING_MOCK);
    let mut config = fx.config(&plink);
    config.snp_field = "SNP".to_string();

    let err = summary_split(&config).expect_err("column missing");
    assert!(matches!(
        err.downcast_ref::<SummarySplitError>(),
        Some(SummarySplitError::MissingColumn(_))
    ));
}

#[test]
fn gzipped_summary_keeps_inner_extension() {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    let fx = Fixture::new();
    let file = fs::File::create(fx.path("trait.txt.gz")).expect("create gz");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(SUMMARY.as_bytes()).expect("compress");
    encoder.finish().expect("finish gz");

    let mut config = SplitConfig::new(fx.path("trait.txt.gz"), fx.path("panel"));
    config.plink = fx.path("no-such-plink");
    config.threshold = 1e-12;

    let out = summary_split(&config).expect("split succeeds");
    assert!(out.prs.ends_with("trait.PRS.txt"));
    assert_eq!(read_ids(&out.prs), vec!["rs1", "rs2", "rs3", "rs4", "rs5"]);
}
