use std::path::PathBuf;

/// Row counts after each stage of a split run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub input: usize,
    pub significant: usize,
    pub remainder: usize,
    pub missing_p: usize,
    pub genome_wide: usize,
    pub prs: usize,
}

#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub genome_wide: PathBuf,
    pub prs: PathBuf,
    pub log: PathBuf,
    pub counts: StageCounts,
}
