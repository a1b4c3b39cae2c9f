// Run configuration.
//
// Only two settings come from the environment; everything else is fixed by
// the layout of the deliverables folder.
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

pub const ALL_HITS_FILE: &str = "All Hits - Summary Statistics.csv";
pub const PRESENTED_HITS_FILE: &str = "Presented Hits - Summary Statistics.csv";
pub const PROVIDER_HITS_FILE: &str = "All Provider Hits.csv";

pub const WHITEPAPERS_DIR: &str = "Whitepapers";
pub const VISUALS_DIR: &str = "visuals";
pub const REPORTS_DIR: &str = "reports";
pub const DASHBOARD_FILE: &str = "executive-dashboard.html";
pub const METRICS_FILE: &str = "dashboard-metrics.json";

/// Cadence is measured against this date.
pub static BASELINE_DATE: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2025, 11, 5).unwrap_or_default());

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the inputs and receiving the root copy.
    pub root: PathBuf,
    /// URL prefix for whitepaper links, without a trailing `/`.
    pub base_path: String,
    /// Extra output directory, if configured.
    pub output_dir: Option<PathBuf>,
    pub baseline: NaiveDate,
    pub tolerance: f64,
}

impl Config {
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(root: impl Into<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let root = root.into();
        let base_path = lookup("BASE_PATH")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();
        let output_dir = lookup("OUTPUT_DIR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| root.join(v));
        Self {
            root,
            base_path,
            output_dir,
            baseline: *BASELINE_DATE,
            tolerance: crate::reconcile::DEFAULT_TOLERANCE,
        }
    }

    pub fn input(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn asset_dirs(&self) -> [PathBuf; 2] {
        [self.root.join(WHITEPAPERS_DIR), self.root.join(VISUALS_DIR)]
    }

    /// Link target for a concept's whitepaper, relative unless `BASE_PATH`
    /// is set so the same document works from the root and from `reports/`.
    pub fn whitepaper_href(&self, concept: &str) -> String {
        if self.base_path.is_empty() {
            format!("{}/{}.pdf", WHITEPAPERS_DIR, concept)
        } else {
            format!("{}/{}/{}.pdf", self.base_path, WHITEPAPERS_DIR, concept)
        }
    }

    pub fn whitepaper_path(&self, concept: &str) -> PathBuf {
        self.root.join(WHITEPAPERS_DIR).join(format!("{}.pdf", concept))
    }
}

pub fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
