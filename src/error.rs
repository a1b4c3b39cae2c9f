use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a run or a single output location.
///
/// Cell-level problems (bad currency text, bad dates) never show up here;
/// they become missing values in the cleaned tables instead.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("required source '{label}' is missing: {}", path.display())]
    MissingSource { label: String, path: PathBuf },

    #[error("required source '{label}' has no data rows: {}", path.display())]
    EmptySource { label: String, path: PathBuf },

    #[error("source '{label}' has no '{column}' column")]
    MissingColumn { label: String, column: String },

    #[error("failed to parse CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize metrics: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DashboardError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the conditions that mean a required input could not be used.
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            DashboardError::MissingSource { .. }
                | DashboardError::EmptySource { .. }
                | DashboardError::MissingColumn { .. }
                | DashboardError::Csv { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
