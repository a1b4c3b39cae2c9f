use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// Which summary extract a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HitSource {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "presented")]
    Presented,
}

impl HitSource {
    pub fn label(self) -> &'static str {
        match self {
            HitSource::All => "All Hits",
            HitSource::Presented => "Presented Hits",
        }
    }
}

/// A CSV file after lenient loading: trimmed headers, blank rows and
/// blank trailing columns removed, every cell kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub label: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cell text for `row` at `col`; short rows read as blank.
    pub fn cell<'a>(&'a self, row: &'a [String], col: usize) -> &'a str {
        row.get(col).map(String::as_str).unwrap_or("")
    }
}

/// One summary row: a concept as reported in the All or Presented extract.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub concept: String,
    pub description: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub provider_hits: Option<i64>,
    pub claim_hits: Option<i64>,
    pub members_impacted: Option<i64>,
    pub total_overpayment: Option<f64>,
    pub total_paid_amount: Option<f64>,
    pub avg_overpayment_per_provider: Option<f64>,
    pub avg_overpayment_per_claim: Option<f64>,
}

/// One provider row from the provider-level extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHitRecord {
    pub concept: String,
    /// Kept exactly as written; never parsed as a number.
    pub billing_npi: String,
    pub provider_hit_count: Option<i64>,
    pub claim_hit_count: Option<i64>,
    pub qualifying_paid_amount: Option<f64>,
    pub claim_paid_amount: Option<f64>,
}

/// Per-concept rollup of one summary source. `None` means "unknown":
/// every contributing value was missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptSummary {
    pub concept: String,
    pub description: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub provider_hits: Option<i64>,
    pub claim_hits: Option<i64>,
    pub members_impacted: Option<i64>,
    pub total_overpayment: Option<f64>,
    pub total_paid_amount: Option<f64>,
    pub avg_overpayment_per_provider: Option<f64>,
    pub avg_overpayment_per_claim: Option<f64>,
}

/// Portfolio-level sums for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub source: HitSource,
    pub concepts: usize,
    pub total_overpayment: Option<f64>,
    pub total_paid_amount: Option<f64>,
    pub provider_hits: Option<i64>,
    pub claim_hits: Option<i64>,
    pub members_impacted: Option<i64>,
}

/// Both portfolio views side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub all: PortfolioMetrics,
    pub presented: PortfolioMetrics,
}

impl HeadlineMetrics {
    /// All minus Presented overpayment, when both sides are known.
    pub fn overpayment_delta(&self) -> Option<f64> {
        Some(self.all.total_overpayment? - self.presented.total_overpayment?)
    }

    pub fn provider_hits_delta(&self) -> Option<i64> {
        self.all.provider_hits?.checked_sub(self.presented.provider_hits?)
    }

    pub fn claim_hits_delta(&self) -> Option<i64> {
        self.all.claim_hits?.checked_sub(self.presented.claim_hits?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadenceEntry {
    pub concept: String,
    pub delivery_date: NaiveDate,
    pub days_since_baseline: i64,
}

/// Delivery spacing of dated concepts, ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cadence {
    pub baseline: NaiveDate,
    pub entries: Vec<CadenceEntry>,
    pub average_interval_days: Option<f64>,
}

/// Everything delivered on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub delivery_date: NaiveDate,
    pub concepts: Vec<String>,
    pub total_overpayment: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Measure {
    #[serde(rename = "overpayment")]
    Overpayment,
    #[serde(rename = "paid_amount")]
    PaidAmount,
}

impl Measure {
    pub fn label(self) -> &'static str {
        match self {
            Measure::Overpayment => "Total Overpayment",
            Measure::PaidAmount => "Total Paid Amount",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileStatus {
    Exact,
    WithinTolerance { delta: f64 },
    OutOfTolerance { delta: f64 },
    /// Provider rows exist but the summary has no usable total.
    MissingSummary,
    /// The summary has a total but no provider rows carry a value.
    MissingProviderDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileFinding {
    pub concept: String,
    pub measure: Measure,
    pub provider_total: Option<f64>,
    pub summary_total: Option<f64>,
    #[serde(flatten)]
    pub status: ReconcileStatus,
}

impl ReconcileFinding {
    pub fn is_exact(&self) -> bool {
        matches!(self.status, ReconcileStatus::Exact)
    }
}

/// Deterministic sidecar written next to the dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub headline: HeadlineMetrics,
    pub cadence: Cadence,
    pub reconciliation: Vec<ReconcileFinding>,
}

#[derive(Debug, Tabled, Clone)]
pub struct HeadlinePreviewRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Presented")]
    pub presented: String,
    #[tabled(rename = "All")]
    pub all: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct CadencePreviewRow {
    #[tabled(rename = "Concept")]
    pub concept: String,
    #[tabled(rename = "DeliveryDate")]
    pub delivery_date: String,
    #[tabled(rename = "DaysSinceBaseline")]
    pub days_since_baseline: i64,
}

/// Provider-level values of one concept, ready for histogramming.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptDistribution {
    pub concept: String,
    pub overpayments: Vec<f64>,
    pub claim_hits: Vec<i64>,
}
