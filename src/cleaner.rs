use crate::error::{DashboardError, Result};
use crate::schema::{ColumnMap, ProviderField, SummaryField, PROVIDER_COLUMNS, SUMMARY_COLUMNS};
use crate::types::{HitRecord, ProviderHitRecord, RawTable};
use crate::util::{parse_count, parse_currency, parse_date_safe};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub rows: usize,
    pub missing_concept: usize,
    pub bad_currency: usize,
    pub bad_counts: usize,
    pub bad_dates: usize,
    /// Headers that did not map onto any field.
    pub unknown_columns: Vec<String>,
}

impl CleanReport {
    pub fn bad_cells(&self) -> usize {
        self.bad_currency + self.bad_counts + self.bad_dates
    }
}

/// Reads typed cells out of one row, tallying cells that were present but
/// unreadable.
struct RowReader<'a, F> {
    table: &'a RawTable,
    columns: &'a ColumnMap<F>,
    row: &'a [String],
    report: &'a mut CleanReport,
}

impl<'a, F: Copy + Eq + std::hash::Hash> RowReader<'a, F> {
    fn raw(&self, field: F) -> Option<&'a str> {
        let col = self.columns.get(field)?;
        let cell = self.table.cell(self.row, col).trim();
        (!cell.is_empty()).then_some(cell)
    }

    fn text(&self, field: F) -> Option<String> {
        self.raw(field).map(str::to_string)
    }

    fn currency(&mut self, field: F) -> Option<f64> {
        let raw = self.raw(field);
        let v = parse_currency(raw);
        if raw.is_some() && v.is_none() {
            self.report.bad_currency += 1;
        }
        v
    }

    fn count(&mut self, field: F) -> Option<i64> {
        let raw = self.raw(field);
        let v = parse_count(raw);
        if raw.is_some() && v.is_none() {
            self.report.bad_counts += 1;
        }
        v
    }

    fn date(&mut self, field: F) -> Option<chrono::NaiveDate> {
        let raw = self.raw(field);
        let v = parse_date_safe(raw);
        if raw.is_some() && v.is_none() {
            self.report.bad_dates += 1;
        }
        v
    }
}

fn require_concept<F: Copy + Eq + std::hash::Hash>(
    table: &RawTable,
    columns: &ColumnMap<F>,
    field: F,
) -> Result<()> {
    match columns.get(field) {
        Some(_) => Ok(()),
        None => Err(DashboardError::MissingColumn {
            label: table.label.clone(),
            column: "Concept".to_string(),
        }),
    }
}

/// Clean an All/Presented summary extract into `HitRecord`s.
pub fn clean_hits(table: &RawTable) -> Result<(Vec<HitRecord>, CleanReport)> {
    let columns = ColumnMap::resolve(table, &*SUMMARY_COLUMNS);
    require_concept(table, &columns, SummaryField::Concept)?;

    let mut report = CleanReport {
        unknown_columns: columns.unknown.clone(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        report.rows += 1;
        let mut r = RowReader {
            table,
            columns: &columns,
            row,
            report: &mut report,
        };
        let Some(concept) = r.text(SummaryField::Concept) else {
            r.report.missing_concept += 1;
            continue;
        };
        records.push(HitRecord {
            concept,
            description: r.text(SummaryField::Description),
            delivery_date: r.date(SummaryField::DeliveryDate),
            provider_hits: r.count(SummaryField::ProviderHits),
            claim_hits: r.count(SummaryField::ClaimHits),
            members_impacted: r.count(SummaryField::MembersImpacted),
            total_overpayment: r.currency(SummaryField::TotalOverpayment),
            total_paid_amount: r.currency(SummaryField::TotalPaidAmount),
            avg_overpayment_per_provider: r.currency(SummaryField::AvgOverpaymentPerProvider),
            avg_overpayment_per_claim: r.currency(SummaryField::AvgOverpaymentPerClaim),
        });
    }
    log_report(&table.label, &report);
    Ok((records, report))
}

/// Clean the provider-level extract. `Billing NPI` stays an exact string.
pub fn clean_provider_hits(table: &RawTable) -> Result<(Vec<ProviderHitRecord>, CleanReport)> {
    let columns = ColumnMap::resolve(table, &*PROVIDER_COLUMNS);
    require_concept(table, &columns, ProviderField::Concept)?;

    let mut report = CleanReport {
        unknown_columns: columns.unknown.clone(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        report.rows += 1;
        let mut r = RowReader {
            table,
            columns: &columns,
            row,
            report: &mut report,
        };
        let Some(concept) = r.text(ProviderField::Concept) else {
            r.report.missing_concept += 1;
            continue;
        };
        records.push(ProviderHitRecord {
            concept,
            billing_npi: r.text(ProviderField::BillingNpi).unwrap_or_default(),
            provider_hit_count: r.count(ProviderField::ProviderHitCount),
            claim_hit_count: r.count(ProviderField::ClaimHitCount),
            qualifying_paid_amount: r.currency(ProviderField::QualifyingPaidAmount),
            claim_paid_amount: r.currency(ProviderField::ClaimPaidAmount),
        });
    }
    log_report(&table.label, &report);
    Ok((records, report))
}

fn log_report(label: &str, report: &CleanReport) {
    debug!(
        "{}: cleaned {} rows ({} without concept, {} bad currency, {} bad counts, {} bad dates)",
        label,
        report.rows,
        report.missing_concept,
        report.bad_currency,
        report.bad_counts,
        report.bad_dates
    );
}
