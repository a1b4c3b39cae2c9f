// Fixed header renaming tables.
//
// The extracts are exported by hand and their headers drift; every header
// we understand is listed here and mapped onto a canonical field. Headers
// that are not listed are reported, never guessed at.
use crate::types::RawTable;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryField {
    Concept,
    Description,
    DeliveryDate,
    ProviderHits,
    ClaimHits,
    MembersImpacted,
    TotalOverpayment,
    TotalPaidAmount,
    AvgOverpaymentPerProvider,
    AvgOverpaymentPerClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderField {
    Concept,
    BillingNpi,
    ProviderHitCount,
    ClaimHitCount,
    QualifyingPaidAmount,
    ClaimPaidAmount,
}

pub static SUMMARY_COLUMNS: Lazy<HashMap<&'static str, SummaryField>> = Lazy::new(|| {
    HashMap::from([
        ("Concept", SummaryField::Concept),
        ("Description", SummaryField::Description),
        ("Date of Client Delivery", SummaryField::DeliveryDate),
        ("Number of Provider Hits", SummaryField::ProviderHits),
        ("Number of Claim Hits", SummaryField::ClaimHits),
        ("Number of Members Impacted", SummaryField::MembersImpacted),
        ("Total Overpayment", SummaryField::TotalOverpayment),
        ("Total Paid Amount", SummaryField::TotalPaidAmount),
        (
            "Average Overpayment Per Provider",
            SummaryField::AvgOverpaymentPerProvider,
        ),
        (
            "Average Overpayment Per Claim",
            SummaryField::AvgOverpaymentPerClaim,
        ),
    ])
});

/// Provider extract headers. The qualifying paid amount is the provider-level
/// counterpart of the summary "Total Overpayment".
pub static PROVIDER_COLUMNS: Lazy<HashMap<&'static str, ProviderField>> = Lazy::new(|| {
    HashMap::from([
        ("Concept", ProviderField::Concept),
        ("Billing NPI", ProviderField::BillingNpi),
        ("Number of Provider Hits", ProviderField::ProviderHitCount),
        ("Number of Claim Hits", ProviderField::ClaimHitCount),
        (
            "Total Qualifying Paid Amount",
            ProviderField::QualifyingPaidAmount,
        ),
        ("Total Overpayment", ProviderField::QualifyingPaidAmount),
        ("Total Claim Paid Amount", ProviderField::ClaimPaidAmount),
        ("Total Paid Amount", ProviderField::ClaimPaidAmount),
    ])
});

/// Column positions of the recognised fields in one table.
#[derive(Debug, Clone)]
pub struct ColumnMap<F> {
    positions: HashMap<F, usize>,
    pub unknown: Vec<String>,
}

impl<F: Copy + Eq + std::hash::Hash> ColumnMap<F> {
    /// Resolve `table`'s headers against `known`. The first header that maps
    /// onto a field wins; later aliases of the same field are reported.
    pub fn resolve(table: &RawTable, known: &HashMap<&'static str, F>) -> Self {
        let mut positions = HashMap::new();
        let mut unknown = Vec::new();
        for (idx, header) in table.headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            match known.get(header.as_str()) {
                Some(field) if !positions.contains_key(field) => {
                    positions.insert(*field, idx);
                }
                Some(_) => {
                    warn!("{}: duplicate column '{}' ignored", table.label, header);
                    unknown.push(header.clone());
                }
                None => {
                    warn!("{}: unrecognized column '{}' ignored", table.label, header);
                    unknown.push(header.clone());
                }
            }
        }
        ColumnMap { positions, unknown }
    }

    pub fn get(&self, field: F) -> Option<usize> {
        self.positions.get(&field).copied()
    }
}
