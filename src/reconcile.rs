// Provider-level vs summary-level cross-check.
//
// The provider extract should add up to the All Hits summary. Differences
// are data-quality findings for the report; they never stop a run.
use crate::types::{ConceptSummary, Measure, ProviderHitRecord, ReconcileFinding, ReconcileStatus};
use crate::util::{sum_known, to_cents};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Default tolerance in dollars.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

pub struct Reconciler {
    /// Largest difference, in dollars, still treated as rounding.
    pub tolerance: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Reconciler {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// Compare both measures for every concept seen on either side. Exact
    /// matches are included so callers can count them.
    pub fn reconcile(
        &self,
        providers: &[ProviderHitRecord],
        summaries: &[ConceptSummary],
    ) -> Vec<ReconcileFinding> {
        let mut detail: BTreeMap<&str, Vec<&ProviderHitRecord>> = BTreeMap::new();
        for p in providers {
            detail.entry(p.concept.as_str()).or_default().push(p);
        }
        let by_concept: HashMap<&str, &ConceptSummary> =
            summaries.iter().map(|s| (s.concept.as_str(), s)).collect();

        let mut concepts: Vec<&str> = summaries.iter().map(|s| s.concept.as_str()).collect();
        concepts.extend(detail.keys().filter(|c| !by_concept.contains_key(*c)));

        let mut findings = Vec::new();
        for concept in concepts {
            let rows = detail.get(concept).map(Vec::as_slice).unwrap_or(&[]);
            let summary = by_concept.get(concept);
            for measure in [Measure::Overpayment, Measure::PaidAmount] {
                let provider_total = match measure {
                    Measure::Overpayment => sum_known(rows.iter().map(|p| p.qualifying_paid_amount)),
                    Measure::PaidAmount => sum_known(rows.iter().map(|p| p.claim_paid_amount)),
                };
                let summary_total = summary.and_then(|s| match measure {
                    Measure::Overpayment => s.total_overpayment,
                    Measure::PaidAmount => s.total_paid_amount,
                });
                if let Some(status) = self.compare(provider_total, summary_total) {
                    let finding = ReconcileFinding {
                        concept: concept.to_string(),
                        measure,
                        provider_total,
                        summary_total,
                        status,
                    };
                    log_finding(&finding);
                    findings.push(finding);
                }
            }
        }
        findings
    }

    fn compare(&self, provider: Option<f64>, summary: Option<f64>) -> Option<ReconcileStatus> {
        let status = match (provider, summary) {
            (None, None) => return None,
            (Some(_), None) => ReconcileStatus::MissingSummary,
            (None, Some(_)) => ReconcileStatus::MissingProviderDetail,
            (Some(p), Some(s)) => {
                let diff_cents = to_cents(s) - to_cents(p);
                let delta = diff_cents as f64 / 100.0;
                if diff_cents == 0 {
                    ReconcileStatus::Exact
                } else if diff_cents.abs() <= to_cents(self.tolerance) {
                    ReconcileStatus::WithinTolerance { delta }
                } else {
                    ReconcileStatus::OutOfTolerance { delta }
                }
            }
        };
        Some(status)
    }
}

fn log_finding(f: &ReconcileFinding) {
    match &f.status {
        ReconcileStatus::Exact => {}
        ReconcileStatus::WithinTolerance { delta } => info!(
            "{} {}: provider detail differs from summary by {:.2} (within tolerance)",
            f.concept,
            f.measure.label(),
            delta
        ),
        ReconcileStatus::OutOfTolerance { delta } => warn!(
            "{} {}: provider detail differs from summary by {:.2}",
            f.concept,
            f.measure.label(),
            delta
        ),
        ReconcileStatus::MissingSummary => warn!(
            "{} {}: provider detail has no summary total to compare against",
            f.concept,
            f.measure.label()
        ),
        ReconcileStatus::MissingProviderDetail => warn!(
            "{} {}: summary total has no provider detail",
            f.concept,
            f.measure.label()
        ),
    }
}

/// Findings worth showing to a reader.
pub fn notable(findings: &[ReconcileFinding]) -> Vec<&ReconcileFinding> {
    findings.iter().filter(|f| !f.is_exact()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(concept: &str, npi: &str, qualifying: Option<f64>, paid: Option<f64>) -> ProviderHitRecord {
        ProviderHitRecord {
            concept: concept.to_string(),
            billing_npi: npi.to_string(),
            provider_hit_count: Some(1),
            claim_hit_count: Some(1),
            qualifying_paid_amount: qualifying,
            claim_paid_amount: paid,
        }
    }

    fn summary(concept: &str, overpayment: Option<f64>, paid: Option<f64>) -> ConceptSummary {
        ConceptSummary {
            concept: concept.to_string(),
            description: None,
            delivery_date: None,
            provider_hits: None,
            claim_hits: None,
            members_impacted: None,
            total_overpayment: overpayment,
            total_paid_amount: paid,
            avg_overpayment_per_provider: None,
            avg_overpayment_per_claim: None,
        }
    }

    fn overpayment_status<'a>(findings: &'a [ReconcileFinding], concept: &str) -> &'a ReconcileStatus {
        &findings
            .iter()
            .find(|f| f.concept == concept && f.measure == Measure::Overpayment)
            .unwrap()
            .status
    }

    #[test]
    fn test_cent_difference_is_advisory_within_tolerance() {
        let providers = vec![
            provider("Skin_graft", "00000001", Some(300000.0), Some(900000.0)),
            provider("Skin_graft", "00000002", Some(200000.0), Some(100000.0)),
        ];
        let summaries = vec![summary("Skin_graft", Some(500000.01), Some(1000000.0))];
        let findings = Reconciler::new(0.01).reconcile(&providers, &summaries);
        assert_eq!(
            overpayment_status(&findings, "Skin_graft"),
            &ReconcileStatus::WithinTolerance { delta: 0.01 }
        );
        assert_eq!(notable(&findings).len(), 1);
    }

    #[test]
    fn test_mismatch_beyond_tolerance() {
        let providers = vec![provider("Skin_graft", "1", Some(500000.0), None)];
        let summaries = vec![summary("Skin_graft", Some(500000.01), None)];
        let findings = Reconciler::new(0.0).reconcile(&providers, &summaries);
        assert_eq!(
            overpayment_status(&findings, "Skin_graft"),
            &ReconcileStatus::OutOfTolerance { delta: 0.01 }
        );
        // Paid amount is unknown on both sides: nothing to compare.
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_exact_and_one_sided_concepts() {
        let providers = vec![
            provider("A", "1", Some(10.0), Some(20.0)),
            provider("Orphan", "2", Some(5.0), None),
        ];
        let summaries = vec![summary("A", Some(10.0), Some(20.0)), summary("B", Some(7.0), None)];
        let findings = Reconciler::default().reconcile(&providers, &summaries);
        assert!(findings
            .iter()
            .filter(|f| f.concept == "A")
            .all(ReconcileFinding::is_exact));
        assert_eq!(
            overpayment_status(&findings, "B"),
            &ReconcileStatus::MissingProviderDetail
        );
        assert_eq!(
            overpayment_status(&findings, "Orphan"),
            &ReconcileStatus::MissingSummary
        );
    }
}
