use crate::types::{
    Cadence, CadenceEntry, ConceptDistribution, ConceptSummary, HeadlineMetrics, HitRecord,
    HitSource, PortfolioMetrics, ProviderHitRecord, TimelinePoint,
};
use crate::util::{average, days_diff, sum_known, sum_known_counts};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Group rows by concept, keeping the order concepts first appear in.
fn group_by_concept<'a, T>(rows: &'a [T], concept: impl Fn(&T) -> &str) -> Vec<(&'a str, Vec<&'a T>)> {
    let mut order: Vec<(&'a str, Vec<&'a T>)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for row in rows {
        let key: &'a str = concept(row);
        match index.get(key) {
            Some(&i) => order[i].1.push(row),
            None => {
                index.insert(key, order.len());
                order.push((key, vec![row]));
            }
        }
    }
    order
}

fn ratio(total: Option<f64>, count: Option<i64>) -> Option<f64> {
    match (total, count) {
        (Some(t), Some(c)) if c > 0 => Some(t / c as f64),
        _ => None,
    }
}

/// Per-concept rollup of one summary extract.
///
/// Sums skip missing cells; a concept whose every cell for a measure is
/// missing reports `None` for it, not zero. Counts are taken from the
/// summary rows as reported.
pub fn summarize_concepts(records: &[HitRecord]) -> Vec<ConceptSummary> {
    group_by_concept(records, |r| r.concept.as_str())
        .into_iter()
        .map(|(concept, rows)| {
            let total_overpayment = sum_known(rows.iter().map(|r| r.total_overpayment));
            let provider_hits = sum_known_counts(rows.iter().map(|r| r.provider_hits));
            let claim_hits = sum_known_counts(rows.iter().map(|r| r.claim_hits));
            let (per_provider, per_claim) = match rows.as_slice() {
                [only] => (
                    only.avg_overpayment_per_provider
                        .or_else(|| ratio(total_overpayment, provider_hits)),
                    only.avg_overpayment_per_claim
                        .or_else(|| ratio(total_overpayment, claim_hits)),
                ),
                _ => (
                    ratio(total_overpayment, provider_hits),
                    ratio(total_overpayment, claim_hits),
                ),
            };
            ConceptSummary {
                concept: concept.to_string(),
                description: rows.iter().find_map(|r| r.description.clone()),
                delivery_date: rows.iter().filter_map(|r| r.delivery_date).min(),
                provider_hits,
                claim_hits,
                members_impacted: sum_known_counts(rows.iter().map(|r| r.members_impacted)),
                total_overpayment,
                total_paid_amount: sum_known(rows.iter().map(|r| r.total_paid_amount)),
                avg_overpayment_per_provider: per_provider,
                avg_overpayment_per_claim: per_claim,
            }
        })
        .collect()
}

/// Order by delivery date ascending; undated concepts keep their relative
/// order at the end.
pub fn sort_by_delivery(summaries: &mut [ConceptSummary]) {
    summaries.sort_by_key(|s| (s.delivery_date.is_none(), s.delivery_date));
}

pub fn portfolio_metrics(source: HitSource, summaries: &[ConceptSummary]) -> PortfolioMetrics {
    let concepts: BTreeSet<&str> = summaries.iter().map(|s| s.concept.as_str()).collect();
    PortfolioMetrics {
        source,
        concepts: concepts.len(),
        total_overpayment: sum_known(summaries.iter().map(|s| s.total_overpayment)),
        total_paid_amount: sum_known(summaries.iter().map(|s| s.total_paid_amount)),
        provider_hits: sum_known_counts(summaries.iter().map(|s| s.provider_hits)),
        claim_hits: sum_known_counts(summaries.iter().map(|s| s.claim_hits)),
        members_impacted: sum_known_counts(summaries.iter().map(|s| s.members_impacted)),
    }
}

pub fn headline_metrics(all: &[ConceptSummary], presented: &[ConceptSummary]) -> HeadlineMetrics {
    HeadlineMetrics {
        all: portfolio_metrics(HitSource::All, all),
        presented: portfolio_metrics(HitSource::Presented, presented),
    }
}

/// Delivery cadence of dated concepts relative to `baseline`.
///
/// Each distinct (concept, date) pair is one delivery. The average interval
/// is the mean gap between consecutive deliveries and needs at least two.
pub fn delivery_cadence(records: &[HitRecord], baseline: NaiveDate) -> Cadence {
    let deliveries: BTreeSet<(NaiveDate, &str)> = records
        .iter()
        .filter_map(|r| r.delivery_date.map(|d| (d, r.concept.as_str())))
        .collect();

    let entries: Vec<CadenceEntry> = deliveries
        .iter()
        .map(|(date, concept)| CadenceEntry {
            concept: concept.to_string(),
            delivery_date: *date,
            days_since_baseline: days_diff(*date, baseline),
        })
        .collect();

    let gaps: Vec<f64> = entries
        .windows(2)
        .map(|w| days_diff(w[0].delivery_date, w[1].delivery_date) as f64)
        .collect();

    Cadence {
        baseline,
        average_interval_days: average(&gaps),
        entries,
    }
}

/// Overpayment delivered per date with the names of the concepts behind it.
pub fn delivery_timeline(records: &[HitRecord]) -> Vec<TimelinePoint> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&str, Vec<Option<f64>>>> = BTreeMap::new();
    for r in records {
        let Some(date) = r.delivery_date else {
            continue;
        };
        by_date
            .entry(date)
            .or_default()
            .entry(r.concept.as_str())
            .or_default()
            .push(r.total_overpayment);
    }
    by_date
        .into_iter()
        .map(|(delivery_date, concepts)| {
            let per_concept: Vec<Option<f64>> = concepts
                .values()
                .map(|v| sum_known(v.iter().copied()))
                .collect();
            TimelinePoint {
                delivery_date,
                concepts: concepts.keys().map(|c| c.to_string()).collect(),
                total_overpayment: sum_known(per_concept),
            }
        })
        .collect()
}

/// Provider-level overpayment and claim-hit values per concept. Missing
/// values are left out rather than plotted as zero.
pub fn provider_distributions(providers: &[ProviderHitRecord]) -> Vec<ConceptDistribution> {
    group_by_concept(providers, |p| p.concept.as_str())
        .into_iter()
        .map(|(concept, rows)| ConceptDistribution {
            concept: concept.to_string(),
            overpayments: rows.iter().filter_map(|p| p.qualifying_paid_amount).collect(),
            claim_hits: rows.iter().filter_map(|p| p.claim_hit_count).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn hit(concept: &str, when: Option<&str>, overpayment: Option<f64>) -> HitRecord {
        HitRecord {
            concept: concept.to_string(),
            description: None,
            delivery_date: when.map(date),
            provider_hits: Some(2),
            claim_hits: Some(10),
            members_impacted: None,
            total_overpayment: overpayment,
            total_paid_amount: overpayment.map(|v| v * 2.0),
            avg_overpayment_per_provider: None,
            avg_overpayment_per_claim: None,
        }
    }

    #[test]
    fn test_cadence_intervals_and_baseline() {
        let records = vec![
            hit("C", Some("2025-10-21"), Some(1.0)),
            hit("A", Some("2025-10-01"), Some(1.0)),
            hit("B", Some("2025-10-11"), Some(1.0)),
            hit("U", None, Some(1.0)),
        ];
        let cadence = delivery_cadence(&records, date("2025-11-05"));
        assert_eq!(cadence.average_interval_days, Some(10.0));
        let names: Vec<&str> = cadence.entries.iter().map(|e| e.concept.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(cadence.entries[0].days_since_baseline, 35);
    }

    #[test]
    fn test_cadence_needs_two_dates() {
        let records = vec![hit("A", Some("2025-10-01"), None), hit("B", None, None)];
        let cadence = delivery_cadence(&records, date("2025-11-05"));
        assert_eq!(cadence.entries.len(), 1);
        assert_eq!(cadence.average_interval_days, None);
        assert_eq!(delivery_cadence(&[], date("2025-11-05")).average_interval_days, None);
    }

    #[test]
    fn test_all_missing_overpayment_is_unknown() {
        let records = vec![hit("Skin_graft", None, None), hit("Skin_graft", None, None)];
        let summaries = summarize_concepts(&records);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_overpayment, None);
        assert_eq!(summaries[0].total_paid_amount, None);
        assert_eq!(summaries[0].provider_hits, Some(4));
        assert_eq!(summaries[0].members_impacted, None);
    }

    #[test]
    fn test_missing_values_excluded_not_zeroed() {
        let records = vec![
            hit("A", None, Some(100.0)),
            hit("A", None, None),
            hit("B", None, Some(50.0)),
        ];
        let summaries = summarize_concepts(&records);
        assert_eq!(summaries[0].concept, "A");
        assert_eq!(summaries[0].total_overpayment, Some(100.0));
        assert_eq!(summaries[0].avg_overpayment_per_claim, Some(5.0));
        let metrics = portfolio_metrics(HitSource::All, &summaries);
        assert_eq!(metrics.concepts, 2);
        assert_eq!(metrics.total_overpayment, Some(150.0));
        assert_eq!(metrics.claim_hits, Some(30));
    }

    #[test]
    fn test_headline_delta() {
        let all = summarize_concepts(&[hit("A", None, Some(300.0)), hit("B", None, Some(200.0))]);
        let presented = summarize_concepts(&[hit("A", None, Some(300.0))]);
        let headline = headline_metrics(&all, &presented);
        assert_eq!(headline.overpayment_delta(), Some(200.0));
        assert_eq!(headline.provider_hits_delta(), Some(2));
        assert_eq!(headline.claim_hits_delta(), Some(10));
        assert_eq!(headline.presented.concepts, 1);
    }

    #[test]
    fn test_sort_by_delivery_puts_undated_last() {
        let mut summaries = summarize_concepts(&[
            hit("U", None, None),
            hit("B", Some("2025-09-02"), None),
            hit("A", Some("2025-09-01"), None),
        ]);
        sort_by_delivery(&mut summaries);
        let names: Vec<&str> = summaries.iter().map(|s| s.concept.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "U"]);
    }

    #[test]
    fn test_timeline_groups_by_date() {
        let records = vec![
            hit("B", Some("2025-10-01"), Some(200.0)),
            hit("A", Some("2025-10-01"), Some(100.0)),
            hit("C", Some("2025-10-11"), None),
        ];
        let timeline = delivery_timeline(&records);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].concepts, vec!["A", "B"]);
        assert_eq!(timeline[0].total_overpayment, Some(300.0));
        assert_eq!(timeline[1].total_overpayment, None);
    }

    #[test]
    fn test_provider_distributions_skip_missing() {
        let providers = vec![
            ProviderHitRecord {
                concept: "A".into(),
                billing_npi: "0001".into(),
                provider_hit_count: Some(1),
                claim_hit_count: Some(4),
                qualifying_paid_amount: None,
                claim_paid_amount: None,
            },
            ProviderHitRecord {
                concept: "A".into(),
                billing_npi: "0002".into(),
                provider_hit_count: Some(1),
                claim_hit_count: None,
                qualifying_paid_amount: Some(10.0),
                claim_paid_amount: None,
            },
        ];
        let dist = provider_distributions(&providers);
        assert_eq!(dist.len(), 1);
        assert_eq!(dist[0].overpayments, vec![10.0]);
        assert_eq!(dist[0].claim_hits, vec![4]);
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let records = vec![
            hit("A", Some("2025-10-01"), Some(0.1)),
            hit("B", Some("2025-10-03"), Some(0.2)),
        ];
        let first = serde_json::to_string(&summarize_concepts(&records)).unwrap();
        let second = serde_json::to_string(&summarize_concepts(&records)).unwrap();
        assert_eq!(first, second);
    }
}
