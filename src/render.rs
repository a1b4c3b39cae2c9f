// HTML rendering of the executive dashboard.
//
// Everything here formats values computed upstream; nothing is summed or
// recomputed. Charts are Plotly figures serialized as JSON, with the Plotly
// bundle pulled from the CDN by the first chart on the page.
use crate::config::Config;
use crate::reconcile::notable;
use crate::types::{
    Cadence, CadencePreviewRow, ConceptDistribution, ConceptSummary, HeadlineMetrics,
    HeadlinePreviewRow, ReconcileFinding, ReconcileStatus, TimelinePoint,
};
use crate::util::{format_count, format_currency, format_number, MISSING};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const HISTOGRAM_BINS: u32 = 50;

/// Everything the document shows, already aggregated.
pub struct DashboardView<'a> {
    pub headline: &'a HeadlineMetrics,
    /// Presented concepts, ordered by delivery date.
    pub presented: &'a [ConceptSummary],
    /// All concepts, ordered by delivery date.
    pub all: &'a [ConceptSummary],
    pub cadence: &'a Cadence,
    pub presented_timeline: &'a [TimelinePoint],
    pub all_timeline: &'a [TimelinePoint],
    pub distributions: &'a [ConceptDistribution],
    pub findings: &'a [ReconcileFinding],
    pub as_of: NaiveDate,
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Emits chart markup, loading Plotly from the CDN exactly once.
#[derive(Default)]
pub struct PlotlyEmbedder {
    cdn_included: bool,
}

impl PlotlyEmbedder {
    pub fn embed(&mut self, div_id: &str, figure: &Value) -> String {
        let mut html = String::new();
        if !self.cdn_included {
            html.push_str(&format!(
                "<script src=\"{}\" charset=\"utf-8\"></script>\n",
                PLOTLY_CDN
            ));
            self.cdn_included = true;
        }
        let data = script_safe(&figure["data"]);
        let layout = script_safe(&figure["layout"]);
        html.push_str(&format!(
            r#"<div id="{id}" class="plotly-graph-div" style="height:480px; width:100%;"></div>
<script type="text/javascript">Plotly.newPlot("{id}", {data}, {layout}, {{"responsive": true}});</script>
"#,
            id = div_id,
            data = data,
            layout = layout,
        ));
        html
    }
}

/// JSON that cannot close the surrounding `<script>` element.
fn script_safe(v: &Value) -> String {
    v.to_string().replace("</", "<\\/")
}

/// One overlay trace per concept. `None` when the concept has no values.
pub fn histogram_trace(concept: &str, values: &[f64]) -> Option<Value> {
    if values.is_empty() {
        return None;
    }
    Some(json!({
        "type": "histogram",
        "name": concept,
        "x": values,
        "nbinsx": HISTOGRAM_BINS,
        "opacity": 0.75,
    }))
}

/// Overlay histogram of the given traces; `None` when no concept had data.
pub fn histogram_figure(title: &str, x_title: &str, traces: Vec<Value>) -> Option<Value> {
    if traces.is_empty() {
        return None;
    }
    Some(json!({
        "data": traces,
        "layout": {
            "title": { "text": title },
            "barmode": "overlay",
            "margin": { "l": 40, "r": 40, "t": 60, "b": 40 },
            "legend": { "title": { "text": "Concept" } },
            "xaxis": { "title": { "text": x_title } },
            "yaxis": { "title": { "text": "Count of Providers" } },
        }
    }))
}

pub fn overpayment_histogram(distributions: &[ConceptDistribution]) -> Option<Value> {
    let traces = distributions
        .iter()
        .filter_map(|d| histogram_trace(&d.concept, &d.overpayments))
        .collect();
    histogram_figure(
        "Distribution of Total Overpayment per Provider",
        "Total Overpayment ($)",
        traces,
    )
}

pub fn claim_hits_histogram(distributions: &[ConceptDistribution]) -> Option<Value> {
    let traces = distributions
        .iter()
        .filter_map(|d| {
            let values: Vec<f64> = d.claim_hits.iter().map(|v| *v as f64).collect();
            histogram_trace(&d.concept, &values)
        })
        .collect();
    histogram_figure(
        "Distribution of Number of Claim Hits per Provider",
        "Number of Claim Hits",
        traces,
    )
}

/// Label for a timeline point: `"A, B ($1,234)"`.
pub fn timeline_label(point: &TimelinePoint) -> String {
    let total = format_currency(point.total_overpayment);
    if point.concepts.is_empty() {
        format!("({})", total)
    } else {
        format!("{} ({})", point.concepts.join(", "), total)
    }
}

/// Overpayment over time; dates with no known total are left off the line.
pub fn timeline_figure(title: &str, points: &[TimelinePoint]) -> Option<Value> {
    let known: Vec<(&TimelinePoint, f64)> = points
        .iter()
        .filter_map(|p| p.total_overpayment.map(|t| (p, t)))
        .collect();
    if known.is_empty() {
        return None;
    }
    let x: Vec<String> = known
        .iter()
        .map(|(p, _)| p.delivery_date.format("%Y-%m-%d").to_string())
        .collect();
    let y: Vec<f64> = known.iter().map(|(_, t)| *t).collect();
    let text: Vec<String> = known.iter().map(|(p, _)| timeline_label(p)).collect();
    Some(json!({
        "data": [{
            "type": "scatter",
            "mode": "lines+markers+text",
            "x": x,
            "y": y,
            "text": text,
            "textposition": "top center",
            "textfont": { "size": 11 },
            "cliponaxis": false,
            "hovertemplate": "<b>%{x|%Y-%m-%d}</b><br>Total Overpayment: $%{y:,}<br>%{text}<extra></extra>",
        }],
        "layout": {
            "title": { "text": title },
            "margin": { "l": 60, "r": 60, "t": 100, "b": 60 },
            "xaxis": { "title": { "text": "Date of Client Delivery" } },
            "yaxis": { "title": { "text": "Total Overpayment ($)" }, "rangemode": "tozero" },
            "showlegend": false,
        }
    }))
}

/// Console preview of the headline numbers.
pub fn headline_preview(h: &HeadlineMetrics) -> Vec<HeadlinePreviewRow> {
    let row = |metric: &str, presented: String, all: String| HeadlinePreviewRow {
        metric: metric.to_string(),
        presented,
        all,
    };
    vec![
        row(
            "Concepts",
            format_count(Some(h.presented.concepts as i64)),
            format_count(Some(h.all.concepts as i64)),
        ),
        row(
            "Total Overpayment",
            format_currency(h.presented.total_overpayment),
            format_currency(h.all.total_overpayment),
        ),
        row(
            "Providers Flagged",
            format_count(h.presented.provider_hits),
            format_count(h.all.provider_hits),
        ),
        row(
            "Claims Flagged",
            format_count(h.presented.claim_hits),
            format_count(h.all.claim_hits),
        ),
    ]
}

pub fn cadence_preview(cadence: &Cadence) -> Vec<CadencePreviewRow> {
    cadence
        .entries
        .iter()
        .map(|e| CadencePreviewRow {
            concept: e.concept.clone(),
            delivery_date: e.delivery_date.format("%Y-%m-%d").to_string(),
            days_since_baseline: e.days_since_baseline,
        })
        .collect()
}

/// `<table>` from pre-escaped cells.
pub fn html_table(class: Option<&str>, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = match class {
        Some(c) => format!("<table class=\"{}\">\n", c),
        None => "<table>\n".to_string(),
    };
    out.push_str("  <thead><tr>");
    for h in headers {
        out.push_str(&format!("<th>{}</th>", escape_html(h)));
    }
    out.push_str("</tr></thead>\n  <tbody>\n");
    for row in rows {
        out.push_str("    <tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("  </tbody>\n</table>");
    out
}

fn format_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

/// `" · not yet presented: X"`, or nothing when the difference is unknown.
fn not_presented_note(delta: Option<String>) -> String {
    delta
        .map(|d| format!(" &middot; not yet presented: {}", d))
        .unwrap_or_default()
}

fn render_summary_cards(h: &HeadlineMetrics) -> String {
    let not_presented = not_presented_note(h.overpayment_delta().map(|d| format_currency(Some(d))));
    let prov_np = not_presented_note(h.provider_hits_delta().map(|d| format_count(Some(d))));
    let claims_np = not_presented_note(h.claim_hits_delta().map(|d| format_count(Some(d))));
    format!(
        r#"<div class='summary'>
  <div class='card'>
    <div class='caption'>Number of Concepts Delivered to Date</div>
    <div><strong>{delivered}</strong></div>
    <div class='small'>Distinct concepts in Presented Hits.</div>
  </div>
  <div class='card'>
    <div class='caption'>Total Estimated Overpayment</div>
    <div><strong>{over_p}</strong> (presented)</div>
    <div class='small'>Overall: {over_a}{not_presented}</div>
  </div>
  <div class='card'>
    <div class='caption'>Providers Flagged</div>
    <div><strong>{prov_p}</strong> presented</div>
    <div class='small'>Overall flagged: {prov_a}{prov_np}</div>
  </div>
  <div class='card'>
    <div class='caption'>Claims Flagged</div>
    <div><strong>{claims_p}</strong> presented</div>
    <div class='small'>Overall flagged: {claims_a}{claims_np}</div>
  </div>
</div>"#,
        delivered = format_count(Some(h.presented.concepts as i64)),
        over_p = format_currency(h.presented.total_overpayment),
        over_a = format_currency(h.all.total_overpayment),
        not_presented = not_presented,
        prov_p = format_count(h.presented.provider_hits),
        prov_a = format_count(h.all.provider_hits),
        prov_np = prov_np,
        claims_p = format_count(h.presented.claim_hits),
        claims_a = format_count(h.all.claim_hits),
        claims_np = claims_np,
    )
}

fn render_concept_catalogue(presented: &[ConceptSummary], config: &Config) -> String {
    let rows: Vec<Vec<String>> = presented
        .iter()
        .map(|s| {
            vec![
                format!(
                    "<a href='{}' target='_blank'>&#128196;</a>",
                    escape_html(&config.whitepaper_href(&s.concept))
                ),
                escape_html(&s.concept),
                format_date(s.delivery_date),
                s.description.as_deref().map(escape_html).unwrap_or_default(),
            ]
        })
        .collect();
    html_table(
        Some("concept-table"),
        &["White paper", "Concept", "Date of Client Delivery", "Description"],
        &rows,
    )
}

fn render_concept_stats(summaries: &[ConceptSummary]) -> String {
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                escape_html(&s.concept),
                format_count(s.provider_hits),
                format_count(s.claim_hits),
                format_count(s.members_impacted),
                format_currency(s.total_overpayment),
                format_currency(s.total_paid_amount),
                format_currency(s.avg_overpayment_per_provider),
                format_currency(s.avg_overpayment_per_claim),
            ]
        })
        .collect();
    html_table(
        None,
        &[
            "Concept",
            "Number of Provider Hits",
            "Number of Claim Hits",
            "Number of Members Impacted",
            "Total Overpayment",
            "Total Paid Amount",
            "Average Overpayment Per Provider",
            "Average Overpayment Per Claim",
        ],
        &rows,
    )
}

pub fn format_interval(avg: Option<f64>) -> String {
    avg.map(|d| format!("{} days", format_number(d, 1)))
        .unwrap_or_else(|| "unknown".to_string())
}

fn render_cadence(cadence: &Cadence) -> String {
    let rows: Vec<Vec<String>> = cadence
        .entries
        .iter()
        .map(|e| {
            vec![
                escape_html(&e.concept),
                e.delivery_date.format("%Y-%m-%d").to_string(),
                e.days_since_baseline.to_string(),
            ]
        })
        .collect();
    format!(
        "<p class='small'>Days since baseline ({}); average successive cadence: <strong>{}</strong>.</p>\n<div class='table-wrap'>\n{}\n</div>",
        cadence.baseline.format("%Y-%m-%d"),
        format_interval(cadence.average_interval_days),
        html_table(
            None,
            &["Concept", "Date of Client Delivery", "Days Since Baseline"],
            &rows
        )
    )
}

fn status_text(status: &ReconcileStatus) -> String {
    match status {
        ReconcileStatus::Exact => "Matches".to_string(),
        ReconcileStatus::WithinTolerance { delta } => {
            format!("Rounding difference ({})", format_number(*delta, 2))
        }
        ReconcileStatus::OutOfTolerance { delta } => {
            format!("Mismatch ({})", format_number(*delta, 2))
        }
        ReconcileStatus::MissingSummary => "No summary total".to_string(),
        ReconcileStatus::MissingProviderDetail => "No provider detail".to_string(),
    }
}

fn render_reconciliation(findings: &[ReconcileFinding]) -> String {
    let notes = notable(findings);
    if notes.is_empty() {
        return "<p class='small'>Provider-level detail reconciles with the All Hits summary.</p>"
            .to_string();
    }
    let rows: Vec<Vec<String>> = notes
        .iter()
        .map(|f| {
            vec![
                escape_html(&f.concept),
                f.measure.label().to_string(),
                format_currency(f.provider_total),
                format_currency(f.summary_total),
                status_text(&f.status),
            ]
        })
        .collect();
    format!(
        "<div class='note'>Provider-level detail does not fully reconcile with the All Hits summary. These figures are shown as reported.</div>\n<div class='table-wrap'>\n{}\n</div>",
        html_table(
            None,
            &["Concept", "Measure", "Provider Detail", "Summary", "Status"],
            &rows
        )
    )
}

fn chart_or_note(embedder: &mut PlotlyEmbedder, div_id: &str, figure: Option<Value>) -> String {
    match figure {
        Some(fig) => embedder.embed(div_id, &fig),
        None => {
            warn!("chart '{}' omitted: no data points", div_id);
            "<div class='small'>No data available.</div>".to_string()
        }
    }
}

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; color: #222; }
h1, h2, h3 { color: #0b5cab; }
.container { max-width: 1100px; margin: 0 auto; padding: 20px; }
.summary { display: grid; grid-template-columns: repeat(2, 1fr); gap: 16px; }
.card { background: #f8fafc; border: 1px solid #e2e8f0; border-radius: 8px; padding: 16px; }
.caption { font-weight: 600; margin: 8px 0; }
.small { color: #475569; font-size: 0.9em; }
.note { background: #fff7ed; border: 1px solid #fed7aa; padding: 8px; border-radius: 6px; }
.table-wrap { overflow-x: auto; margin: 12px 0; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #e2e8f0; padding: 8px 10px; text-align: left; }
th { background: #eff6ff; }
.brand-bar { display: flex; justify-content: space-between; align-items: center; gap: 16px; margin-bottom: 8px; }
.brand-bar img { height: 96px; object-fit: contain; }
</style>"#;

/// Assemble the full dashboard document.
pub fn render_dashboard(view: &DashboardView<'_>, config: &Config) -> String {
    let mut charts = PlotlyEmbedder::default();
    let presented_line = chart_or_note(
        &mut charts,
        "overpayment_presented",
        timeline_figure(
            "Total Overpayment over Time for Presented Hits",
            view.presented_timeline,
        ),
    );
    let all_line = chart_or_note(
        &mut charts,
        "overpayment_all",
        timeline_figure(
            "Total Overpayment over Time for All Identified Hits",
            view.all_timeline,
        ),
    );
    let paid_hist = chart_or_note(
        &mut charts,
        "paid_hist",
        overpayment_histogram(view.distributions),
    );
    let claims_hist = chart_or_note(
        &mut charts,
        "claims_hist",
        claim_hits_histogram(view.distributions),
    );
    debug!("rendered {} concept rows", view.all.len());

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset='utf-8'>
<title>Executive Dashboard &mdash; FWA Deliverables</title>
{style}
</head>
<body>
<div class='container'>
  <div class='brand-bar'>
    <img src='{visuals}/Machinify_Logo.jpg' alt='Machinify Logo'>
    <img src='{visuals}/BCBS_NorthCarolina_Logo.png' alt='BCBS North Carolina Logo'>
  </div>
  <h1>FWA Deliverables &mdash; Executive Tracking Dashboard</h1>
  <p class='small'>This dashboard summarizes delivered FWA concepts, key statistics, and provider-level distributions.</p>
  <p class='small'>As of {as_of}</p>

  <h2>Aggregate Summary</h2>
  {summary}

  <h2>FWA Concepts Presented</h2>
  <div class='table-wrap'>
{catalogue}
  </div>

  <h2>Concept-Level Statistics &mdash; Presented Hits</h2>
  <div class='table-wrap'>
{presented_stats}
  </div>

  <h2>Concept-Level Statistics &mdash; All Identified Hits</h2>
  <div class='table-wrap'>
{all_stats}
  </div>

  <h2>Live Tracker &mdash; Estimated Identified Overpayment Over Time</h2>
  <h3>Delivery Cadence</h3>
  {cadence}
  <h3>Presented Hits</h3>
  {presented_line}
  <h3>All Identified Hits</h3>
  {all_line}

  <h2>Provider-Level Distributions Across All Identified Hits</h2>
  <p class='small'>Distribution of Total Overpayment and Number of Claim Hits per provider, shown by concept.</p>
  {paid_hist}
  {claims_hist}

  <h2>Data Quality</h2>
  {reconciliation}
</div>
</body>
</html>
"#,
        style = STYLE,
        visuals = crate::config::VISUALS_DIR,
        as_of = view.as_of.format("%B %d, %Y"),
        summary = render_summary_cards(view.headline),
        catalogue = render_concept_catalogue(view.presented, config),
        presented_stats = render_concept_stats(view.presented),
        all_stats = render_concept_stats(view.all),
        cadence = render_cadence(view.cadence),
        presented_line = presented_line,
        all_line = all_line,
        paid_hist = paid_hist,
        claims_hist = claims_hist,
        reconciliation = render_reconciliation(view.findings),
    )
}
