use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use serde::Deserialize;

use super::client::EdgarClient;
use super::{submissions_page_url, submissions_url};

const DAYS_PER_YEAR: f64 = 365.25;

/// One filing selected for extraction. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingCandidate {
    pub accession: String,
    pub form: String,
    pub filing_date: NaiveDate,
    pub report_date: Option<NaiveDate>,
    pub is_amendment: bool,
}

/// The submissions endpoint stores filings as parallel columns; entries
/// beyond `recent` live in continuation files.
#[derive(Debug, Deserialize)]
struct Submissions {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: FilingColumns,
    #[serde(default)]
    files: Vec<ContinuationFile>,
}

#[derive(Debug, Deserialize)]
struct ContinuationFile {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct FilingColumns {
    #[serde(rename = "accessionNumber", default)]
    accession_number: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(rename = "filingDate", default)]
    filing_date: Vec<String>,
    #[serde(rename = "reportDate", default)]
    report_date: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FilingRow {
    pub form: String,
    pub filing_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
    pub accession: String,
}

fn parse_ymd(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn flatten_columns(cols: &FilingColumns, out: &mut Vec<FilingRow>) {
    let n = cols
        .accession_number
        .len()
        .min(cols.form.len())
        .min(cols.filing_date.len())
        .min(cols.report_date.len());
    for i in 0..n {
        out.push(FilingRow {
            form: cols.form[i].trim().to_string(),
            filing_date: parse_ymd(&cols.filing_date[i]),
            report_date: parse_ymd(&cols.report_date[i]),
            accession: cols.accession_number[i].trim().to_string(),
        });
    }
}

/// Retrieves the entity's full filing history, following continuation pages.
pub async fn gather_filing_rows(client: &EdgarClient, cik10: &str) -> Result<Vec<FilingRow>> {
    let url = submissions_url(cik10);
    info!("fetching filing history from {}", url);
    let base: Submissions = client
        .fetch_json(&url)
        .await
        .with_context(|| format!("filing history for CIK {}", cik10))?;

    let mut rows = Vec::new();
    flatten_columns(&base.filings.recent, &mut rows);

    for page in &base.filings.files {
        if page.name.is_empty() {
            continue;
        }
        let page_url = submissions_page_url(&page.name);
        let extra: FilingColumns = client
            .fetch_json(&page_url)
            .await
            .with_context(|| format!("filing history page {}", page.name))?;
        flatten_columns(&extra, &mut rows);
    }

    Ok(rows)
}

/// Filters the history down to the candidate set: 10-K (and optionally
/// 10-K/A), within `lookback_years` of the most recent qualifying filing,
/// most recent first, truncated to `limit`. An empty result is a valid
/// outcome, not an error.
pub fn select_candidates(
    rows: &[FilingRow],
    lookback_years: u32,
    limit: usize,
    include_amendments: bool,
) -> Vec<FilingCandidate> {
    let mut filings: Vec<FilingCandidate> = rows
        .iter()
        .filter_map(|r| {
            let is_amendment = r.form == "10-K/A";
            if r.form != "10-K" && !(include_amendments && is_amendment) {
                return None;
            }
            let filing_date = r.filing_date?;
            if r.accession.is_empty() {
                return None;
            }
            Some(FilingCandidate {
                accession: r.accession.clone(),
                form: r.form.clone(),
                filing_date,
                report_date: r.report_date,
                is_amendment,
            })
        })
        .collect();

    // Lookback window anchored at the most recent qualifying filing.
    let anchor_of = |f: &FilingCandidate| f.report_date.unwrap_or(f.filing_date);
    let anchor = filings.iter().map(&anchor_of).max();
    if let Some(anchor) = anchor {
        let cutoff = anchor - chrono::Duration::days((lookback_years as f64 * DAYS_PER_YEAR) as i64);
        filings.retain(|f| anchor_of(f) >= cutoff);
    }

    // Report date descending; shared report dates prefer the non-amendment
    // filing, then the later filing date.
    filings.sort_by(|a, b| {
        b.report_date
            .cmp(&a.report_date)
            .then_with(|| a.is_amendment.cmp(&b.is_amendment))
            .then_with(|| b.filing_date.cmp(&a.filing_date))
    });

    let mut seen = std::collections::HashSet::new();
    filings.retain(|f| seen.insert(f.accession.clone()));
    filings.truncate(limit);
    filings
}

pub async fn resolve_filings(
    client: &EdgarClient,
    cik10: &str,
    lookback_years: u32,
    limit: usize,
    include_amendments: bool,
) -> Result<Vec<FilingCandidate>> {
    let rows = gather_filing_rows(client, cik10).await?;
    let candidates = select_candidates(&rows, lookback_years, limit, include_amendments);
    info!(
        "{}: {} filings in history, {} candidates selected",
        cik10,
        rows.len(),
        candidates.len()
    );
    Ok(candidates)
}
