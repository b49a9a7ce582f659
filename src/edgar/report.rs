use std::fmt;
use std::future::Future;
use std::path::Path;

use anyhow::{anyhow, Result};
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::client::EdgarClient;
use crate::error::{ClassificationError, FetchError};

/// The three statement kinds extracted per filing. Manifest keys use the
/// short forms BS / IS / CFS.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
pub enum StatementKind {
    #[serde(rename = "BS")]
    BalanceSheet,
    #[serde(rename = "IS")]
    IncomeStatement,
    #[serde(rename = "CFS")]
    CashFlow,
}

impl StatementKind {
    pub fn key(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "BS",
            StatementKind::IncomeStatement => "IS",
            StatementKind::CashFlow => "CFS",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::CashFlow => "cash_flow",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One sub-document of a filing's report manifest (FilingSummary.xml).
/// Names may be empty or non-informative; classification tolerates both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDescriptor {
    pub position: usize,
    pub short_name: String,
    pub long_name: String,
    pub html_file: String,
    pub report_type: String,
}

/// Parses FilingSummary.xml into report descriptors, in filing order.
/// Reports without an HTML file are skipped.
pub fn parse_filing_summary(xml: &str) -> Result<Vec<ReportDescriptor>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| anyhow!("unparseable FilingSummary.xml: {}", e))?;

    let mut reports = Vec::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("Report")) {
        let text = |tag: &str| {
            node.children()
                .find(|c| c.has_tag_name(tag))
                .and_then(|c| c.text())
                .unwrap_or("")
                .trim()
                .to_string()
        };
        let html_file = text("HtmlFileName");
        if html_file.is_empty() {
            continue;
        }
        // Keep the bare file name; some summaries carry relative paths.
        let base_name = Path::new(&html_file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let html_file = base_name.unwrap_or(html_file);
        reports.push(ReportDescriptor {
            position: reports.len(),
            short_name: text("ShortName"),
            long_name: text("LongName"),
            html_file,
            report_type: text("ReportType"),
        });
    }
    Ok(reports)
}

/// Classification policy for one statement kind: keyword hits on the
/// combined short+long name score +10 (`must`) and -8 (`avoid`). These
/// lists are tunable data calibrated against real filings, not logic.
pub struct KindRules {
    pub kind: StatementKind,
    pub must: &'static [&'static str],
    pub avoid: &'static [&'static str],
}

pub static KIND_RULES: &[KindRules] = &[
    KindRules {
        kind: StatementKind::BalanceSheet,
        must: &[
            "balance sheet",
            "financial position",
            "statement of financial position",
        ],
        avoid: &[
            "parenthetical",
            "changes in",
            "equity",
            "cash flows",
            "operations",
            "income",
            "earnings",
        ],
    },
    KindRules {
        kind: StatementKind::IncomeStatement,
        must: &[
            "statement of operations",
            "statements of operations",
            "income statement",
            "statements of income",
            "statement of earnings",
            "statements of earnings",
            "results of operations",
        ],
        avoid: &[
            "comprehensive",
            "parenthetical",
            "balance sheet",
            "cash flows",
            "equity",
        ],
    },
    KindRules {
        kind: StatementKind::CashFlow,
        must: &["cash flows", "cash flow"],
        avoid: &[
            "parenthetical",
            "balance sheet",
            "operations",
            "income",
            "earnings",
            "equity",
        ],
    },
];

fn rules_for(kind: StatementKind) -> &'static KindRules {
    KIND_RULES
        .iter()
        .find(|r| r.kind == kind)
        .expect("every kind has a rule entry")
}

fn score(rules: &KindRules, report: &ReportDescriptor) -> i32 {
    let text = format!("{} {}", report.short_name, report.long_name).to_lowercase();
    let mut s = 0;
    for m in rules.must {
        if text.contains(m) {
            s += 10;
        }
    }
    for a in rules.avoid {
        if text.contains(a) {
            s -= 8;
        }
    }
    let file = report.html_file.to_lowercase();
    if file.ends_with(".htm") || file.ends_with(".html") {
        s += 1;
    }
    let rt = report.report_type.to_lowercase();
    if rt == "sheet" || rt == "statement" {
        s += 1;
    }
    s
}

/// Picks the report for one kind. The highest positive score wins; ties
/// keep the earliest report (statements appear early in filing-generated
/// report sets). Failure is scoped to this kind only.
pub fn classify_report(
    reports: &[ReportDescriptor],
    kind: StatementKind,
) -> Result<&ReportDescriptor, ClassificationError> {
    let rules = rules_for(kind);
    let mut best: Option<(&ReportDescriptor, i32)> = None;
    for report in reports {
        let s = score(rules, report);
        // Strictly-greater keeps the lowest sequence position on ties.
        if best.map_or(true, |(_, bs)| s > bs) {
            best = Some((report, s));
        }
    }
    match best {
        Some((report, s)) if s > 0 => {
            debug!("{}: picked {:?} (score {})", kind, report.short_name, s);
            Ok(report)
        }
        _ => Err(ClassificationError::no_match(kind)),
    }
}

/// Direct fetch candidates, tried in order before the index.json fallback.
const DIRECT_SUMMARY_NAMES: [&str; 2] = ["FilingSummary.xml", "filingsummary.xml"];

/// Some servers answer a missing file with a 200 HTML error page; only a
/// body carrying the FilingSummary root element counts as a hit.
fn looks_like_summary(body: &str) -> bool {
    body.contains("<FilingSummary")
}

/// Picks the summary file name out of an index.json directory listing,
/// matching case-insensitively and preserving the listed spelling.
fn summary_name_from_index(index: &serde_json::Value) -> Option<String> {
    index["directory"]["item"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item["name"].as_str())
        .find(|name| name.eq_ignore_ascii_case("filingsummary.xml"))
        .map(|name| name.to_string())
}

/// Discovery chain for FilingSummary.xml: direct fetch under both casings,
/// then the index.json directory listing as a fallback. Returns the document
/// text and the URL it was found at. The fetch is injected so the chain is
/// testable against canned responses.
async fn locate_filing_summary<F, Fut>(base_url: &str, mut fetch: F) -> Result<(String, String)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(StatusCode, Vec<u8>), FetchError>>,
{
    for name in DIRECT_SUMMARY_NAMES {
        let url = format!("{}/{}", base_url, name);
        let (status, body) = fetch(url.clone()).await?;
        if status.is_success() {
            let text = String::from_utf8_lossy(&body).into_owned();
            if looks_like_summary(&text) {
                return Ok((text, url));
            }
        }
    }

    let index_url = format!("{}/index.json", base_url);
    let (status, body) = fetch(index_url).await.map_err(|e| {
        anyhow!("FilingSummary.xml not found (direct) and index.json unavailable: {}", e)
    })?;
    if !status.is_success() {
        return Err(anyhow!(
            "FilingSummary.xml not found (direct) and index.json unavailable: HTTP {}",
            status
        ));
    }
    let index: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| anyhow!("invalid index.json: {}", e))?;
    let name = summary_name_from_index(&index)
        .ok_or_else(|| anyhow!("FilingSummary.xml not present in index.json listing"))?;

    let url = format!("{}/{}", base_url, name);
    let (status, body) = fetch(url.clone()).await?;
    if !status.is_success() {
        return Err(anyhow!("HTTP {} fetching {}", status, url));
    }
    Ok((String::from_utf8_lossy(&body).into_owned(), url))
}

/// Locates and fetches FilingSummary.xml for a filing.
pub async fn fetch_filing_summary(
    client: &EdgarClient,
    base_url: &str,
) -> Result<(String, String)> {
    locate_filing_summary(base_url, |url| async move {
        client.fetch_status(&url).await
    })
    .await
}
