use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use strum::IntoEnumIterator;

use crate::core::config::ExtractConfig;
use crate::edgar::client::{EdgarClient, RateLimiter};
use crate::edgar::index::{resolve_filings, FilingCandidate};
use crate::edgar::report::{
    classify_report, fetch_filing_summary, parse_filing_summary, ReportDescriptor, StatementKind,
};
use crate::edgar::table::parse_statement;
use crate::output::manifest::{
    assemble, write_atomic, write_manifest, write_statement_csv, write_statement_json,
    EntityManifest, FilingManifestEntry, PickedReport, ReportMeta, StatementOutputs,
    StatementTable,
};
use crate::output::paths::resolve_under_root;

/// Runs the whole extraction pipeline for one entity. Filings are processed
/// sequentially; the shared `limiter` spaces every outbound call, so
/// multiple entities may run in parallel against the same handle.
///
/// Per-(filing, kind) failures are recorded in the manifest, never fatal.
/// Path-escape integrity errors abort the run before anything is written
/// for the offending filing. The manifest itself is written once, after
/// every filing has reached a terminal state.
pub async fn extract_entity(
    config: &ExtractConfig,
    limiter: Arc<RateLimiter>,
) -> Result<EntityManifest> {
    config.validate()?;
    let cik10 = crate::edgar::normalize_cik(&config.cik)?;
    let client = EdgarClient::new(config, limiter)?;

    let entity_dir = resolve_under_root(&config.out_root, &[&cik10])?;

    let candidates = resolve_filings(
        &client,
        &cik10,
        config.lookback_years,
        config.limit,
        config.include_amendments,
    )
    .await?;
    if candidates.is_empty() {
        info!("{}: no matching 10-K filings in the requested window", cik10);
    }

    let mut entries = Vec::with_capacity(candidates.len());
    for filing in &candidates {
        let entry = process_filing(config, &client, &cik10, &entity_dir, filing).await?;
        entries.push(entry);
    }

    let manifest = assemble(&cik10, entries);
    write_manifest(&entity_dir, &manifest)?;
    info!(
        "{}: wrote manifest with {} filings to {:?}",
        cik10,
        manifest.filings.len(),
        entity_dir
    );
    Ok(manifest)
}

async fn process_filing(
    config: &ExtractConfig,
    client: &EdgarClient,
    cik10: &str,
    entity_dir: &Path,
    filing: &FilingCandidate,
) -> Result<FilingManifestEntry> {
    let base_url = crate::edgar::archive_base_url(cik10, &filing.accession);
    let filing_dir = resolve_under_root(entity_dir, &[&filing.accession])?;

    let mut entry = FilingManifestEntry::new(
        filing.accession.clone(),
        filing.form.clone(),
        filing.filing_date,
        filing.report_date,
        base_url.clone(),
    );

    let (summary_xml, summary_url) = match fetch_filing_summary(client, &base_url).await {
        Ok(found) => found,
        Err(e) => {
            warn!("{}: {}", filing.accession, e);
            entry.errors.push(format!("FilingSummary: {}", e));
            return Ok(entry);
        }
    };
    write_atomic(&filing_dir.join("FilingSummary.xml"), summary_xml.as_bytes())?;
    entry.filing_summary_url = Some(summary_url);

    let reports = match parse_filing_summary(&summary_xml) {
        Ok(reports) => reports,
        Err(e) => {
            entry.errors.push(format!("FilingSummary: {}", e));
            return Ok(entry);
        }
    };

    for kind in StatementKind::iter() {
        let report = match classify_report(&reports, kind) {
            Ok(report) => report,
            Err(e) => {
                entry.errors.push(e.to_string());
                continue;
            }
        };
        if let Err(e) =
            process_statement(config, client, cik10, &filing_dir, &base_url, filing, kind, report, &mut entry)
                .await?
        {
            entry.errors.push(e);
        }
    }

    Ok(entry)
}

/// Fetches, parses, and writes one classified statement. The outer `Result`
/// carries fatal errors (filesystem, integrity); the inner one is the
/// per-kind error recorded in the manifest entry.
#[allow(clippy::too_many_arguments)]
async fn process_statement(
    config: &ExtractConfig,
    client: &EdgarClient,
    cik10: &str,
    filing_dir: &Path,
    base_url: &str,
    filing: &FilingCandidate,
    kind: StatementKind,
    report: &ReportDescriptor,
    entry: &mut FilingManifestEntry,
) -> Result<Result<(), String>> {
    let report_url = format!("{}/{}", base_url, report.html_file);
    let html = match client.fetch_text(&report_url).await {
        Ok(html) => html,
        Err(e) => return Ok(Err(format!("{}: {}", kind, e))),
    };

    // Keep the raw report next to the parsed output.
    let raw_path = resolve_under_root(filing_dir, &[&report.html_file])?;
    write_atomic(&raw_path, html.as_bytes())?;

    let parsed = match parse_statement(&html, kind, config.keep_abstract_rows) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Ok(Err(format!("{}: {} ({})", kind, e, report.html_file)));
        }
    };

    let table = StatementTable {
        cik: cik10.to_string(),
        accession_number: filing.accession.clone(),
        statement: kind,
        source_url: report_url.clone(),
        report: ReportMeta {
            short: report.short_name.clone(),
            long: report.long_name.clone(),
            html: report.html_file.clone(),
            report_type: report.report_type.clone(),
        },
        indent_mode: parsed.indent_mode,
        indent: parsed.indent,
        rows: parsed.rows,
    };

    let json_path = filing_dir.join(format!("{}.json", kind.file_stem()));
    let csv_path = filing_dir.join(format!("{}.csv", kind.file_stem()));
    write_statement_json(&json_path, &table)?;
    write_statement_csv(&csv_path, &table.rows)?;

    entry.reports_picked.insert(
        kind,
        PickedReport {
            short: report.short_name.clone(),
            long: report.long_name.clone(),
            file: report.html_file.clone(),
            report_type: report.report_type.clone(),
            url: report_url,
        },
    );
    entry.outputs.insert(
        kind,
        StatementOutputs {
            csv: csv_path.to_string_lossy().into_owned(),
            json: json_path.to_string_lossy().into_owned(),
        },
    );

    Ok(Ok(()))
}
