use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::edgar::report::StatementKind;
use crate::edgar::table::IndentMode;

/// Report metadata carried inside a serialized statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub short: String,
    pub long: String,
    pub html: String,
    #[serde(rename = "type")]
    pub report_type: String,
}

/// The parsed output for one (filing, kind) pair. Field names are the wire
/// contract toward the viewer and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTable {
    pub cik: String,
    #[serde(rename = "accessionNumber")]
    pub accession_number: String,
    pub statement: StatementKind,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    pub report: ReportMeta,
    pub indent_mode: IndentMode,
    pub indent: Vec<u32>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedReport {
    pub short: String,
    pub long: String,
    pub file: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementOutputs {
    pub csv: String,
    pub json: String,
}

/// One filing's outcome. A filing with zero successes still produces an
/// entry; its errors explain every absent statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingManifestEntry {
    #[serde(rename = "accessionNumber")]
    pub accession_number: String,
    pub form: String,
    #[serde(rename = "filingDate")]
    pub filing_date: NaiveDate,
    #[serde(rename = "reportDate")]
    pub report_date: Option<NaiveDate>,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "filingSummaryUrl", skip_serializing_if = "Option::is_none")]
    pub filing_summary_url: Option<String>,
    #[serde(rename = "reportsPicked")]
    pub reports_picked: BTreeMap<StatementKind, PickedReport>,
    pub outputs: BTreeMap<StatementKind, StatementOutputs>,
    pub errors: Vec<String>,
}

impl FilingManifestEntry {
    pub fn new(
        accession_number: String,
        form: String,
        filing_date: NaiveDate,
        report_date: Option<NaiveDate>,
        base_url: String,
    ) -> Self {
        FilingManifestEntry {
            accession_number,
            form,
            filing_date,
            report_date,
            base_url,
            filing_summary_url: None,
            reports_picked: BTreeMap::new(),
            outputs: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Top-level per-entity index. Overwritten whole on each run, never
/// appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityManifest {
    pub cik: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub filings: Vec<FilingManifestEntry>,
}

/// Pure aggregation; zero filings is a valid manifest.
pub fn assemble(cik: &str, filings: Vec<FilingManifestEntry>) -> EntityManifest {
    EntityManifest {
        cik: cik.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        filings,
    }
}

/// All-or-nothing write: content lands in a sibling temp file first and is
/// renamed over the target, so a partial file is never observable.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, bytes).with_context(|| format!("writing {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {:?}", path))?;
    Ok(())
}

pub fn write_statement_json(path: &Path, table: &StatementTable) -> Result<()> {
    let json = serde_json::to_vec_pretty(table)?;
    write_atomic(path, &json)
}

pub fn write_statement_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing csv: {}", e))?;
    write_atomic(path, &bytes)
}

pub fn write_manifest(entity_dir: &Path, manifest: &EntityManifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest)?;
    write_atomic(&entity_dir.join("manifest.json"), &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> StatementTable {
        StatementTable {
            cik: "0000034940".to_string(),
            accession_number: "0000034940-24-000011".to_string(),
            statement: StatementKind::BalanceSheet,
            source_url: "https://www.sec.gov/Archives/edgar/data/34940/000003494024000011/R2.htm"
                .to_string(),
            report: ReportMeta {
                short: "Consolidated Balance Sheets".to_string(),
                long: "0000002 - Statement - Consolidated Balance Sheets".to_string(),
                html: "R2.htm".to_string(),
                report_type: "Statement".to_string(),
            },
            indent_mode: IndentMode::FromHtml,
            indent: vec![0, 1, 1, 0],
            rows: vec![
                vec!["Balance Sheet".into(), "2023".into(), "2022".into()],
                vec!["Cash".into(), "1,000".into(), "900".into()],
                vec!["Receivables".into(), "500".into(), "400".into()],
                vec!["Total assets".into(), "1,500".into(), "1,300".into()],
            ],
        }
    }

    #[test]
    fn test_statement_wire_field_names() {
        let value = serde_json::to_value(sample_table()).unwrap();
        let obj = value.as_object().unwrap();
        for key in ["cik", "accessionNumber", "statement", "sourceUrl", "report", "indent_mode", "indent", "rows"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(value["indent_mode"], "from_html");
        assert_eq!(value["statement"], "BS");
        assert_eq!(value["report"]["type"], "Statement");
    }

    #[test]
    fn test_statement_round_trip() {
        let table = sample_table();
        let json = serde_json::to_string(&table).unwrap();
        let back: StatementTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_manifest_round_trip_and_keys() {
        let mut entry = FilingManifestEntry::new(
            "0000034940-24-000011".to_string(),
            "10-K".to_string(),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31),
            "https://www.sec.gov/Archives/edgar/data/34940/000003494024000011".to_string(),
        );
        entry.errors.push("IS: no matching report".to_string());
        entry.outputs.insert(
            StatementKind::BalanceSheet,
            StatementOutputs {
                csv: "balance_sheet.csv".to_string(),
                json: "balance_sheet.json".to_string(),
            },
        );
        let manifest = assemble("0000034940", vec![entry]);

        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value["generatedAt"].as_str().unwrap().ends_with('Z'));
        let filing = &value["filings"][0];
        for key in ["accessionNumber", "form", "filingDate", "reportDate", "baseUrl", "reportsPicked", "outputs", "errors"] {
            assert!(filing.as_object().unwrap().contains_key(key), "missing {}", key);
        }
        assert!(filing["outputs"].as_object().unwrap().contains_key("BS"));

        let back: EntityManifest =
            serde_json::from_value(value).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("statement.json");
        write_atomic(&target, b"{}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");
        let names: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_csv_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance_sheet.csv");
        write_statement_csv(&path, &sample_table().rows).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Balance Sheet,2023,2022\n"));
        assert!(content.contains("\"1,000\""));
    }
}
