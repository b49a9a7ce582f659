use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::report::StatementKind;
use crate::error::ParseError;

// Accept: 34940, 34,940, $34,940, $ 34,940, (4,774), ($ 4,774), -123
static NUMISH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(?\s*-?\s*\$?\s*\d[\d,]*(\.\d+)?\s*\)?\s*$").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static HEADER_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(months|years)\s+ended\b|\bas\s+of\b|\bended\b").unwrap());

// CSS indentation signals
static CSS_RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\.([A-Za-z0-9_-]+)\s*\{[^}]*?(padding-left|margin-left|text-indent)\s*:\s*([0-9.]+)\s*(px|pt|em|rem)\s*;?[^}]*\}",
    )
    .unwrap()
});
static STYLE_INDENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(padding-left|margin-left|text-indent)\s*:\s*([0-9.]+)\s*(px|pt|em|rem)")
        .unwrap()
});

// Class names that encode a level directly (pl1, indent-2, lvl3, level_4)
static CLASS_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:pl|padl|indent|lvl|level)[-_]?(\d+)$").unwrap());

// XBRL scaffolding rows
static SCAFFOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(?:abstract|line items|table|axis|member)\]\s*$").unwrap());

// Cash-flow sectioning for inferred hierarchy
static MAJOR_CFS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(operating|investing|financing)\s+activities:\s*$").unwrap());
static SUB_ADJUST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^adjustments\b").unwrap());
static SUB_CHANGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^changes in\b").unwrap());

const PX_PER_LEVEL: f64 = 12.0;

/// Whether indent depths were read out of the document markup or inferred
/// from structural cues. Table-wide: one explicit signal anywhere makes the
/// whole table `FromHtml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentMode {
    FromHtml,
    Inferred,
}

/// Rows and per-row indent depths for one classified report. The first row
/// is the header and always sits at depth 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub rows: Vec<Vec<String>>,
    pub indent: Vec<u32>,
    pub indent_mode: IndentMode,
}

#[derive(Debug, Clone)]
struct RawRow {
    cells: Vec<String>,
    indent_px: i32,
    abstract_concept: bool,
}

fn to_px(value: f64, unit: &str) -> f64 {
    match unit.to_ascii_lowercase().as_str() {
        "px" => value,
        "pt" => value * (96.0 / 72.0),
        "em" | "rem" => value * 16.0,
        _ => value,
    }
}

/// Collects per-class indent widths from `<style>` blocks, keeping the
/// largest rule per class.
fn build_css_indent_map(doc: &Html) -> HashMap<String, f64> {
    let style_sel = Selector::parse("style").unwrap();
    let mut map: HashMap<String, f64> = HashMap::new();
    for style in doc.select(&style_sel) {
        let css: String = style.text().collect();
        for caps in CSS_RULE_RE.captures_iter(&css) {
            let class = caps[1].to_string();
            if let Ok(num) = caps[3].parse::<f64>() {
                let px = to_px(num, &caps[4]);
                let entry = map.entry(class).or_insert(px);
                if px > *entry {
                    *entry = px;
                }
            }
        }
    }
    map
}

fn is_numericish(s: &str) -> bool {
    let s = s.replace('\u{a0}', " ");
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    if s == "\u{2014}" || s == "-" || s == "\u{2013}" {
        return true;
    }
    NUMISH_RE.is_match(s)
}

fn values_blank(cells: &[String]) -> bool {
    cells.iter().skip(1).all(|c| c.trim().is_empty())
}

fn row_has_header_hint(cells: &[String]) -> bool {
    let blob = cells.join(" ").replace('\u{a0}', " ");
    let blob = blob.trim();
    if blob.is_empty() {
        return false;
    }
    YEAR_RE.is_match(blob) || HEADER_WORD_RE.is_match(blob)
}

/// Display text of a cell: entity-decoded, NBSP-folded, whitespace-collapsed.
fn cell_text(cell: ElementRef) -> String {
    let joined = cell.text().collect::<Vec<_>>().join(" ").replace('\u{a0}', " ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Largest indent signal on the label cell: inline styles on the cell and
/// its descendants, CSS class rules, level-encoding class names, and
/// leading NBSP runs.
fn extract_indent_px(cell: ElementRef, css_map: &HashMap<String, f64>) -> i32 {
    let mut best = 0.0f64;

    for node in cell.descendants() {
        if let Some(el) = ElementRef::wrap(node) {
            if let Some(style) = el.value().attr("style") {
                for caps in STYLE_INDENT_RE.captures_iter(style) {
                    if let Ok(num) = caps[2].parse::<f64>() {
                        best = best.max(to_px(num, &caps[3]));
                    }
                }
            }
        }
    }

    for class in cell.value().classes() {
        if let Some(px) = css_map.get(class) {
            best = best.max(*px);
        }
        if let Some(caps) = CLASS_LEVEL_RE.captures(class) {
            if let Ok(level) = caps[1].parse::<f64>() {
                best = best.max(level * PX_PER_LEVEL);
            }
        }
    }

    let raw: String = cell.text().collect();
    let mut nbsp = 0usize;
    for ch in raw.chars() {
        match ch {
            '\u{a0}' => nbsp += 1,
            ' ' => {}
            _ => break,
        }
    }
    if nbsp > 0 {
        best = best.max(nbsp as f64 * 4.0);
    }

    best.round() as i32
}

/// iXBRL tagging marks scaffolding rows with concept names ending in
/// "Abstract".
fn has_abstract_concept(cell: ElementRef) -> bool {
    for node in cell.descendants() {
        if let Some(el) = ElementRef::wrap(node) {
            let name = el.value().name();
            if name.ends_with("nonfraction") || name.ends_with("nonnumeric") {
                if let Some(concept) = el.value().attr("name") {
                    if concept.to_ascii_lowercase().ends_with("abstract") {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn attr_usize(cell: ElementRef, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
}

fn fill_from_span(
    span_map: &mut HashMap<usize, (usize, String)>,
    row: &mut Vec<String>,
    col: &mut usize,
) {
    while let Some((remaining, text)) = span_map.get(&*col).cloned() {
        row.push(text.clone());
        if remaining <= 1 {
            span_map.remove(col);
        } else {
            span_map.insert(*col, (remaining - 1, text));
        }
        *col += 1;
    }
}

/// Short rows are padded with empty cells to the table width; columns are
/// never dropped.
fn pad_rows(rows: &mut [RawRow]) {
    let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    for row in rows {
        while row.cells.len() < width {
            row.cells.push(String::new());
        }
    }
}

/// Flattens one `<table>` to text rows, expanding colspan/rowspan and
/// skipping all-blank rows.
fn extract_table_rows(table: ElementRef, css_map: &HashMap<String, f64>) -> Vec<RawRow> {
    let tr_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    let mut out: Vec<RawRow> = Vec::new();
    // col index -> (remaining rows, text)
    let mut span_map: HashMap<usize, (usize, String)> = HashMap::new();

    for tr in table.select(&tr_sel) {
        let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
        if cells.is_empty() && span_map.is_empty() {
            continue;
        }

        let mut row: Vec<String> = Vec::new();
        let mut col = 0usize;
        fill_from_span(&mut span_map, &mut row, &mut col);

        let indent_px = cells
            .first()
            .map(|c| extract_indent_px(*c, css_map))
            .unwrap_or(0);
        let abstract_concept = cells.first().map(|c| has_abstract_concept(*c)).unwrap_or(false);

        for cell in &cells {
            fill_from_span(&mut span_map, &mut row, &mut col);
            let text = cell_text(*cell);
            let colspan = attr_usize(*cell, "colspan").max(1);
            let rowspan = attr_usize(*cell, "rowspan").max(1);
            for _ in 0..colspan {
                row.push(text.clone());
                if rowspan > 1 {
                    span_map.insert(col, (rowspan - 1, text.clone()));
                }
                col += 1;
            }
        }
        fill_from_span(&mut span_map, &mut row, &mut col);

        if row.iter().any(|c| !c.trim().is_empty()) {
            out.push(RawRow {
                cells: row,
                indent_px,
                abstract_concept,
            });
        }
    }

    pad_rows(&mut out);
    out
}

struct Profile {
    cols: usize,
    numeric: usize,
    years: usize,
    nonempty: usize,
}

fn profile(rows: &[RawRow]) -> Profile {
    let cols = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    let mut numeric = 0;
    let mut years = 0;
    let mut nonempty = 0;
    for row in rows {
        for cell in &row.cells {
            let t = cell.replace('\u{a0}', " ");
            let t = t.trim();
            if t.is_empty() {
                continue;
            }
            nonempty += 1;
            if is_numericish(t) {
                numeric += 1;
            }
            if YEAR_RE.is_match(t) {
                years += 1;
            }
        }
    }
    Profile {
        cols,
        numeric,
        years,
        nonempty,
    }
}

fn norm_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| c.replace('\u{a0}', " ").trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Picks the primary data table by score and appends document-order
/// successors that look like continuations of it (statements split across
/// page-break tables), dropping repeated header rows.
fn select_and_stitch(doc: &Html, css_map: &HashMap<String, f64>) -> Vec<RawRow> {
    let table_sel = Selector::parse("table").unwrap();

    struct Candidate {
        score: i64,
        index: usize,
        rows: Vec<RawRow>,
        cols: usize,
        numeric: usize,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (index, table) in doc.select(&table_sel).enumerate() {
        let rows = extract_table_rows(table, css_map);
        if rows.is_empty() {
            continue;
        }
        let p = profile(&rows);
        let mut score = p.numeric as i64 * 3 + p.years as i64 * 2 + rows.len().min(220) as i64;
        if p.cols < 2 || p.nonempty < 12 {
            score -= 500;
        }
        candidates.push(Candidate {
            score,
            index,
            rows,
            cols: p.cols,
            numeric: p.numeric,
        });
    }
    if candidates.is_empty() {
        return Vec::new();
    }

    // Highest score wins; ties go to the earlier table in the document.
    let best_pos = candidates
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| (c.score, std::cmp::Reverse(c.index)))
        .map(|(i, _)| i)
        .unwrap();
    let base_cols = candidates[best_pos].cols;
    let base_numeric = candidates[best_pos].numeric;

    let looks_like_continuation = |rows: &[RawRow]| {
        let p = profile(rows);
        p.cols == base_cols && p.nonempty >= 8 && p.numeric >= std::cmp::max(6, base_numeric * 12 / 100)
    };

    let mut combined = candidates[best_pos].rows.clone();
    let head_sig = norm_row(&combined[0].cells);

    let end = std::cmp::min(best_pos + 4, candidates.len());
    for candidate in &candidates[best_pos + 1..end] {
        if !looks_like_continuation(&candidate.rows) {
            break;
        }
        let mut drop = 0;
        for (t, row) in candidate.rows.iter().take(3).enumerate() {
            if norm_row(&row.cells) == head_sig {
                drop = t + 1;
            }
        }
        combined.extend(candidate.rows.iter().skip(drop).cloned());
    }

    merge_multiline_headers(combined)
}

/// Collapses a leading block of header rows (year columns split across
/// lines) into a single header row.
fn merge_multiline_headers(mut rows: Vec<RawRow>) -> Vec<RawRow> {
    if rows.is_empty() {
        return rows;
    }
    pad_rows(&mut rows);
    let width = rows[0].cells.len();

    let mut block = 0;
    for row in rows.iter().take(10) {
        let vals: Vec<&String> = row.cells[1..].iter().filter(|v| !v.trim().is_empty()).collect();
        if vals.is_empty() || vals.iter().any(|v| is_numericish(v)) || !row_has_header_hint(&row.cells) {
            break;
        }
        block += 1;
    }
    if block < 2 {
        return rows;
    }

    let mut cols = vec![String::new(); width.saturating_sub(1)];
    for row in &rows[..block] {
        for (j, col) in cols.iter_mut().enumerate() {
            let part = row.cells[j + 1].trim();
            if !part.is_empty() {
                if col.is_empty() {
                    *col = part.to_string();
                } else {
                    col.push(' ');
                    col.push_str(part);
                }
            }
        }
    }

    let mut merged_cells = vec![rows[0].cells[0].clone()];
    merged_cells.extend(cols);
    let merged = RawRow {
        cells: merged_cells,
        indent_px: rows[0].indent_px,
        abstract_concept: rows[0].abstract_concept,
    };

    let mut out = vec![merged];
    out.extend(rows.into_iter().skip(block));
    out
}

/// Normalizes raw levels: minimum observed depth becomes 0, the header is
/// pinned to 0, and no row may nest more than one level below its
/// predecessor.
fn finalize_depths(mut levels: Vec<i64>) -> Vec<u32> {
    if levels.is_empty() {
        return Vec::new();
    }
    let min = *levels.iter().min().unwrap();
    for level in levels.iter_mut() {
        *level -= min;
    }
    let mut out = Vec::with_capacity(levels.len());
    let mut prev: i64 = 0;
    for (i, level) in levels.into_iter().enumerate() {
        let v = if i == 0 { 0 } else { level.clamp(0, prev + 1) };
        out.push(v as u32);
        prev = v;
    }
    out
}

/// Depth inference for tables with no markup indentation at all. Value rows
/// read as children of the nearest section header; cash-flow statements get
/// the conventional activities / adjustments / changes-in nesting.
fn infer_depths(rows: &[RawRow], kind: StatementKind) -> Vec<i64> {
    let mut levels = vec![0i64; rows.len()];
    let mut in_major = false;
    let mut in_adjust = false;
    let mut in_changes = false;

    for (i, row) in rows.iter().enumerate() {
        if i == 0 {
            continue;
        }
        let label = row.cells.first().map(|s| s.trim()).unwrap_or("");
        let blank_vals = values_blank(&row.cells);

        if !blank_vals {
            levels[i] = if kind == StatementKind::CashFlow {
                if in_changes {
                    3
                } else if in_adjust {
                    2
                } else if in_major {
                    1
                } else {
                    1
                }
            } else {
                1
            };
            continue;
        }

        if kind == StatementKind::CashFlow {
            if MAJOR_CFS_RE.is_match(label) {
                in_major = true;
                in_adjust = false;
                in_changes = false;
                levels[i] = 0;
            } else if SUB_ADJUST_RE.is_match(label) {
                in_adjust = true;
                in_changes = false;
                levels[i] = 1;
            } else if SUB_CHANGES_RE.is_match(label) {
                // usually nested under adjustments in cash flows
                in_changes = true;
                levels[i] = if in_adjust { 2 } else { 1 };
            } else if in_changes {
                levels[i] = 2;
            } else if in_adjust {
                levels[i] = 1;
            } else {
                levels[i] = 0;
            }
        } else {
            // BS / IS: section headers ("Current assets:") sit at 0
            levels[i] = 0;
        }
    }

    levels
}

fn should_drop(row: &RawRow, keep_abstract_rows: bool) -> bool {
    let label = row.cells.first().map(|s| s.trim()).unwrap_or("");
    if label.is_empty() {
        return true;
    }
    if keep_abstract_rows {
        return false;
    }
    let is_abstract = SCAFFOLD_RE.is_match(label) || row.abstract_concept;
    is_abstract && values_blank(&row.cells)
}

/// Parses one classified report document into rows plus indent depths.
/// Depths are computed on the full row set before abstract-row filtering,
/// so dropping a row never renumbers its neighbors.
pub fn parse_statement(
    html: &str,
    kind: StatementKind,
    keep_abstract_rows: bool,
) -> Result<ParsedTable, ParseError> {
    let doc = Html::parse_document(html);
    let css_map = build_css_indent_map(&doc);
    let rows = select_and_stitch(&doc, &css_map);
    if rows.len() < 2 {
        return Err(ParseError::EmptyTable);
    }
    let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    if width < 2 {
        return Err(ParseError::MalformedTable(
            "statement table has no value columns".to_string(),
        ));
    }

    let (levels, indent_mode) = if rows.iter().any(|r| r.indent_px > 0) {
        let levels = rows
            .iter()
            .map(|r| (r.indent_px as f64 / PX_PER_LEVEL).round() as i64)
            .collect();
        (levels, IndentMode::FromHtml)
    } else {
        (infer_depths(&rows, kind), IndentMode::Inferred)
    };
    let depths = finalize_depths(levels);

    let mut out_rows = Vec::new();
    let mut out_depths = Vec::new();
    for (i, (row, depth)) in rows.iter().zip(depths.iter()).enumerate() {
        // The header survives filtering unconditionally.
        if i > 0 && should_drop(row, keep_abstract_rows) {
            continue;
        }
        out_rows.push(row.cells.clone());
        out_depths.push(*depth);
    }
    if out_rows.len() < 2 {
        return Err(ParseError::EmptyTable);
    }

    Ok(ParsedTable {
        rows: out_rows,
        indent: out_depths,
        indent_mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str], indent_px: i32) -> RawRow {
        RawRow {
            cells: cells.iter().map(|s| s.to_string()).collect(),
            indent_px,
            abstract_concept: false,
        }
    }

    const BALANCE_SHEET_HTML: &str = r#"<html><head><style>
      .lab { font-weight: normal; }
    </style></head><body>
    <table>
      <tr><td>Consolidated Balance Sheets</td><td>Dec. 31, 2023</td><td>Dec. 31, 2022</td></tr>
      <tr><td style="padding-left: 12px">Cash and cash equivalents</td><td>1,000</td><td>900</td></tr>
      <tr><td style="padding-left: 12px">Accounts receivable, net</td><td>500</td><td>400</td></tr>
      <tr><td style="padding-left: 24px">Marketable Securities [Abstract]</td><td></td><td></td></tr>
      <tr><td style="padding-left: 12px">Inventories</td><td>300</td><td>200</td></tr>
      <tr><td>Total assets</td><td>1,800</td><td>1,500</td></tr>
    </table>
    </body></html>"#;

    #[test]
    fn test_from_html_depths_and_abstract_filtering() {
        let table =
            parse_statement(BALANCE_SHEET_HTML, StatementKind::BalanceSheet, false).unwrap();
        assert_eq!(table.indent_mode, IndentMode::FromHtml);
        // Source depths [0,1,1,2,1,0]; the abstract row at index 3 is
        // dropped without renumbering the survivors.
        assert_eq!(table.indent, vec![0, 1, 1, 1, 0]);
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.rows[0][0], "Consolidated Balance Sheets");
        assert!(!table.rows.iter().any(|r| r[0].contains("[Abstract]")));
    }

    #[test]
    fn test_keep_abstract_rows() {
        let table =
            parse_statement(BALANCE_SHEET_HTML, StatementKind::BalanceSheet, true).unwrap();
        assert_eq!(table.indent, vec![0, 1, 1, 2, 1, 0]);
        assert_eq!(table.rows.len(), 6);
        assert_eq!(table.rows[3][0], "Marketable Securities [Abstract]");
    }

    #[test]
    fn test_rows_and_indent_stay_parallel() {
        for keep in [false, true] {
            let table =
                parse_statement(BALANCE_SHEET_HTML, StatementKind::BalanceSheet, keep).unwrap();
            assert_eq!(table.rows.len(), table.indent.len());
            assert_eq!(table.indent[0], 0);
            for i in 1..table.indent.len() {
                assert!(table.indent[i] <= table.indent[i - 1] + 1);
            }
        }
    }

    #[test]
    fn test_idempotent_parse() {
        let a = parse_statement(BALANCE_SHEET_HTML, StatementKind::BalanceSheet, false).unwrap();
        let b = parse_statement(BALANCE_SHEET_HTML, StatementKind::BalanceSheet, false).unwrap();
        assert_eq!(a, b);
    }

    const CASH_FLOW_HTML: &str = r#"<html><body><table>
      <tr><td>Consolidated Statements of Cash Flows</td><td>2023</td><td>2022</td></tr>
      <tr><td>Operating activities:</td><td></td><td></td></tr>
      <tr><td>Net income</td><td>100</td><td>90</td></tr>
      <tr><td>Adjustments to reconcile net income:</td><td></td><td></td></tr>
      <tr><td>Depreciation and amortization</td><td>50</td><td>45</td></tr>
      <tr><td>Changes in operating assets and liabilities:</td><td></td><td></td></tr>
      <tr><td>Accounts receivable</td><td>(10)</td><td>5</td></tr>
      <tr><td>Inventories</td><td>(5)</td><td>3</td></tr>
    </table></body></html>"#;

    #[test]
    fn test_inferred_cash_flow_depths() {
        let table = parse_statement(CASH_FLOW_HTML, StatementKind::CashFlow, false).unwrap();
        assert_eq!(table.indent_mode, IndentMode::Inferred);
        assert_eq!(table.indent, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_inferred_balance_sheet_headers_at_zero() {
        let html = r#"<html><body><table>
          <tr><td>Balance Sheet</td><td>Dec. 31, 2023</td><td>Dec. 31, 2022</td></tr>
          <tr><td>Current assets:</td><td></td><td></td></tr>
          <tr><td>Cash</td><td>1,000</td><td>900</td></tr>
          <tr><td>Receivables</td><td>500</td><td>400</td></tr>
          <tr><td>Total current assets</td><td>1,500</td><td>1,300</td></tr>
        </table></body></html>"#;
        let table = parse_statement(html, StatementKind::BalanceSheet, false).unwrap();
        assert_eq!(table.indent_mode, IndentMode::Inferred);
        assert_eq!(table.indent, vec![0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_empty_table_error() {
        let html = "<html><body><p>No tables here.</p></body></html>";
        assert!(matches!(
            parse_statement(html, StatementKind::BalanceSheet, false),
            Err(ParseError::EmptyTable)
        ));
    }

    #[test]
    fn test_header_only_is_empty() {
        let html = r#"<html><body><table>
          <tr><td>Balance Sheet</td><td>2023</td><td>2022</td></tr>
        </table></body></html>"#;
        assert!(matches!(
            parse_statement(html, StatementKind::BalanceSheet, false),
            Err(ParseError::EmptyTable)
        ));
    }

    #[test]
    fn test_label_only_table_is_malformed() {
        // A lone label column cannot be repaired by padding.
        let html = r#"<html><body><table>
          <tr><td>Consolidated Balance Sheets</td></tr>
          <tr><td>Cash and cash equivalents</td></tr>
          <tr><td>Total assets</td></tr>
        </table></body></html>"#;
        assert!(matches!(
            parse_statement(html, StatementKind::BalanceSheet, false),
            Err(ParseError::MalformedTable(_))
        ));
    }

    #[test]
    fn test_short_rows_padded_not_dropped() {
        let html = r#"<html><body><table>
          <tr><td>Income Statement</td><td>2023</td><td>2022</td></tr>
          <tr><td>Revenue</td><td>1,000</td><td>900</td></tr>
          <tr><td>Cost of sales</td><td>400</td></tr>
          <tr><td>Gross profit</td><td>600</td><td>500</td></tr>
          <tr><td>Operating expenses</td><td>200</td><td>180</td></tr>
        </table></body></html>"#;
        let table = parse_statement(html, StatementKind::IncomeStatement, false).unwrap();
        for row in &table.rows {
            assert_eq!(row.len(), 3);
        }
        assert_eq!(table.rows[2], vec!["Cost of sales", "400", ""]);
    }

    #[test]
    fn test_multiline_header_merge() {
        let rows = vec![
            raw(&["", "Years ended", "Years ended"], 0),
            raw(&["", "Dec. 31, 2023", "Dec. 31, 2022"], 0),
            raw(&["Revenue", "1,000", "900"], 0),
        ];
        let merged = merge_multiline_headers(rows);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].cells[1], "Years ended Dec. 31, 2023");
        assert_eq!(merged[1].cells[0], "Revenue");
    }

    #[test]
    fn test_single_header_row_untouched() {
        let rows = vec![
            raw(&["", "Dec. 31, 2023", "Dec. 31, 2022"], 0),
            raw(&["Revenue", "1,000", "900"], 0),
        ];
        assert_eq!(merge_multiline_headers(rows).len(), 2);
    }

    #[test]
    fn test_finalize_depths_clamps_jumps() {
        // A jump of +3 over the previous row is clamped to +1.
        assert_eq!(finalize_depths(vec![0, 1, 4, 2, 0]), vec![0, 1, 2, 2, 0]);
        // Minimum depth is normalized to zero.
        assert_eq!(finalize_depths(vec![2, 3, 3, 2]), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_class_level_indent() {
        let html = r#"<html><body><table>
          <tr><td>Balance Sheet</td><td>Dec. 31, 2023</td><td>Dec. 31, 2022</td></tr>
          <tr><td class="pl2">Cash</td><td>1,000</td><td>900</td></tr>
          <tr><td class="indent-1">Receivables</td><td>500</td><td>400</td></tr>
          <tr><td>Total assets</td><td>1,500</td><td>1,300</td></tr>
        </table></body></html>"#;
        let table = parse_statement(html, StatementKind::BalanceSheet, false).unwrap();
        assert_eq!(table.indent_mode, IndentMode::FromHtml);
        // pl2 -> level 2 clamped to header+1, indent-1 -> level 1.
        assert_eq!(table.indent, vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_css_class_rule_indent() {
        let html = r#"<html><head><style>
          .deep { padding-left: 24px; }
        </style></head><body><table>
          <tr><td>Balance Sheet</td><td>Dec. 31, 2023</td><td>Dec. 31, 2022</td></tr>
          <tr><td style="padding-left:12px">Current assets:</td><td>10</td><td>20</td></tr>
          <tr><td class="deep">Cash</td><td>1,000</td><td>900</td></tr>
          <tr><td>Total</td><td>1,010</td><td>920</td></tr>
        </table></body></html>"#;
        let table = parse_statement(html, StatementKind::BalanceSheet, false).unwrap();
        assert_eq!(table.indent_mode, IndentMode::FromHtml);
        assert_eq!(table.indent, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_colspan_expansion() {
        let html = r#"<html><body><table>
          <tr><td>Income Statement</td><td colspan="2">Years ended Dec. 31, 2023</td></tr>
          <tr><td>Revenue</td><td>1,000</td><td>900</td></tr>
          <tr><td>Cost of sales</td><td>400</td><td>380</td></tr>
          <tr><td>Gross profit</td><td>600</td><td>520</td></tr>
        </table></body></html>"#;
        let table = parse_statement(html, StatementKind::IncomeStatement, false).unwrap();
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][1], table.rows[0][2]);
    }

    #[test]
    fn test_values_blank() {
        assert!(values_blank(&["Header".to_string(), " ".to_string(), String::new()]));
        assert!(!values_blank(&["Cash".to_string(), "100".to_string(), String::new()]));
    }

    #[test]
    fn test_is_numericish() {
        for s in ["34940", "34,940", "$34,940", "$ 34,940", "(4,774)", "($ 4,774)", "-123", "\u{2014}"] {
            assert!(is_numericish(s), "{}", s);
        }
        for s in ["", "Total assets", "Dec. 31, 2023"] {
            assert!(!is_numericish(s), "{}", s);
        }
    }
}
