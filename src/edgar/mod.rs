pub mod client;
pub mod index;
pub mod report;
pub mod table;

use anyhow::{anyhow, Result};

pub const SEC_SUBMISSIONS_URL: &str = "https://data.sec.gov/submissions";
pub const SEC_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

/// Strip non-digits and zero-pad to the 10-digit form used by the
/// submissions endpoint.
pub fn normalize_cik(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(anyhow!("CIK must be numeric: {:?}", raw));
    }
    Ok(format!("{:0>10}", digits))
}

/// Archive paths use the un-padded integer form of the CIK.
pub fn cik_unpadded(cik10: &str) -> String {
    let trimmed = cik10.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn accession_nodash(accession: &str) -> String {
    accession.replace('-', "")
}

pub fn submissions_url(cik10: &str) -> String {
    format!("{}/CIK{}.json", SEC_SUBMISSIONS_URL, cik10)
}

pub fn submissions_page_url(name: &str) -> String {
    format!("{}/{}", SEC_SUBMISSIONS_URL, name)
}

/// Base directory URL of one filing's generated documents.
pub fn archive_base_url(cik10: &str, accession: &str) -> String {
    format!(
        "{}/{}/{}",
        SEC_ARCHIVES_URL,
        cik_unpadded(cik10),
        accession_nodash(accession)
    )
}
