//! Transaction loading and cleaning.
//!
//! Reads the raw retail export (Kaggle "Online Retail" layout), validates
//! the header, and turns the surviving rows into typed [`Transaction`]
//! records. Cleaning mirrors what the downstream stages assume: rows with a
//! missing customer id or an unparsable date are dropped, non-positive
//! quantities and unit prices (returns and cancellations) are dropped, and a
//! line total is derived for everything that remains.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Columns the loader refuses to run without.
pub const REQUIRED_COLUMNS: [&str; 5] =
    ["InvoiceNo", "InvoiceDate", "CustomerID", "Quantity", "UnitPrice"];

/// One cleaned order line.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub customer_id: String,
    pub invoice_id: String,
    pub invoice_time: DateTime<Utc>,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// Raw CSV row. Numeric fields are read as text so a malformed value drops
/// the row during cleaning instead of aborting the whole run.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "InvoiceNo")]
    invoice_no: String,
    #[serde(rename = "InvoiceDate")]
    invoice_date: String,
    #[serde(rename = "CustomerID")]
    customer_id: Option<String>,
    #[serde(rename = "Quantity")]
    quantity: String,
    #[serde(rename = "UnitPrice")]
    unit_price: String,
}

/// Load and clean transactions from a CSV file.
///
/// The file is decoded as UTF-8 with a Latin-1 fallback, which is the
/// encoding this dataset usually ships in.
///
/// # Errors
/// Fails if the file cannot be read, a required column is missing, or no
/// rows survive cleaning.
pub fn load_transactions(path: &Path) -> crate::Result<Vec<Transaction>> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    parse_transactions(&decode(bytes))
}

/// Parse and clean transactions from CSV text. See [`load_transactions`].
pub fn parse_transactions(text: &str) -> crate::Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    validate_columns(&headers)?;

    let mut transactions = Vec::new();
    let mut dropped = 0usize;
    for row in reader.deserialize() {
        let raw: RawRow = row.context("malformed CSV record")?;
        match clean_row(raw) {
            Some(tx) => transactions.push(tx),
            None => dropped += 1,
        }
    }

    if transactions.is_empty() {
        anyhow::bail!("no valid transactions after cleaning ({dropped} rows dropped)");
    }
    log::debug!(
        "loaded {} transactions, dropped {} invalid rows",
        transactions.len(),
        dropped
    );
    Ok(transactions)
}

fn validate_columns(headers: &csv::StringRecord) -> crate::Result<()> {
    let available: Vec<&str> = headers.iter().collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !available.contains(required))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("missing required columns: {missing:?}; available columns: {available:?}");
    }
    Ok(())
}

fn clean_row(raw: RawRow) -> Option<Transaction> {
    let customer_id = normalize_customer_id(raw.customer_id.as_deref()?)?;
    let invoice_time = parse_invoice_date(&raw.invoice_date)?;
    let quantity: f64 = raw.quantity.parse().ok()?;
    let unit_price: f64 = raw.unit_price.parse().ok()?;
    if quantity <= 0.0 || unit_price <= 0.0 {
        return None;
    }
    Some(Transaction {
        customer_id,
        invoice_id: raw.invoice_no,
        invoice_time,
        quantity,
        unit_price,
        line_total: quantity * unit_price,
    })
}

/// Customer ids arrive as floats in this export (e.g. "17850.0"). Numeric
/// forms are normalized to a bare integer string so ids are stable no matter
/// how the upstream tool serialized them.
fn normalize_customer_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(format!("{}", value.trunc() as i64)),
        _ => Some(trimmed.to_string()),
    }
}

/// Parse the invoice timestamp. Accepts RFC 3339 plus the naive forms this
/// dataset is distributed in; naive timestamps are taken as UTC.
fn parse_invoice_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}

/// Decode file bytes as UTF-8, falling back to Latin-1 (every byte maps to
/// the code point of the same value). A leading BOM is stripped.
fn decode(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    };
    text.strip_prefix('\u{feff}').map(str::to_owned).unwrap_or(text)
}
