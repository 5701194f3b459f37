//! Customer-level feature engineering.
//!
//! Everything here is anchored to a single reference date (the latest
//! transaction in the run) so that recency and the trailing windows are
//! consistent with each other. Aggregation happens in three passes: overall
//! RFM statistics per customer, per-window order/spend totals, and a merge
//! that fills missing window activity with zero and derives trend ratios.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::data::Transaction;
use crate::stats;

/// Overall recency/frequency/monetary statistics for one customer.
#[derive(Debug, Clone)]
pub struct CustomerRfm {
    pub customer_id: String,
    /// Whole days between the customer's last purchase and the reference
    /// date. Never negative.
    pub recency_days: i64,
    /// Number of distinct invoices.
    pub frequency_orders: u64,
    pub monetary_total: f64,
    pub monetary_mean: f64,
    pub monetary_median: f64,
}

/// Order/spend totals for one customer inside one trailing window.
#[derive(Debug, Clone)]
pub struct WindowFeatures {
    pub customer_id: String,
    pub orders: u64,
    pub spend: f64,
}

/// The merged per-customer feature row: RFM plus the three trailing windows
/// plus short-vs-long trend ratios.
#[derive(Debug, Clone)]
pub struct CustomerFeatures {
    pub customer_id: String,
    pub recency_days: i64,
    pub frequency_orders: u64,
    pub monetary_total: f64,
    pub monetary_mean: f64,
    pub monetary_median: f64,
    pub orders_short: u64,
    pub spend_short: f64,
    pub orders_mid: u64,
    pub spend_mid: f64,
    pub orders_long: u64,
    pub spend_long: f64,
    /// Laplace-smoothed `(orders_short + 1) / (orders_long + 1)`. Always
    /// finite and positive; exactly 1.0 when both windows are empty.
    pub trend_orders: f64,
    /// Laplace-smoothed `(spend_short + 1) / (spend_long + 1)`.
    pub trend_spend: f64,
}

/// The anchor timestamp for the run: the latest transaction time.
///
/// # Errors
/// Fails on an empty transaction set, which has no meaningful "now".
pub fn reference_date(transactions: &[Transaction]) -> crate::Result<DateTime<Utc>> {
    transactions
        .iter()
        .map(|tx| tx.invoice_time)
        .max()
        .ok_or_else(|| anyhow::anyhow!("cannot derive a reference date from zero transactions"))
}

/// Group transactions by customer and compute overall RFM statistics.
///
/// Output is sorted by customer id so downstream tables are deterministic,
/// though nothing downstream depends on the order.
pub fn build_rfm_features(
    transactions: &[Transaction],
    reference: DateTime<Utc>,
) -> Vec<CustomerRfm> {
    struct Group {
        last_purchase: DateTime<Utc>,
        invoices: HashSet<String>,
        line_totals: Vec<f64>,
    }

    let mut groups: HashMap<String, Group> = HashMap::new();
    for tx in transactions {
        let group = groups.entry(tx.customer_id.clone()).or_insert_with(|| Group {
            last_purchase: tx.invoice_time,
            invoices: HashSet::new(),
            line_totals: Vec::new(),
        });
        group.last_purchase = group.last_purchase.max(tx.invoice_time);
        group.invoices.insert(tx.invoice_id.clone());
        group.line_totals.push(tx.line_total);
    }

    let mut rows: Vec<CustomerRfm> = groups
        .into_iter()
        .map(|(customer_id, group)| CustomerRfm {
            customer_id,
            recency_days: (reference - group.last_purchase).num_days(),
            frequency_orders: group.invoices.len() as u64,
            monetary_total: group.line_totals.iter().sum(),
            monetary_mean: stats::mean(&group.line_totals),
            monetary_median: stats::median(&group.line_totals),
        })
        .collect();
    rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    rows
}

/// Per-customer order/spend totals over the trailing window of
/// `window_days` days.
///
/// The window is half-open: a transaction exactly `window_days` before the
/// reference date falls outside it, while one at the reference instant
/// itself is included. Customers with no activity in the window do not
/// appear in the result at all; the merge step fills them with zero.
pub fn build_window_features(
    transactions: &[Transaction],
    reference: DateTime<Utc>,
    window_days: i64,
) -> Vec<WindowFeatures> {
    let window_start = reference - Duration::days(window_days);

    struct Group {
        invoices: HashSet<String>,
        spend: f64,
    }

    let mut groups: HashMap<String, Group> = HashMap::new();
    for tx in transactions {
        if tx.invoice_time <= window_start || tx.invoice_time > reference {
            continue;
        }
        let group = groups
            .entry(tx.customer_id.clone())
            .or_insert_with(|| Group { invoices: HashSet::new(), spend: 0.0 });
        group.invoices.insert(tx.invoice_id.clone());
        group.spend += tx.line_total;
    }

    let mut rows: Vec<WindowFeatures> = groups
        .into_iter()
        .map(|(customer_id, group)| WindowFeatures {
            customer_id,
            orders: group.invoices.len() as u64,
            spend: group.spend,
        })
        .collect();
    rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    rows
}

/// Left-join the RFM table with the three window tables.
///
/// RFM drives the join and defines the customer universe. A customer absent
/// from a window table gets zero orders and zero spend for that window; the
/// trend ratios are derived afterwards so they are always defined.
pub fn merge_customer_features(
    rfm: Vec<CustomerRfm>,
    short: &[WindowFeatures],
    mid: &[WindowFeatures],
    long: &[WindowFeatures],
) -> Vec<CustomerFeatures> {
    fn index(rows: &[WindowFeatures]) -> HashMap<&str, (u64, f64)> {
        rows.iter()
            .map(|row| (row.customer_id.as_str(), (row.orders, row.spend)))
            .collect()
    }
    let short = index(short);
    let mid = index(mid);
    let long = index(long);

    rfm.into_iter()
        .map(|row| {
            let (orders_short, spend_short) =
                short.get(row.customer_id.as_str()).copied().unwrap_or((0, 0.0));
            let (orders_mid, spend_mid) =
                mid.get(row.customer_id.as_str()).copied().unwrap_or((0, 0.0));
            let (orders_long, spend_long) =
                long.get(row.customer_id.as_str()).copied().unwrap_or((0, 0.0));
            CustomerFeatures {
                customer_id: row.customer_id,
                recency_days: row.recency_days,
                frequency_orders: row.frequency_orders,
                monetary_total: row.monetary_total,
                monetary_mean: row.monetary_mean,
                monetary_median: row.monetary_median,
                orders_short,
                spend_short,
                orders_mid,
                spend_mid,
                orders_long,
                spend_long,
                trend_orders: (orders_short as f64 + 1.0) / (orders_long as f64 + 1.0),
                trend_spend: (spend_short + 1.0) / (spend_long + 1.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn tx(customer: &str, invoice: &str, time: &str, total: f64) -> Transaction {
        Transaction {
            customer_id: customer.to_string(),
            invoice_id: invoice.to_string(),
            invoice_time: ts(time),
            quantity: 1.0,
            unit_price: total,
            line_total: total,
        }
    }

    #[test]
    fn reference_date_is_latest_transaction() {
        let transactions = vec![
            tx("a", "1", "2011-01-05T10:00:00Z", 10.0),
            tx("b", "2", "2011-03-20T09:30:00Z", 20.0),
            tx("a", "3", "2011-02-11T15:45:00Z", 5.0),
        ];
        assert_eq!(reference_date(&transactions).unwrap(), ts("2011-03-20T09:30:00Z"));
    }

    #[test]
    fn reference_date_empty_is_an_error() {
        assert!(reference_date(&[]).is_err());
    }

    #[test]
    fn rfm_counts_distinct_invoices_and_sums_spend() {
        let reference = ts("2011-12-09T12:00:00Z");
        let transactions = vec![
            // Two lines on the same invoice count as one order.
            tx("a", "inv-1", "2011-12-01T12:00:00Z", 10.0),
            tx("a", "inv-1", "2011-12-01T12:00:00Z", 20.0),
            tx("a", "inv-2", "2011-12-09T12:00:00Z", 60.0),
            tx("b", "inv-3", "2011-10-01T08:00:00Z", 7.5),
        ];
        let rows = build_rfm_features(&transactions, reference);
        assert_eq!(rows.len(), 2);

        let a = &rows[0];
        assert_eq!(a.customer_id, "a");
        assert_eq!(a.recency_days, 0);
        assert_eq!(a.frequency_orders, 2);
        assert!((a.monetary_total - 90.0).abs() < 1e-9);
        assert!((a.monetary_mean - 30.0).abs() < 1e-9);
        assert!((a.monetary_median - 20.0).abs() < 1e-9);

        let b = &rows[1];
        assert_eq!(b.recency_days, 69);
        assert_eq!(b.frequency_orders, 1);
    }

    #[test]
    fn window_filter_is_half_open() {
        let reference = ts("2011-12-09T12:00:00Z");
        let transactions = vec![
            // Exactly 30 days before the reference: excluded.
            tx("a", "inv-1", "2011-11-09T12:00:00Z", 10.0),
            // Just inside the window.
            tx("a", "inv-2", "2011-11-09T12:00:01Z", 20.0),
            // At the reference instant: included.
            tx("a", "inv-3", "2011-12-09T12:00:00Z", 30.0),
            // After the reference (cannot happen with a derived reference,
            // but the filter must still exclude it).
            tx("a", "inv-4", "2011-12-09T12:00:01Z", 40.0),
        ];
        let rows = build_window_features(&transactions, reference, 30);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].orders, 2);
        assert!((rows[0].spend - 50.0).abs() < 1e-9);
    }

    #[test]
    fn window_skips_inactive_customers() {
        let reference = ts("2011-12-09T12:00:00Z");
        let transactions = vec![
            tx("active", "inv-1", "2011-12-01T00:00:00Z", 10.0),
            tx("dormant", "inv-2", "2011-06-01T00:00:00Z", 99.0),
        ];
        let rows = build_window_features(&transactions, reference, 30);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_id, "active");
    }

    #[test]
    fn merge_fills_missing_windows_with_zero() {
        let reference = ts("2011-12-09T12:00:00Z");
        let transactions = vec![
            tx("fresh", "inv-1", "2011-12-05T00:00:00Z", 40.0),
            tx("stale", "inv-2", "2011-01-15T00:00:00Z", 80.0),
        ];
        let rfm = build_rfm_features(&transactions, reference);
        let short = build_window_features(&transactions, reference, 30);
        let mid = build_window_features(&transactions, reference, 60);
        let long = build_window_features(&transactions, reference, 90);
        let merged = merge_customer_features(rfm, &short, &mid, &long);
        assert_eq!(merged.len(), 2);

        let stale = merged.iter().find(|row| row.customer_id == "stale").unwrap();
        assert_eq!(stale.orders_short, 0);
        assert_eq!(stale.orders_mid, 0);
        assert_eq!(stale.orders_long, 0);
        assert_eq!(stale.spend_long, 0.0);
        // No activity in either trend window: the smoothed ratio is 1.
        assert!((stale.trend_orders - 1.0).abs() < 1e-9);
        assert!((stale.trend_spend - 1.0).abs() < 1e-9);
        // RFM columns survive the join untouched.
        assert!((stale.monetary_total - 80.0).abs() < 1e-9);
    }

    #[test]
    fn trend_ratios_are_smoothed() {
        let reference = ts("2011-12-09T12:00:00Z");
        let mut transactions = Vec::new();
        // Two orders in the last 30 days, five in the last 90.
        for (i, time) in ["2011-12-01T00:00:00Z", "2011-11-20T00:00:00Z"].iter().enumerate() {
            transactions.push(tx("a", &format!("new-{i}"), time, 10.0));
        }
        for (i, time) in
            ["2011-10-20T00:00:00Z", "2011-10-01T00:00:00Z", "2011-09-20T00:00:00Z"]
                .iter()
                .enumerate()
        {
            transactions.push(tx("a", &format!("old-{i}"), time, 10.0));
        }
        let rfm = build_rfm_features(&transactions, reference);
        let short = build_window_features(&transactions, reference, 30);
        let mid = build_window_features(&transactions, reference, 60);
        let long = build_window_features(&transactions, reference, 90);
        let merged = merge_customer_features(rfm, &short, &mid, &long);

        let a = &merged[0];
        assert_eq!(a.orders_short, 2);
        assert_eq!(a.orders_long, 5);
        assert!((a.trend_orders - 0.5).abs() < 1e-9);
        assert!((a.trend_spend - (21.0 / 51.0)).abs() < 1e-9);
    }
}
