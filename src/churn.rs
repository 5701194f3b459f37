//! Churn label derivation.
//!
//! A customer is churned when their last purchase is strictly older than the
//! configured churn window. The boundary matters: a customer whose last
//! purchase is exactly `churn_window_days` old is still considered active.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::data::Transaction;
use crate::features::CustomerFeatures;

/// Per-customer churn flag plus the recency evidence behind it.
#[derive(Debug, Clone)]
pub struct ChurnLabel {
    pub customer_id: String,
    pub last_purchase: DateTime<Utc>,
    pub days_since_last_purchase: i64,
    pub churned: bool,
}

/// A feature row joined with its churn label, ready for model training.
#[derive(Debug, Clone)]
pub struct LabeledCustomer {
    pub features: CustomerFeatures,
    pub churned: bool,
}

/// Compute per-customer days-since-last-purchase and threshold it.
///
/// Recency is computed here independently of the RFM aggregation so the
/// label never depends on feature-table plumbing; both paths measure whole
/// days back from the same reference date and must agree.
pub fn label_churn(
    transactions: &[Transaction],
    reference: DateTime<Utc>,
    churn_window_days: i64,
) -> Vec<ChurnLabel> {
    let mut last_purchases: HashMap<String, DateTime<Utc>> = HashMap::new();
    for tx in transactions {
        last_purchases
            .entry(tx.customer_id.clone())
            .and_modify(|last| *last = (*last).max(tx.invoice_time))
            .or_insert(tx.invoice_time);
    }

    let mut labels: Vec<ChurnLabel> = last_purchases
        .into_iter()
        .map(|(customer_id, last_purchase)| {
            let days_since_last_purchase = (reference - last_purchase).num_days();
            ChurnLabel {
                customer_id,
                last_purchase,
                days_since_last_purchase,
                churned: days_since_last_purchase > churn_window_days,
            }
        })
        .collect();
    labels.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    labels
}

/// Join feature rows with their churn labels.
///
/// # Errors
/// Fails if any feature row has no label. Both tables are derived from the
/// same transaction set, so a gap means the caller mixed up runs.
pub fn attach_labels(
    features: Vec<CustomerFeatures>,
    labels: &[ChurnLabel],
) -> crate::Result<Vec<LabeledCustomer>> {
    let by_customer: HashMap<&str, bool> = labels
        .iter()
        .map(|label| (label.customer_id.as_str(), label.churned))
        .collect();

    features
        .into_iter()
        .map(|row| {
            let churned = by_customer.get(row.customer_id.as_str()).copied().ok_or_else(|| {
                anyhow::anyhow!("no churn label for customer {}", row.customer_id)
            })?;
            Ok(LabeledCustomer { features: row, churned })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_rfm_features;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn tx(customer: &str, invoice: &str, time: &str) -> Transaction {
        Transaction {
            customer_id: customer.to_string(),
            invoice_id: invoice.to_string(),
            invoice_time: ts(time),
            quantity: 1.0,
            unit_price: 10.0,
            line_total: 10.0,
        }
    }

    #[test]
    fn churn_boundary_is_strict() {
        let reference = ts("2011-12-09T00:00:00Z");
        let transactions = vec![
            // Exactly 90 days old: not churned.
            tx("boundary", "1", "2011-09-10T00:00:00Z"),
            // 91 days old: churned.
            tx("gone", "2", "2011-09-09T00:00:00Z"),
            tx("active", "3", "2011-12-08T00:00:00Z"),
        ];
        let labels = label_churn(&transactions, reference, 90);

        let by_id: HashMap<&str, &ChurnLabel> =
            labels.iter().map(|label| (label.customer_id.as_str(), label)).collect();
        let boundary = by_id["boundary"];
        assert_eq!(boundary.days_since_last_purchase, 90);
        assert!(!boundary.churned);
        assert!(by_id["gone"].churned);
        assert!(!by_id["active"].churned);
    }

    #[test]
    fn label_uses_latest_purchase() {
        let reference = ts("2011-12-09T00:00:00Z");
        let transactions = vec![
            tx("a", "1", "2011-01-01T00:00:00Z"),
            tx("a", "2", "2011-12-01T00:00:00Z"),
        ];
        let labels = label_churn(&transactions, reference, 90);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].last_purchase, ts("2011-12-01T00:00:00Z"));
        assert!(!labels[0].churned);
    }

    #[test]
    fn label_recency_agrees_with_rfm_recency() {
        let reference = ts("2011-12-09T12:00:00Z");
        let transactions = vec![
            tx("a", "1", "2011-11-30T08:15:00Z"),
            tx("b", "2", "2011-07-04T16:00:00Z"),
            tx("a", "3", "2011-06-01T10:00:00Z"),
        ];
        let labels = label_churn(&transactions, reference, 90);
        let rfm = build_rfm_features(&transactions, reference);
        for (label, row) in labels.iter().zip(rfm.iter()) {
            assert_eq!(label.customer_id, row.customer_id);
            assert_eq!(label.days_since_last_purchase, row.recency_days);
        }
    }

    #[test]
    fn attach_labels_requires_full_coverage() {
        let reference = ts("2011-12-09T00:00:00Z");
        let transactions = vec![tx("a", "1", "2011-12-01T00:00:00Z")];
        let labels = label_churn(&transactions, reference, 90);

        let short = crate::features::build_window_features(&transactions, reference, 30);
        let mid = crate::features::build_window_features(&transactions, reference, 60);
        let long = crate::features::build_window_features(&transactions, reference, 90);
        let features = crate::features::merge_customer_features(
            build_rfm_features(&transactions, reference),
            &short,
            &mid,
            &long,
        );

        let labeled = attach_labels(features.clone(), &labels).unwrap();
        assert_eq!(labeled.len(), 1);
        assert!(!labeled[0].churned);

        let err = attach_labels(features, &[]).unwrap_err();
        assert!(err.to_string().contains("customer a"));
    }
}
