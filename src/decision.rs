//! Value/risk segmentation and retention decisioning.
//!
//! Turns the feature table plus per-customer churn scores into a ranked
//! action table. Value segments use tertiles recomputed from the current
//! run's value distribution; risk segments use fixed probability bins. The
//! action rules are ordered and the first match wins.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::features::CustomerFeatures;
use crate::model::ScoredCustomer;
use crate::stats;

/// Tertile boundaries for value segmentation, recomputed per run.
pub const VALUE_LOW_QUANTILE: f64 = 0.33;
pub const VALUE_HIGH_QUANTILE: f64 = 0.66;

/// Fixed churn-probability bin edges for risk segmentation.
const RISK_LOW_MAX: f64 = 0.33;
const RISK_MID_MAX: f64 = 0.66;

/// Coarse 3-bucket classification used for both value and risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Low,
    Mid,
    High,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Low => "Low",
            Segment::Mid => "Mid",
            Segment::High => "High",
        }
    }
}

/// One customer in the final retention table.
#[derive(Debug, Clone)]
pub struct PriorityRow {
    pub customer_id: String,
    pub churn_score: f64,
    pub value_proxy: f64,
    pub value_segment: Segment,
    pub risk_segment: Segment,
    pub priority_score: f64,
    pub recommended_action: &'static str,
    pub recency_days: i64,
    pub frequency_orders: u64,
    pub monetary_total: f64,
}

/// The customer's business value for segmentation and prioritization.
/// Currently the monetary total; kept as a named seam so a richer value
/// model can replace it without touching the segmentation logic.
pub fn value_proxy(features: &CustomerFeatures) -> f64 {
    features.monetary_total
}

/// Build the ranked retention table.
///
/// Rows are sorted by `priority_score` descending, with ties broken by
/// customer id ascending so output order is deterministic. An empty
/// customer set produces an empty table.
///
/// # Errors
/// Fails, naming the customer, when a feature row has no matching score.
pub fn build_priority_table(
    features: &[CustomerFeatures],
    scores: &[ScoredCustomer],
) -> crate::Result<Vec<PriorityRow>> {
    if features.is_empty() {
        return Ok(Vec::new());
    }

    let score_by_customer: HashMap<&str, f64> = scores
        .iter()
        .map(|score| (score.customer_id.as_str(), score.churn_score))
        .collect();

    let values: Vec<f64> = features.iter().map(value_proxy).collect();
    let q1 = stats::percentile(&values, VALUE_LOW_QUANTILE);
    let q2 = stats::percentile(&values, VALUE_HIGH_QUANTILE);
    let normalized_values = stats::min_max_normalize(&values);

    let mut rows = Vec::with_capacity(features.len());
    for (row, normalized_value) in features.iter().zip(normalized_values) {
        let churn_score = score_by_customer
            .get(row.customer_id.as_str())
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!("no churn score for customer {}", row.customer_id)
            })?;
        let value = value_proxy(row);
        let value_segment = segment_value(value, q1, q2);
        let risk_segment = segment_risk(churn_score);
        rows.push(PriorityRow {
            customer_id: row.customer_id.clone(),
            churn_score,
            value_proxy: value,
            value_segment,
            risk_segment,
            priority_score: normalized_value * churn_score,
            recommended_action: recommend_action(value_segment, risk_segment),
            recency_days: row.recency_days,
            frequency_orders: row.frequency_orders,
            monetary_total: row.monetary_total,
        });
    }

    rows.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    Ok(rows)
}

/// Tertile segmentation against the per-run quantile boundaries.
fn segment_value(value: f64, q1: f64, q2: f64) -> Segment {
    if value <= q1 {
        Segment::Low
    } else if value <= q2 {
        Segment::Mid
    } else {
        Segment::High
    }
}

/// Fixed-bin segmentation of a churn probability. The bottom edge is
/// inclusive, so a score of exactly 0.0 is Low.
fn segment_risk(churn_score: f64) -> Segment {
    if churn_score <= RISK_LOW_MAX {
        Segment::Low
    } else if churn_score <= RISK_MID_MAX {
        Segment::Mid
    } else {
        Segment::High
    }
}

/// Pick the retention action for a value/risk pair. Rules are checked in
/// order and the first match wins.
pub fn recommend_action(value: Segment, risk: Segment) -> &'static str {
    if value == Segment::High && risk == Segment::High {
        "Priority retention: personal offer / call"
    } else if (value == Segment::High || value == Segment::Mid) && risk == Segment::High {
        "Retention campaign: targeted discount"
    } else if value == Segment::High && risk == Segment::Mid {
        "Monitor + soft engagement"
    } else if risk == Segment::Low {
        "No action / regular comms"
    } else {
        "Monitor"
    }
}
