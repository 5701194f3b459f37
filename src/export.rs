//! CSV and JSON persistence for pipeline outputs.
//!
//! Window column headers are derived from the configured window lengths, so
//! the default configuration produces `orders_last_30d`,
//! `trend_orders_30_vs_90`, and so on.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::churn::LabeledCustomer;
use crate::config::PipelineConfig;
use crate::decision::PriorityRow;
use crate::model::ModelMetrics;

/// Write the labeled feature table.
pub fn write_feature_table(
    path: &Path,
    labeled: &[LabeledCustomer],
    config: &PipelineConfig,
) -> crate::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let short = config.window_short_days;
    let mid = config.window_mid_days;
    let long = config.window_long_days;
    writer.write_record([
        "CustomerID".to_string(),
        "recency_days".to_string(),
        "frequency_orders".to_string(),
        "monetary_total".to_string(),
        "monetary_mean".to_string(),
        "monetary_median".to_string(),
        format!("orders_last_{short}d"),
        format!("spend_last_{short}d"),
        format!("orders_last_{mid}d"),
        format!("spend_last_{mid}d"),
        format!("orders_last_{long}d"),
        format!("spend_last_{long}d"),
        format!("trend_orders_{short}_vs_{long}"),
        format!("trend_spend_{short}_vs_{long}"),
        "churn".to_string(),
    ])?;

    for row in labeled {
        let features = &row.features;
        writer.write_record([
            features.customer_id.clone(),
            features.recency_days.to_string(),
            features.frequency_orders.to_string(),
            features.monetary_total.to_string(),
            features.monetary_mean.to_string(),
            features.monetary_median.to_string(),
            features.orders_short.to_string(),
            features.spend_short.to_string(),
            features.orders_mid.to_string(),
            features.spend_mid.to_string(),
            features.orders_long.to_string(),
            features.spend_long.to_string(),
            features.trend_orders.to_string(),
            features.trend_spend.to_string(),
            u8::from(row.churned).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the ranked retention table, preserving the given row order.
pub fn write_priority_table(path: &Path, rows: &[PriorityRow]) -> crate::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record([
        "CustomerID",
        "churn_score",
        "value_proxy",
        "value_segment",
        "risk_segment",
        "priority_score",
        "recommended_action",
        "recency_days",
        "frequency_orders",
        "monetary_total",
    ])?;

    for row in rows {
        writer.write_record([
            row.customer_id.clone(),
            row.churn_score.to_string(),
            row.value_proxy.to_string(),
            row.value_segment.as_str().to_string(),
            row.risk_segment.as_str().to_string(),
            row.priority_score.to_string(),
            row.recommended_action.to_string(),
            row.recency_days.to_string(),
            row.frequency_orders.to_string(),
            row.monetary_total.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write model metrics as pretty-printed JSON.
pub fn write_metrics(path: &Path, metrics: &ModelMetrics) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(metrics)?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
