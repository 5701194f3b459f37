//! Pipeline configuration: per-run constants and output locations.

use std::path::PathBuf;

/// Constants threaded through every pipeline stage. One value of each per
/// run; nothing here is mutated after argument parsing.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Days without a purchase after which a customer counts as churned.
    pub churn_window_days: i64,
    /// Short/mid/long trailing activity windows, in days.
    pub window_short_days: i64,
    pub window_mid_days: i64,
    pub window_long_days: i64,
    /// Held-out share of customers for model evaluation.
    pub test_size: f64,
    /// Seed for the train/test shuffle.
    pub seed: u64,
    /// Number of customers shown on the top-targets chart.
    pub top_n: usize,
    /// Directory receiving tables, metrics, and charts.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            churn_window_days: 90,
            window_short_days: 30,
            window_mid_days: 60,
            window_long_days: 90,
            test_size: 0.2,
            seed: 42,
            top_n: 20,
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.churn_window_days < 0 {
            anyhow::bail!("churn window must be non-negative, got {}", self.churn_window_days);
        }
        for (name, days) in [
            ("short", self.window_short_days),
            ("mid", self.window_mid_days),
            ("long", self.window_long_days),
        ] {
            if days <= 0 {
                anyhow::bail!("{name} window must be positive, got {days}");
            }
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            anyhow::bail!("test size must be in (0, 1), got {}", self.test_size);
        }
        if self.top_n == 0 {
            anyhow::bail!("top-n must be at least 1");
        }
        Ok(())
    }

    pub fn features_path(&self) -> PathBuf {
        self.output_dir.join("customer_features.csv")
    }

    pub fn priority_path(&self) -> PathBuf {
        self.output_dir.join("churn_priority_table.csv")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join("model_metrics.json")
    }

    pub fn matrix_chart_path(&self) -> PathBuf {
        self.output_dir.join("value_risk_matrix.png")
    }

    pub fn targets_chart_path(&self) -> PathBuf {
        self.output_dir.join("top_retention_targets.png")
    }
}
