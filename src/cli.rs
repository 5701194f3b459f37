//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::PipelineConfig;

/// Churn scoring and retention prioritization over retail transaction logs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the raw transactions CSV file
    #[arg(short, long, default_value = "data/raw/Online_Retail.csv")]
    pub input: String,

    /// Directory for tables, metrics, and charts
    #[arg(short, long, default_value = "outputs")]
    pub output_dir: String,

    /// Days without a purchase before a customer counts as churned
    #[arg(long, default_value = "90")]
    pub churn_window_days: i64,

    /// Shortest trailing window for order/spend features, in days
    #[arg(long, default_value = "30")]
    pub window_short_days: i64,

    /// Middle trailing window, in days
    #[arg(long, default_value = "60")]
    pub window_mid_days: i64,

    /// Longest trailing window, in days; also the trend denominator
    #[arg(long, default_value = "90")]
    pub window_long_days: i64,

    /// Fraction of each class held out for model evaluation
    #[arg(long, default_value = "0.2")]
    pub test_size: f64,

    /// Seed for the train/test split
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of customers on the top-targets chart
    #[arg(long, default_value = "20")]
    pub top_n: usize,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Collect the pipeline knobs into a validated-later config value.
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            churn_window_days: self.churn_window_days,
            window_short_days: self.window_short_days,
            window_mid_days: self.window_mid_days,
            window_long_days: self.window_long_days,
            test_size: self.test_size,
            seed: self.seed,
            top_n: self.top_n,
            output_dir: PathBuf::from(&self.output_dir),
        }
    }
}
