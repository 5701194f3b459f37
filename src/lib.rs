//! ChurnScope: churn risk scoring and retention prioritization for retail
//! transaction logs.
//!
//! This library turns a raw transaction export into per-customer RFM and
//! trailing-window features, derives a churn label from purchase recency,
//! scores churn risk with a logistic regression, and produces a ranked
//! retention-action table plus summary charts.

pub mod churn;
pub mod cli;
pub mod config;
pub mod data;
pub mod decision;
pub mod export;
pub mod features;
pub mod model;
pub mod stats;
pub mod viz;

// Re-export public items for easier access
pub use churn::{attach_labels, label_churn, ChurnLabel, LabeledCustomer};
pub use cli::Args;
pub use config::PipelineConfig;
pub use data::{load_transactions, parse_transactions, Transaction};
pub use decision::{build_priority_table, PriorityRow, Segment};
pub use features::{
    build_rfm_features, build_window_features, merge_customer_features, reference_date,
    CustomerFeatures, CustomerRfm, WindowFeatures,
};
pub use model::{train_and_score, ChurnModelOutput, ModelMetrics, ScoredCustomer};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
