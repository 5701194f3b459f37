//! ChurnScope: churn scoring and retention prioritization CLI
//!
//! This is the main entrypoint that orchestrates ingestion, feature
//! engineering, churn labeling, model scoring, decisioning, and output
//! rendering.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use churnscope::{
    attach_labels, build_priority_table, build_rfm_features, build_window_features, export,
    label_churn, load_transactions, merge_customer_features, reference_date, train_and_score,
    viz, Args, Segment,
};
use clap::Parser;
use env_logger::Env;

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if args.verbose {
        println!("ChurnScope - Churn Scoring and Retention Prioritization");
        println!("========================================================\n");
    }

    run_pipeline(&args)
}

/// Run the full scoring pipeline, raw CSV to priority table and charts.
fn run_pipeline(args: &Args) -> Result<()> {
    println!("=== Churn Scoring Pipeline ===\n");

    let config = args.to_config();
    config.validate()?;
    let start_time = Instant::now();

    // Step 1: Load and clean transactions
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input);
    }

    let load_start = Instant::now();
    let transactions = load_transactions(Path::new(&args.input))?;
    println!("✓ Transactions loaded: {}", transactions.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_start.elapsed().as_secs_f64());
    }

    // Step 2: Build the feature table
    if args.verbose {
        println!("\nStep 2: Building customer features");
        println!(
            "  Windows: {}/{}/{} days",
            config.window_short_days, config.window_mid_days, config.window_long_days
        );
    }

    let features_start = Instant::now();
    let reference = reference_date(&transactions)?;
    let rfm = build_rfm_features(&transactions, reference);
    let short = build_window_features(&transactions, reference, config.window_short_days);
    let mid = build_window_features(&transactions, reference, config.window_mid_days);
    let long = build_window_features(&transactions, reference, config.window_long_days);
    let features = merge_customer_features(rfm, &short, &mid, &long);
    println!("✓ Feature table built: {} customers", features.len());
    if args.verbose {
        println!("  Reference date: {}", reference);
        println!("  Feature time: {:.2}s", features_start.elapsed().as_secs_f64());
    }

    // Step 3: Derive churn labels
    let labels = label_churn(&transactions, reference, config.churn_window_days);
    let labeled = attach_labels(features.clone(), &labels)?;
    let churned = labeled.iter().filter(|row| row.churned).count();
    println!(
        "✓ Churn labels attached: {} of {} customers churned ({:.1}%)",
        churned,
        labeled.len(),
        churned as f64 / labeled.len() as f64 * 100.0
    );

    // Step 4: Train the model and score everyone
    if args.verbose {
        println!("\nStep 4: Training churn model");
        println!("  Test size: {}", config.test_size);
        println!("  Seed: {}", config.seed);
    }

    let model_start = Instant::now();
    let model_output = train_and_score(&labeled, config.test_size, config.seed)?;
    println!(
        "✓ Model trained on {} customers, evaluated on {}",
        model_output.train_size, model_output.test_size
    );
    if args.verbose {
        println!("  Training time: {:.2}s", model_start.elapsed().as_secs_f64());
    }

    let metrics = &model_output.metrics;
    println!("\n=== Model Metrics ===");
    println!("ROC-AUC:   {:.3}", metrics.roc_auc);
    println!("Accuracy:  {:.3}", metrics.accuracy);
    println!("Precision: {:.3}", metrics.precision);
    println!("Recall:    {:.3}", metrics.recall);
    println!("F1:        {:.3}", metrics.f1);

    // Step 5: Segment, score, and rank retention targets
    let priority = build_priority_table(&features, &model_output.scores)?;
    println!("\n✓ Priority table built: {} customers ranked", priority.len());

    println!("\n=== Risk Segments ===");
    for segment in [Segment::High, Segment::Mid, Segment::Low] {
        let count = priority.iter().filter(|row| row.risk_segment == segment).count();
        let percentage = count as f64 / priority.len() as f64 * 100.0;
        println!("{}: {} customers ({:.1}%)", segment.as_str(), count, percentage);
    }

    // Step 6: Persist tables and metrics
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("failed to create output directory {}", config.output_dir.display())
    })?;
    export::write_feature_table(&config.features_path(), &labeled, &config)?;
    export::write_priority_table(&config.priority_path(), &priority)?;
    export::write_metrics(&config.metrics_path(), metrics)?;
    println!("\n✓ Tables and metrics written");

    // Step 7: Render charts
    if !args.no_charts {
        let viz_start = Instant::now();
        viz::render_value_risk_matrix(&priority, &config.matrix_chart_path())?;
        viz::render_top_targets(&priority, config.top_n, &config.targets_chart_path())?;
        if args.verbose {
            println!("  Chart time: {:.2}s", viz_start.elapsed().as_secs_f64());
        }
    }

    println!("\n=== Pipeline Complete ===");
    println!("Reference date: {}", reference);
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("Feature table saved to: {}", config.features_path().display());
    println!("Priority table saved to: {}", config.priority_path().display());
    println!("Metrics saved to: {}", config.metrics_path().display());

    Ok(())
}
