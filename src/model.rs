//! Churn model training and scoring.
//!
//! Fits a logistic regression on the labeled feature table and produces a
//! churn probability for every customer. Features are standardized with a
//! scaler fitted on the training split only, and evaluation runs on a
//! stratified, seeded hold-out so metrics are reproducible run to run.

use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::churn::LabeledCustomer;
use crate::features::CustomerFeatures;

/// Width of the model's feature vector; see [`feature_row`].
pub const NUM_FEATURES: usize = 13;

const MAX_ITERATIONS: u64 = 2000;

/// A customer's churn probability, in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredCustomer {
    pub customer_id: String,
    pub churn_score: f64,
}

/// Hold-out evaluation metrics for the fitted model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetrics {
    pub roc_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Everything the rest of the pipeline needs from the modeling step.
#[derive(Debug)]
pub struct ChurnModelOutput {
    /// One score per input customer, same order as the input.
    pub scores: Vec<ScoredCustomer>,
    pub metrics: ModelMetrics,
    pub train_size: usize,
    pub test_size: usize,
}

/// Column-wise standardization fitted on training data.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations per column.
    /// Zero-variance columns get a standard deviation of 1 so they pass
    /// through centering unchanged instead of dividing by zero.
    pub fn fit(data: &Array2<f64>) -> Self {
        let means = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let mut stds = data.std_axis(Axis(0), 0.0);
        stds.mapv_inplace(|std| if std == 0.0 { 1.0 } else { std });
        StandardScaler { means, stds }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.means) / &self.stds
    }
}

/// Train a logistic regression on the labeled customers and score all of
/// them.
///
/// # Arguments
/// * `labeled` - Feature rows joined with churn labels
/// * `test_size` - Fraction of each class held out for evaluation
/// * `seed` - Seed for the split, so runs are reproducible
///
/// # Returns
/// * Scores for every input customer plus hold-out metrics
pub fn train_and_score(
    labeled: &[LabeledCustomer],
    test_size: f64,
    seed: u64,
) -> crate::Result<ChurnModelOutput> {
    if labeled.len() < 2 {
        anyhow::bail!("need at least 2 customers to train a churn model, got {}", labeled.len());
    }
    let n_churned = labeled.iter().filter(|row| row.churned).count();
    if n_churned == 0 || n_churned == labeled.len() {
        anyhow::bail!(
            "all {} customers share a single churn label; training needs both classes",
            labeled.len()
        );
    }

    let features = feature_matrix(labeled);
    let labels: Array1<usize> =
        labeled.iter().map(|row| usize::from(row.churned)).collect();

    let (train_idx, test_idx) = stratified_split(&labels, test_size, seed);
    let scaler = StandardScaler::fit(&features.select(Axis(0), &train_idx));
    let train_x = scaler.transform(&features.select(Axis(0), &train_idx));
    let train_y = labels.select(Axis(0), &train_idx);

    let model = LogisticRegression::default()
        .max_iterations(MAX_ITERATIONS)
        .fit(&Dataset::new(train_x.clone(), train_y.clone()))?;

    // With one sample per class nothing can be held out; evaluate on the
    // training rows rather than an empty set.
    let (test_x, test_y) = if test_idx.is_empty() {
        (train_x, train_y)
    } else {
        (
            scaler.transform(&features.select(Axis(0), &test_idx)),
            labels.select(Axis(0), &test_idx),
        )
    };
    // Probability of the larger label, i.e. churned.
    let test_scores = model.predict_probabilities(&test_x);
    let metrics = evaluate(test_scores.as_slice().unwrap_or(&[]), &test_y.to_vec());

    let all_scores = model.predict_probabilities(&scaler.transform(&features));
    let scores = labeled
        .iter()
        .zip(all_scores.iter())
        .map(|(row, &score)| ScoredCustomer {
            customer_id: row.features.customer_id.clone(),
            churn_score: score,
        })
        .collect();

    Ok(ChurnModelOutput {
        scores,
        metrics,
        train_size: train_idx.len(),
        test_size: test_idx.len(),
    })
}

/// Flatten one feature row into the model's input vector.
fn feature_row(features: &CustomerFeatures) -> [f64; NUM_FEATURES] {
    [
        features.recency_days as f64,
        features.frequency_orders as f64,
        features.monetary_total,
        features.monetary_mean,
        features.monetary_median,
        features.orders_short as f64,
        features.spend_short,
        features.orders_mid as f64,
        features.spend_mid,
        features.orders_long as f64,
        features.spend_long,
        features.trend_orders,
        features.trend_spend,
    ]
}

fn feature_matrix(labeled: &[LabeledCustomer]) -> Array2<f64> {
    let mut matrix = Array2::zeros((labeled.len(), NUM_FEATURES));
    for (i, row) in labeled.iter().enumerate() {
        let values = feature_row(&row.features);
        for (j, value) in values.iter().enumerate() {
            matrix[[i, j]] = *value;
        }
    }
    matrix
}

/// Split row indices into train and test, stratified by label.
///
/// Each class is shuffled with the seeded generator and contributes
/// `round(class_size * test_size)` rows to the test set, clamped so that a
/// class with at least two members keeps one on each side. A singleton
/// class stays entirely in training.
fn stratified_split(labels: &Array1<usize>, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [0usize, 1] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            continue;
        }
        indices.shuffle(&mut rng);
        let n_test = if indices.len() < 2 {
            0
        } else {
            ((indices.len() as f64 * test_size).round() as usize).clamp(1, indices.len() - 1)
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Threshold scores at 0.5 and compute classification metrics.
/// Undefined ratios (no predicted positives, no actual positives) are
/// reported as 0 rather than NaN.
fn evaluate(scores: &[f64], truth: &[usize]) -> ModelMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;
    for (&score, &actual) in scores.iter().zip(truth) {
        match (score >= 0.5, actual == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let accuracy = ratio(tp + tn, scores.len());
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ModelMetrics { roc_auc: roc_auc(scores, truth), accuracy, precision, recall, f1 }
}

/// Rank-based ROC-AUC (Mann-Whitney), with tied scores sharing their mean
/// rank. Returns 0.5 when the truth contains only one class, since ranking
/// quality is undefined there.
fn roc_auc(scores: &[f64], truth: &[usize]) -> f64 {
    let n_pos = truth.iter().filter(|&&label| label == 1).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks; a tie group shares the mean of its span.
        let rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(&label, _)| label == 1)
        .map(|(_, &rank)| rank)
        .sum();
    let u = positive_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: &str, recency: i64, orders: u64, monetary: f64) -> CustomerFeatures {
        let orders_long = orders;
        let orders_short = orders / 3;
        CustomerFeatures {
            customer_id: id.to_string(),
            recency_days: recency,
            frequency_orders: orders,
            monetary_total: monetary,
            monetary_mean: monetary / orders.max(1) as f64,
            monetary_median: monetary / orders.max(1) as f64,
            orders_short,
            spend_short: monetary / 3.0,
            orders_mid: orders / 2,
            spend_mid: monetary / 2.0,
            orders_long,
            spend_long: monetary,
            trend_orders: (orders_short as f64 + 1.0) / (orders_long as f64 + 1.0),
            trend_spend: (monetary / 3.0 + 1.0) / (monetary + 1.0),
        }
    }

    fn labeled_dataset() -> Vec<LabeledCustomer> {
        let mut rows = Vec::new();
        // Six clearly active customers and six clearly gone ones.
        for i in 0..6 {
            rows.push(LabeledCustomer {
                features: customer(&format!("active-{i}"), 3 + i, 9 + i as u64, 800.0 + i as f64),
                churned: false,
            });
            rows.push(LabeledCustomer {
                features: customer(&format!("gone-{i}"), 200 + i, 1, 40.0 + i as f64),
                churned: true,
            });
        }
        rows
    }

    #[test]
    fn trains_and_scores_every_customer() {
        let labeled = labeled_dataset();
        let output = train_and_score(&labeled, 0.2, 42).unwrap();

        assert_eq!(output.scores.len(), labeled.len());
        assert_eq!(output.train_size + output.test_size, labeled.len());
        for score in &output.scores {
            assert!((0.0..=1.0).contains(&score.churn_score), "score out of range");
        }

        // Separable data: churned customers must score above active ones.
        let mean = |churned: bool| {
            let picked: Vec<f64> = labeled
                .iter()
                .zip(&output.scores)
                .filter(|(row, _)| row.churned == churned)
                .map(|(_, score)| score.churn_score)
                .collect();
            picked.iter().sum::<f64>() / picked.len() as f64
        };
        assert!(mean(true) > mean(false));
        assert!(output.metrics.roc_auc > 0.9);
        assert!(output.metrics.accuracy > 0.9);
    }

    #[test]
    fn rejects_tiny_or_single_class_input() {
        let labeled = labeled_dataset();
        assert!(train_and_score(&labeled[..1], 0.2, 42).is_err());

        let single_class: Vec<LabeledCustomer> = labeled
            .iter()
            .filter(|row| row.churned)
            .cloned()
            .collect();
        let err = train_and_score(&single_class, 0.2, 42).unwrap_err();
        assert!(err.to_string().contains("single churn label"));
    }

    #[test]
    fn split_is_stratified_and_deterministic() {
        let labels: Array1<usize> = vec![1, 1, 1, 0, 0, 0, 0, 0, 0, 0].into();
        let (train, test) = stratified_split(&labels, 0.2, 42);

        assert_eq!(train.len() + test.len(), 10);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        // round(3 * 0.2) clamps up to 1; round(7 * 0.2) = 1.
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 1);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 0).count(), 1);

        let (train_again, test_again) = stratified_split(&labels, 0.2, 42);
        assert_eq!(train, train_again);
        assert_eq!(test, test_again);
    }

    #[test]
    fn singleton_class_stays_in_training() {
        let labels: Array1<usize> = vec![1, 0, 0, 0, 0].into();
        let (train, test) = stratified_split(&labels, 0.2, 7);
        assert!(train.contains(&0));
        assert!(!test.contains(&0));
    }

    #[test]
    fn scaler_standardizes_and_guards_zero_variance() {
        let data =
            Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 5.0, 3.0, 4.0, 5.0]).unwrap();
        let scaler = StandardScaler::fit(&data);
        let scaled = scaler.transform(&data);

        assert!((scaled[[0, 0]] - -1.0).abs() < 1e-9);
        assert!((scaled[[1, 0]] - 1.0).abs() < 1e-9);
        assert!((scaled[[0, 1]] - -1.0).abs() < 1e-9);
        // Constant column: centered to zero, not divided by zero.
        assert_eq!(scaled[[0, 2]], 0.0);
        assert_eq!(scaled[[1, 2]], 0.0);
    }

    #[test]
    fn auc_matches_known_rankings() {
        // Perfect ranking.
        assert!((roc_auc(&[0.1, 0.2, 0.8, 0.9], &[0, 0, 1, 1]) - 1.0).abs() < 1e-9);
        // Inverted ranking.
        assert!((roc_auc(&[0.9, 0.8, 0.2, 0.1], &[0, 0, 1, 1]) - 0.0).abs() < 1e-9);
        // All scores tied: no ranking information.
        assert!((roc_auc(&[0.5, 0.5, 0.5, 0.5], &[0, 1, 0, 1]) - 0.5).abs() < 1e-9);
        // Single-class truth falls back to 0.5.
        assert!((roc_auc(&[0.3, 0.7], &[1, 1]) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_metrics_are_zero_not_nan() {
        // Nothing predicted positive, so precision/recall/f1 collapse to 0.
        let metrics = evaluate(&[0.1, 0.2, 0.3], &[1, 1, 0]);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert!((metrics.accuracy - 1.0 / 3.0).abs() < 1e-9);
    }
}
