//! Held-out evaluation of a fitted classifier
//!
//! Metrics follow the usual binary definitions with fraud (class 1) as the
//! positive class. ROC-AUC is computed by the Mann-Whitney statistic over
//! mid-ranks, which handles tied scores without an explicit curve sweep.

use crate::error::{FraudError, Result};
use crate::models::FittedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-class precision/recall/F1 breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Full evaluation of one model on a test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    /// Precision for the fraud class
    pub precision: f64,
    /// Recall for the fraud class
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
    /// Rows are actual, columns predicted: [[TN, FP], [FN, TP]]
    pub confusion_matrix: [[usize; 2]; 2],
    pub per_class: BTreeMap<String, ClassReport>,
    pub n_test: usize,
}

/// Score `model` on the held-out features and labels
pub fn evaluate(
    model: &FittedModel,
    x_test: &Array2<f64>,
    y_test: &Array1<i64>,
) -> Result<EvaluationReport> {
    if x_test.nrows() != y_test.len() {
        return Err(FraudError::EvaluationError(format!(
            "feature rows ({}) and labels ({}) differ",
            x_test.nrows(),
            y_test.len()
        )));
    }
    if y_test.is_empty() {
        return Err(FraudError::EvaluationError(
            "empty test split".to_string(),
        ));
    }

    let proba = model.predict_proba(x_test)?;
    let preds: Vec<i64> = proba.iter().map(|&p| if p > 0.5 { 1 } else { 0 }).collect();

    let mut tn = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    let mut tp = 0usize;
    for (&actual, &pred) in y_test.iter().zip(&preds) {
        match (actual, pred) {
            (0, 0) => tn += 1,
            (0, 1) => fp += 1,
            (1, 0) => fn_ += 1,
            (1, 1) => tp += 1,
            _ => {
                return Err(FraudError::EvaluationError(format!(
                    "label {} outside {{0, 1}}",
                    actual
                )))
            }
        }
    }

    let n = y_test.len();
    let accuracy = (tp + tn) as f64 / n as f64;
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1_score = f1(precision, recall);

    let neg_precision = ratio(tn, tn + fn_);
    let neg_recall = ratio(tn, tn + fp);

    let mut per_class = BTreeMap::new();
    per_class.insert(
        "0".to_string(),
        ClassReport {
            precision: neg_precision,
            recall: neg_recall,
            f1_score: f1(neg_precision, neg_recall),
            support: tn + fp,
        },
    );
    per_class.insert(
        "1".to_string(),
        ClassReport {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        },
    );

    let roc_auc = roc_auc_score(&proba, y_test)?;

    Ok(EvaluationReport {
        accuracy,
        precision,
        recall,
        f1_score,
        roc_auc,
        confusion_matrix: [[tn, fp], [fn_, tp]],
        per_class,
        n_test: n,
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Mann-Whitney ROC-AUC over mid-ranks. Requires both classes present.
pub fn roc_auc_score(scores: &Array1<f64>, labels: &Array1<i64>) -> Result<f64> {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(FraudError::EvaluationError(
            "ROC-AUC needs both classes in the test split".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Assign mid-ranks to tied scores, 1-based
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let mid_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = mid_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();

    let n_pos_f = n_pos as f64;
    let n_neg_f = n_neg as f64;
    let u = pos_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Ok(u / (n_pos_f * n_neg_f))
}
