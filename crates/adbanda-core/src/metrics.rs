//! Classification metrics computed on host-side prediction rows

/// Index of the largest value (first one on ties)
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}

/// Fraction of rows whose argmax equals the label
pub fn accuracy(predictions: &[Vec<f32>], labels: &[usize]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(row, &label)| argmax(row) == label)
        .count();
    correct as f64 / predictions.len() as f64
}

/// Area under the ROC curve over all (row, class) cells.
///
/// Every cell is one binary decision: the score is the predicted probability
/// and it is positive when the class is the row's label. Ties share their
/// average rank. Returns 0.0 when either side is empty.
pub fn roc_auc(predictions: &[Vec<f32>], labels: &[usize]) -> f64 {
    let mut cells: Vec<(f32, bool)> = predictions
        .iter()
        .zip(labels)
        .flat_map(|(row, &label)| row.iter().enumerate().map(move |(c, &p)| (p, c == label)))
        .collect();

    let positives = cells.iter().filter(|(_, pos)| *pos).count();
    let negatives = cells.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.0;
    }

    cells.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut positive_rank_sum = 0.0f64;
    let mut i = 0;
    while i < cells.len() {
        let mut j = i;
        while j + 1 < cells.len() && cells[j + 1].0 == cells[i].0 {
            j += 1;
        }
        // Ranks are 1-based; tied block [i, j] shares their mean
        let rank = (i + j) as f64 / 2.0 + 1.0;
        let tied_positives = cells[i..=j].iter().filter(|(_, pos)| *pos).count();
        positive_rank_sum += rank * tied_positives as f64;
        i = j + 1;
    }

    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Mean categorical cross-entropy of probability rows against labels.
///
/// Each row is renormalized and clipped to `[1e-7, 1 - 1e-7]` like the
/// training loss.
pub fn cross_entropy(predictions: &[Vec<f32>], labels: &[usize]) -> f64 {
    const EPSILON: f64 = 1e-7;
    if predictions.is_empty() {
        return 0.0;
    }
    let total: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(row, &label)| {
            let sum = row.iter().map(|&p| p as f64).sum::<f64>() + EPSILON;
            let p = row.get(label).map_or(0.0, |&p| p as f64) / sum;
            -p.clamp(EPSILON, 1.0 - EPSILON).ln()
        })
        .sum();
    total / predictions.len() as f64
}

/// Mean of each column
pub fn column_means(rows: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0f32; first.len()];
    for row in rows {
        for (sum, v) in sums.iter_mut().zip(row) {
            *sum += v;
        }
    }
    let n = rows.len() as f32;
    sums.into_iter().map(|s| s / n).collect()
}
