//! Information gain and best-split selection.

use super::statistics::SplitStatistics;
use super::Statistics;

/// Information gain of splitting `parent` into `left` and `right`.
///
/// `I = H(parent) - (nL/n) * H(left) - (nR/n) * H(right)` with
/// `n = nL + nR`. A candidate with no samples on one side has gain 0, so
/// it loses to any strictly positive alternative.
pub fn information_gain<S: Statistics>(parent: &S, left: &S, right: &S) -> f64 {
    let n_left = left.num_of_samples();
    let n_right = right.num_of_samples();
    let n = n_left + n_right;
    if n == 0 || n_left == 0 || n_right == 0 {
        return 0.0;
    }
    let n = n as f64;
    parent.entropy()
        - (n_left as f64 / n) * left.entropy()
        - (n_right as f64 / n) * right.entropy()
}

/// Pick the candidate with the highest information gain.
///
/// Returns `(best_index, best_gain)`. Ties are broken by the
/// first-occurring index; an empty candidate set yields `(0, 0.0)`.
pub fn find_best_split_point<S: Statistics>(
    parent: &S,
    split_statistics: &SplitStatistics<S>,
) -> (usize, f64) {
    let mut best_index = 0;
    let mut best_gain = f64::NEG_INFINITY;
    for index in 0..split_statistics.total_size() {
        let gain = information_gain(
            parent,
            split_statistics.left(index),
            split_statistics.right(index),
        );
        if gain > best_gain {
            best_gain = gain;
            best_index = index;
        }
    }
    if best_gain.is_finite() {
        (best_index, best_gain)
    } else {
        (0, 0.0)
    }
}
