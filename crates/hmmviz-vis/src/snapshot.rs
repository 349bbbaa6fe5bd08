//! Per-iteration model snapshots.

use hmmviz_layout::TierCounts;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Allowed deviation of a probability row sum from 1.
pub const ROW_SUM_TOLERANCE: f64 = 0.01;

/// Dense row-major matrix of reals.
///
/// Serializes as a nested array, e.g. `[[0.7, 0.3], [0.4, 0.6]]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Build from nested rows. Ragged input is rejected.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(Error::validation(format!(
                "ragged matrix: row {bad} has {} columns, expected {cols}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// An `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { rows: n, cols: n, data }
    }

    /// A `rows × cols` matrix with entry `(r, c)` given by `f(r, c)`.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let data = (0..rows * cols).map(|k| f(k / cols, k % cols)).collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when the matrix has no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    /// Copy of column `col`; empty when out of range.
    pub fn column(&self, col: usize) -> Vec<f64> {
        if col >= self.cols {
            return Vec::new();
        }
        (0..self.rows)
            .map(|r| self.data[r * self.cols + col])
            .collect()
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks(0) panics, and a zero-column matrix has no entries anyway.
        self.data.chunks(self.cols.max(1))
    }

    /// Largest finite entry, or 0 for an empty matrix.
    pub fn max(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.data
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Matrix::from_rows(rows)
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(m: Matrix) -> Self {
        if m.cols == 0 {
            return vec![Vec::new(); m.rows];
        }
        m.data.chunks(m.cols).map(<[f64]>::to_vec).collect()
    }
}

/// One training iteration's model state.
///
/// `emission` may be empty (no observation tier) and `initial` may be empty
/// (no initial-state node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "A")]
    pub transition: Matrix,
    #[serde(rename = "B", default)]
    pub emission: Matrix,
    #[serde(rename = "pi", default)]
    pub initial: Vec<f64>,
    pub iteration: u64,
    #[serde(default)]
    pub log_likelihood: f64,
}

/// Which probability vector a row-sum check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Transition(usize),
    Emission(usize),
    Initial,
}

/// A probability vector whose sum strays more than [`ROW_SUM_TOLERANCE`] from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowViolation {
    pub distribution: Distribution,
    pub sum: f64,
}

impl Snapshot {
    pub fn new(
        iteration: u64,
        transition: Matrix,
        emission: Matrix,
        initial: Vec<f64>,
        log_likelihood: f64,
    ) -> Self {
        Self {
            transition,
            emission,
            initial,
            iteration,
            log_likelihood,
        }
    }

    /// A snapshot carrying only a transition matrix.
    pub fn from_transition(iteration: u64, transition: Matrix) -> Self {
        Self::new(iteration, transition, Matrix::default(), Vec::new(), 0.0)
    }

    pub fn state_count(&self) -> usize {
        self.transition.rows()
    }

    pub fn observation_count(&self) -> usize {
        self.emission.cols()
    }

    pub fn has_initial(&self) -> bool {
        !self.initial.is_empty()
    }

    /// Node counts for the layout engine.
    pub fn tier_counts(&self) -> TierCounts {
        TierCounts::new(
            self.state_count(),
            self.observation_count(),
            self.has_initial(),
        )
    }

    /// Structural checks. Row sums are not checked here, see
    /// [`Snapshot::stochastic_violations`].
    pub fn validate(&self) -> Result<()> {
        if self.iteration < 1 {
            return Err(Error::validation("iteration index must be at least 1"));
        }
        let n = self.transition.rows();
        if n == 0 {
            return Err(Error::validation("transition matrix is empty"));
        }
        if !self.transition.is_square() {
            return Err(Error::validation(format!(
                "transition matrix is {}x{}, expected square",
                n,
                self.transition.cols()
            )));
        }
        if !self.emission.is_empty() && self.emission.rows() != n {
            return Err(Error::validation(format!(
                "emission matrix has {} rows, expected {n}",
                self.emission.rows()
            )));
        }
        if !self.initial.is_empty() && self.initial.len() != n {
            return Err(Error::validation(format!(
                "initial vector has {} entries, expected {n}",
                self.initial.len()
            )));
        }
        check_probabilities("transition matrix", self.transition.values())?;
        check_probabilities("emission matrix", self.emission.values())?;
        check_probabilities("initial vector", &self.initial)?;
        if self.log_likelihood.is_nan() {
            return Err(Error::validation("log-likelihood is NaN"));
        }
        Ok(())
    }

    /// Probability vectors whose sum is not ≈ 1.
    pub fn stochastic_violations(&self) -> Vec<RowViolation> {
        let off = |sum: f64| (sum - 1.0).abs() > ROW_SUM_TOLERANCE;
        let mut out = Vec::new();

        for (i, row) in self.transition.iter_rows().enumerate() {
            let sum: f64 = row.iter().sum();
            if off(sum) {
                out.push(RowViolation {
                    distribution: Distribution::Transition(i),
                    sum,
                });
            }
        }
        if !self.emission.is_empty() {
            for (i, row) in self.emission.iter_rows().enumerate() {
                let sum: f64 = row.iter().sum();
                if off(sum) {
                    out.push(RowViolation {
                        distribution: Distribution::Emission(i),
                        sum,
                    });
                }
            }
        }
        if self.has_initial() {
            let sum: f64 = self.initial.iter().sum();
            if off(sum) {
                out.push(RowViolation {
                    distribution: Distribution::Initial,
                    sum,
                });
            }
        }
        out
    }
}

fn check_probabilities(what: &str, values: &[f64]) -> Result<()> {
    if let Some(v) = values.iter().find(|v| !v.is_finite()) {
        return Err(Error::validation(format!("{what} contains non-finite value {v}")));
    }
    if let Some(v) = values.iter().find(|v| **v < 0.0) {
        return Err(Error::validation(format!("{what} contains negative probability {v}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn weather() -> Snapshot {
        Snapshot::new(
            1,
            Matrix::from_rows(vec![vec![0.7, 0.3], vec![0.4, 0.6]]).unwrap(),
            Matrix::from_rows(vec![vec![0.1, 0.4, 0.5], vec![0.6, 0.3, 0.1]]).unwrap(),
            vec![0.6, 0.4],
            -120.5,
        )
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Matrix::from_rows(vec![vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn matrix_accessors() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.get(1, 0), Some(3.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.row(0), Some(&[1.0, 2.0][..]));
        assert_eq!(m.column(1), vec![2.0, 4.0]);
        assert_eq!(m.max(), 4.0);
        assert_eq!(Matrix::default().max(), 0.0);
    }

    #[test]
    fn identity_is_square_with_unit_diagonal() {
        let m = Matrix::identity(3);
        assert!(m.is_square());
        assert_eq!(m.get(2, 2), Some(1.0));
        assert_eq!(m.get(0, 2), Some(0.0));
    }

    #[test]
    fn valid_snapshot_passes() {
        let snap = weather();
        snap.validate().unwrap();
        assert!(snap.stochastic_violations().is_empty());
        assert_eq!(snap.tier_counts(), TierCounts::new(2, 3, true));
    }

    #[test]
    fn non_square_transition_is_rejected() {
        let mut snap = weather();
        snap.transition = Matrix::from_rows(vec![vec![0.5, 0.5]]).unwrap();
        assert_eq!(snap.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn mismatched_emission_rows_are_rejected() {
        let mut snap = weather();
        snap.emission = Matrix::from_rows(vec![vec![1.0]]).unwrap();
        assert!(snap.validate().is_err());
    }

    #[test]
    fn negative_probability_is_rejected() {
        let mut snap = weather();
        snap.initial = vec![1.2, -0.2];
        let err = snap.validate().unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn iteration_zero_is_rejected() {
        let mut snap = weather();
        snap.iteration = 0;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn row_sum_violations_are_reported_not_rejected() {
        let snap = Snapshot::from_transition(
            1,
            Matrix::from_rows(vec![vec![0.5, 0.2], vec![0.0, 0.0]]).unwrap(),
        );
        snap.validate().unwrap();
        let violations = snap.stochastic_violations();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].distribution, Distribution::Transition(0));
    }

    #[test]
    fn json_shape_uses_short_keys() {
        let json = serde_json::to_string(&weather()).unwrap();
        assert!(json.contains("\"A\":[[0.7,0.3],[0.4,0.6]]"));
        assert!(json.contains("\"pi\""));

        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, weather());
    }

    #[test]
    fn optional_tiers_may_be_omitted() {
        let parsed: Snapshot =
            serde_json::from_str(r#"{"A": [[1.0]], "iteration": 3}"#).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.tier_counts(), TierCounts::new(1, 0, false));
    }

    #[test]
    fn ragged_json_fails_to_parse() {
        let parsed = serde_json::from_str::<Snapshot>(r#"{"A": [[1.0], [0.5, 0.5]], "iteration": 1}"#);
        assert!(parsed.is_err());
    }
}
