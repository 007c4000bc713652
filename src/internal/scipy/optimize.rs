//! SciPy optimization functions port.
//!
//! Ported from scipy.optimize.linear_sum_assignment
//! License: BSD 3-Clause (SciPy Developers)
#![allow(clippy::needless_range_loop)]

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// Optimal (row, col) pairs, sorted by row
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

impl AssignmentResult {
    /// Column assigned to `row`, if any.
    pub fn col_for_row(&self, row: usize) -> Option<usize> {
        self.assignments
            .binary_search_by_key(&row, |a| a.row_idx)
            .ok()
            .map(|i| self.assignments[i].col_idx)
    }
}

/// Solve the linear sum assignment problem.
///
/// Finds the assignment of rows to columns minimizing the total cost. For a
/// rectangular matrix every row (or every column, whichever is fewer) is
/// assigned. `+inf` entries mark forbidden pairs.
///
/// Uses the shortest augmenting path method (Crouse, 2016) like SciPy.
///
/// # Errors
/// - the matrix contains NaN or `-inf`
/// - no complete assignment avoids the forbidden (`+inf`) pairs
pub fn linear_sum_assignment(cost_matrix: &DMatrix<f64>) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.shape();

    if cost_matrix.iter().any(|c| c.is_nan() || *c == f64::NEG_INFINITY) {
        return Err(Error::AssignmentError(
            "cost matrix contains NaN or -inf".to_string(),
        ));
    }

    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult {
            assignments: Vec::new(),
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        });
    }

    // The solver wants at most as many rows as columns
    let transposed = num_rows > num_cols;
    let cost = if transposed {
        cost_matrix.transpose()
    } else {
        cost_matrix.clone()
    };

    let col4row = shortest_augmenting_path(&cost)?;

    let mut assignments: Vec<Assignment> = col4row
        .into_iter()
        .enumerate()
        .map(|(r, c)| {
            if transposed {
                Assignment { row_idx: c, col_idx: r }
            } else {
                Assignment { row_idx: r, col_idx: c }
            }
        })
        .collect();
    assignments.sort_by_key(|a| a.row_idx);

    let mut matched_rows = vec![false; num_rows];
    let mut matched_cols = vec![false; num_cols];
    for a in &assignments {
        matched_rows[a.row_idx] = true;
        matched_cols[a.col_idx] = true;
    }

    Ok(AssignmentResult {
        assignments,
        unmatched_rows: (0..num_rows).filter(|&i| !matched_rows[i]).collect(),
        unmatched_cols: (0..num_cols).filter(|&j| !matched_cols[j]).collect(),
    })
}

/// Core solver for `nr <= nc`. Returns the column assigned to every row.
fn shortest_augmenting_path(cost: &DMatrix<f64>) -> Result<Vec<usize>> {
    let (nr, nc) = cost.shape();

    // Dual variables
    let mut u = vec![0.0; nr];
    let mut v = vec![0.0; nc];

    let mut shortest = vec![f64::INFINITY; nc];
    let mut path = vec![0usize; nc];
    let mut col4row: Vec<Option<usize>> = vec![None; nr];
    let mut row4col: Vec<Option<usize>> = vec![None; nc];
    let mut remaining = vec![0usize; nc];
    let mut visited_rows = vec![false; nr];
    let mut visited_cols = vec![false; nc];

    for cur_row in 0..nr {
        let mut min_val = 0.0;
        let mut num_remaining = nc;
        // Reverse order so ties resolve towards the lowest column index
        for (it, slot) in remaining.iter_mut().enumerate() {
            *slot = nc - it - 1;
        }
        visited_rows.fill(false);
        visited_cols.fill(false);
        shortest.fill(f64::INFINITY);

        let mut i = cur_row;
        let sink = loop {
            let mut index = None;
            let mut lowest = f64::INFINITY;
            visited_rows[i] = true;

            for it in 0..num_remaining {
                let j = remaining[it];
                let r = min_val + cost[(i, j)] - u[i] - v[j];
                if r < shortest[j] {
                    path[j] = i;
                    shortest[j] = r;
                }
                // Prefer an unassigned column on ties: it ends the search early
                if shortest[j] < lowest || (shortest[j] == lowest && row4col[j].is_none()) {
                    lowest = shortest[j];
                    index = Some(it);
                }
            }

            min_val = lowest;
            let index = match index {
                Some(idx) if min_val.is_finite() => idx,
                _ => {
                    return Err(Error::AssignmentError(
                        "cost matrix is infeasible".to_string(),
                    ))
                }
            };

            let j = remaining[index];
            visited_cols[j] = true;
            num_remaining -= 1;
            remaining[index] = remaining[num_remaining];

            match row4col[j] {
                None => break j,
                Some(row) => i = row,
            }
        };

        // Update dual variables
        u[cur_row] += min_val;
        for row in 0..nr {
            if visited_rows[row] && row != cur_row {
                if let Some(col) = col4row[row] {
                    u[row] += min_val - shortest[col];
                }
            }
        }
        for col in 0..nc {
            if visited_cols[col] {
                v[col] -= min_val - shortest[col];
            }
        }

        // Augment the previous solution along the path
        let mut j = sink;
        loop {
            let row = path[j];
            row4col[j] = Some(row);
            let previous = col4row[row].replace(j);
            if row == cur_row {
                break;
            }
            j = previous.ok_or_else(|| {
                Error::AssignmentError("broken augmenting path".to_string())
            })?;
        }
    }

    col4row
        .into_iter()
        .map(|c| c.ok_or_else(|| Error::AssignmentError("unassigned row".to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_cost(cost: &DMatrix<f64>, result: &AssignmentResult) -> f64 {
        result
            .assignments
            .iter()
            .map(|a| cost[(a.row_idx, a.col_idx)])
            .sum()
    }

    #[test]
    fn test_linear_sum_assignment_basic_square() {
        let cost = DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 3.0,
            2.0, 0.0, 5.0,
            3.0, 2.0, 2.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        assert_eq!(result.assignments.len(), 3);
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());

        // Optimal: (0,1)=1 + (1,0)=2 + (2,2)=2 = 5
        assert!((total_cost(&cost, &result) - 5.0).abs() < 1e-10);
        assert_eq!(result.col_for_row(0), Some(1));
        assert_eq!(result.col_for_row(1), Some(0));
        assert_eq!(result.col_for_row(2), Some(2));
    }

    #[test]
    fn test_linear_sum_assignment_beats_greedy() {
        // Greedy would take (0,0)=1 first and end at 1 + 100 = 101
        let cost = DMatrix::from_row_slice(2, 2, &[
            1.0, 2.0,
            2.0, 100.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        assert!((total_cost(&cost, &result) - 4.0).abs() < 1e-10);
        assert_eq!(result.col_for_row(0), Some(1));
        assert_eq!(result.col_for_row(1), Some(0));
    }

    #[test]
    fn test_linear_sum_assignment_rectangular_more_rows() {
        let cost = DMatrix::from_row_slice(3, 2, &[
            1.0, 2.0,
            3.0, 4.0,
            0.5, 6.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        // Can only match 2 rows to 2 columns; best is (2,0)=0.5 + (0,1)=2
        assert_eq!(result.assignments.len(), 2);
        assert_eq!(result.unmatched_rows, vec![1]);
        assert!(result.unmatched_cols.is_empty());
        assert!((total_cost(&cost, &result) - 2.5).abs() < 1e-10);
        // Sorted by row
        assert_eq!(result.assignments[0].row_idx, 0);
        assert_eq!(result.assignments[1].row_idx, 2);
    }

    #[test]
    fn test_linear_sum_assignment_rectangular_more_cols() {
        let cost = DMatrix::from_row_slice(2, 3, &[
            1.0, 2.0, 3.0,
            4.0, 5.0, 0.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        assert_eq!(result.assignments.len(), 2);
        assert!(result.unmatched_rows.is_empty());
        assert_eq!(result.unmatched_cols, vec![1]);
        assert!((total_cost(&cost, &result) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_linear_sum_assignment_empty_matrix() {
        let cost = DMatrix::<f64>::zeros(0, 0);
        let result = linear_sum_assignment(&cost).unwrap();

        assert!(result.assignments.is_empty());
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_linear_sum_assignment_empty_columns() {
        let cost = DMatrix::<f64>::zeros(2, 0);
        let result = linear_sum_assignment(&cost).unwrap();

        assert!(result.assignments.is_empty());
        assert_eq!(result.unmatched_rows, vec![0, 1]);
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_linear_sum_assignment_forbidden_pairs() {
        let inf = f64::INFINITY;
        let cost = DMatrix::from_row_slice(2, 2, &[
            inf, 3.0,
            1.0, 1.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        assert_eq!(result.col_for_row(0), Some(1));
        assert_eq!(result.col_for_row(1), Some(0));
    }

    #[test]
    fn test_linear_sum_assignment_infeasible() {
        let inf = f64::INFINITY;
        let cost = DMatrix::from_row_slice(2, 2, &[
            inf, inf,
            1.0, 1.0,
        ]);
        assert!(linear_sum_assignment(&cost).is_err());
    }

    #[test]
    fn test_linear_sum_assignment_rejects_nan() {
        let cost = DMatrix::from_row_slice(1, 2, &[f64::NAN, 1.0]);
        assert!(matches!(
            linear_sum_assignment(&cost),
            Err(Error::AssignmentError(_))
        ));
    }

    #[test]
    fn test_linear_sum_assignment_placeholder_columns() {
        // Two tracks, one detection, plus one "no match" column per track
        // at cost 5.0. Track 0 is close to the detection, track 1 is not.
        let cost = DMatrix::from_row_slice(2, 3, &[
            1.0, 5.0, 5.0,
            9.0, 5.0, 5.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        assert_eq!(result.col_for_row(0), Some(0));
        assert!(result.col_for_row(1).unwrap() >= 1);
        assert!((total_cost(&cost, &result) - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_linear_sum_assignment_larger_instance() {
        // Known optimum of 3x3 + permuted diagonal
        let cost = DMatrix::from_row_slice(4, 4, &[
            9.0, 2.0, 7.0, 8.0,
            6.0, 4.0, 3.0, 7.0,
            5.0, 8.0, 1.0, 8.0,
            7.0, 6.0, 9.0, 4.0,
        ]);
        let result = linear_sum_assignment(&cost).unwrap();

        // (0,1)=2 + (1,0)=6 + (2,2)=1 + (3,3)=4 = 13
        assert!((total_cost(&cost, &result) - 13.0).abs() < 1e-10);
    }
}
