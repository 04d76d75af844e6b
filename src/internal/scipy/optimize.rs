//! Linear sum assignment in the spirit of `scipy.optimize.linear_sum_assignment`.
//!
//! License: BSD 3-Clause (SciPy Developers)
#![allow(clippy::needless_range_loop)]

use nalgebra::DMatrix;

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// Valid assignments (row, col pairs)
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

/// Solve the rectangular linear sum assignment problem.
///
/// Non-finite entries (`NaN`, `inf`) mark forbidden pairs. They are replaced by a
/// penalty larger than any feasible total before solving, so the solver first
/// maximises the number of feasible pairs and then minimises their cost. Pairs
/// that land on a forbidden entry, or whose cost exceeds `max_cost`, are reported
/// as unmatched.
///
/// # Arguments
/// * `cost_matrix` - Cost matrix where `cost[(i, j)]` is the cost of assigning row i to column j
/// * `max_cost` - Assignments with cost > max_cost are rejected
pub fn linear_sum_assignment(cost_matrix: &DMatrix<f64>, max_cost: f64) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.shape();
    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            assignments: Vec::new(),
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        };
    }

    let finite_sum: f64 = cost_matrix
        .iter()
        .filter(|c| c.is_finite())
        .map(|c| c.abs())
        .sum();
    let penalty = 2.0 * finite_sum + 1.0;
    let sanitized = cost_matrix.map(|c| if c.is_finite() { c } else { penalty });

    // The solver needs rows <= cols.
    let transposed = num_rows > num_cols;
    let work = if transposed {
        sanitized.transpose()
    } else {
        sanitized
    };
    let row_to_col = hungarian(&work);

    let mut matched_rows = vec![false; num_rows];
    let mut matched_cols = vec![false; num_cols];
    let mut assignments = Vec::new();

    for (r, col) in row_to_col.into_iter().enumerate() {
        let Some(c) = col else { continue };
        let (row_idx, col_idx) = if transposed { (c, r) } else { (r, c) };
        let cost = cost_matrix[(row_idx, col_idx)];
        if cost.is_finite() && cost <= max_cost {
            matched_rows[row_idx] = true;
            matched_cols[col_idx] = true;
            assignments.push(Assignment { row_idx, col_idx });
        }
    }
    assignments.sort_by_key(|a| a.row_idx);

    AssignmentResult {
        assignments,
        unmatched_rows: (0..num_rows).filter(|&i| !matched_rows[i]).collect(),
        unmatched_cols: (0..num_cols).filter(|&j| !matched_cols[j]).collect(),
    }
}

/// Shortest augmenting path Hungarian algorithm with row/column potentials.
///
/// Requires `cost.nrows() <= cost.ncols()` and finite entries. Every row is assigned.
fn hungarian(cost: &DMatrix<f64>) -> Vec<Option<usize>> {
    let n = cost.nrows();
    let m = cost.ncols();

    // 1-indexed; index 0 is the virtual source column.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[(i0 - 1, j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![None; n];
    for j in 1..=m {
        if p[j] != 0 {
            row_to_col[p[j] - 1] = Some(j - 1);
        }
    }
    row_to_col
}
