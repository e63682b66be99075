//! Jacobi eigen-decomposition for small symmetric matrices
//!
//! Classic cyclic Jacobi rotations: repeatedly zero the largest off-diagonal
//! entries until the off-diagonal mass falls below a tolerance or the sweep
//! budget runs out. Quadratically convergent for the 3x3 structure tensors
//! this crate feeds it, and numerically stable for any small symmetric input.
//!
//! Eigenvalues come back sorted ascending with matching unit eigenvectors,
//! but callers in this crate treat the three axes symmetrically and must not
//! rely on a semantic (largest/smallest curvature) ordering.

/// Result of a symmetric eigen-decomposition.
///
/// `vectors[m]` is the unit eigenvector paired with `values[m]`.
#[derive(Clone, Copy, Debug)]
pub struct SymmetricEigen<const N: usize> {
    pub values: [f64; N],
    pub vectors: [[f64; N]; N],
}

/// Decompose a symmetric N x N matrix with cyclic Jacobi rotations.
///
/// # Arguments
/// * `a` - symmetric input matrix (only the upper triangle is trusted)
/// * `tol` - convergence tolerance on off-diagonal magnitude (e.g. 1e-8)
/// * `max_sweeps` - bound on full sweeps; the decomposition returned after
///   the budget is exhausted is the best rotation found so far
pub fn jacobi_eigen<const N: usize>(
    a: [[f64; N]; N],
    tol: f64,
    max_sweeps: usize,
) -> SymmetricEigen<N> {
    let mut a = a;
    // Accumulated rotations, starts as identity.
    let mut v = [[0.0; N]; N];
    for (m, row) in v.iter_mut().enumerate() {
        row[m] = 1.0;
    }

    for _ in 0..max_sweeps {
        if off_diagonal_norm(&a) <= tol {
            break;
        }
        for p in 0..N {
            for q in (p + 1)..N {
                if a[p][q].abs() <= tol {
                    continue;
                }
                rotate(&mut a, &mut v, p, q);
            }
        }
    }

    let mut out = SymmetricEigen {
        values: [0.0; N],
        vectors: [[0.0; N]; N],
    };
    for m in 0..N {
        out.values[m] = a[m][m];
        for r in 0..N {
            // Eigenvectors are the columns of the accumulated rotation.
            out.vectors[m][r] = v[r][m];
        }
    }
    sort_ascending(&mut out);
    out
}

/// One Jacobi rotation annihilating a[p][q].
fn rotate<const N: usize>(a: &mut [[f64; N]; N], v: &mut [[f64; N]; N], p: usize, q: usize) {
    let apq = a[p][q];
    let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
    // Stable tangent of the rotation angle.
    let t = if theta >= 0.0 {
        1.0 / (theta + (1.0 + theta * theta).sqrt())
    } else {
        1.0 / (theta - (1.0 + theta * theta).sqrt())
    };
    let c = 1.0 / (1.0 + t * t).sqrt();
    let s = t * c;
    let tau = s / (1.0 + c);

    let app = a[p][p];
    let aqq = a[q][q];
    a[p][p] = app - t * apq;
    a[q][q] = aqq + t * apq;
    a[p][q] = 0.0;
    a[q][p] = 0.0;

    for r in 0..N {
        if r != p && r != q {
            let arp = a[r][p];
            let arq = a[r][q];
            a[r][p] = arp - s * (arq + tau * arp);
            a[p][r] = a[r][p];
            a[r][q] = arq + s * (arp - tau * arq);
            a[q][r] = a[r][q];
        }
    }
    for r in 0..N {
        let vrp = v[r][p];
        let vrq = v[r][q];
        v[r][p] = vrp - s * (vrq + tau * vrp);
        v[r][q] = vrq + s * (vrp - tau * vrq);
    }
}

fn off_diagonal_norm<const N: usize>(a: &[[f64; N]; N]) -> f64 {
    let mut sum = 0.0;
    for p in 0..N {
        for q in (p + 1)..N {
            sum += a[p][q] * a[p][q];
        }
    }
    sum.sqrt()
}

fn sort_ascending<const N: usize>(e: &mut SymmetricEigen<N>) {
    for m in 0..N {
        let mut min = m;
        for r in (m + 1)..N {
            if e.values[r] < e.values[min] {
                min = r;
            }
        }
        if min != m {
            e.values.swap(m, min);
            e.vectors.swap(m, min);
        }
    }
}
