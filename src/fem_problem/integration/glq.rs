use nalgebra::{DMatrix, SymmetricEigen};

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights over `(-1, 1)`
///
/// The points are sorted in ascending order. An n-point rule integrates polynomials of degree `2n - 1` exactly.
///
/// ```
/// use fem_kernel::fem_problem::integration::glq::*;
///
/// let (points, weights) = gauss_quadrature_points(10);
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// Golub-Welsch: the points are the eigenvalues of the Jacobi matrix of the Legendre recurrence
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let jacobi_mat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(jacobi_mat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| weight.powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    xw.drain(0..).unzip()
}
