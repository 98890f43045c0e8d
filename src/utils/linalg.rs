// src/utils/linalg.rs

use nalgebra::{Matrix3, Vector3};

/// Lattice determinants below this magnitude are treated as degenerate.
pub const DEGENERATE_DET: f64 = 1e-8;

/// Row matrix of lattice vectors: row k is the k-th lattice vector.
pub fn lattice_matrix(lattice: &[[f64; 3]; 3]) -> Matrix3<f64> {
  Matrix3::from_row_slice(&[
    lattice[0][0],
    lattice[0][1],
    lattice[0][2],
    lattice[1][0],
    lattice[1][1],
    lattice[1][2],
    lattice[2][0],
    lattice[2][1],
    lattice[2][2],
  ])
}

/// Signed cell volume (determinant of the row matrix).
pub fn determinant(lattice: &[[f64; 3]; 3]) -> f64 {
  lattice_matrix(lattice).determinant()
}

/// Convert fractional coordinates to Cartesian using lattice matrix
///
/// # Formula
/// ```text
/// Cartesian = Lattice^T × Fractional
/// ```
pub fn frac_to_cart(frac: [f64; 3], lattice: &[[f64; 3]; 3]) -> [f64; 3] {
  let cart_vec = lattice_matrix(lattice).transpose() * Vector3::from(frac);
  [cart_vec.x, cart_vec.y, cart_vec.z]
}

/// Convert Cartesian coordinates to fractional using lattice matrix
///
/// Returns `None` if the lattice is singular.
///
/// # Formula
/// ```text
/// Fractional = (Lattice^T)^-1 × Cartesian
/// ```
pub fn cart_to_frac(cart: [f64; 3], lattice: &[[f64; 3]; 3]) -> Option<[f64; 3]> {
  let inv_lat = lattice_matrix(lattice).transpose().try_inverse()?;
  let frac_vec = inv_lat * Vector3::from(cart);
  Some([frac_vec.x, frac_vec.y, frac_vec.z])
}

/// Distance between adjacent lattice planes for each axis.
///
/// `d_k = |V| / |a_(k+1) × a_(k+2)|`. Any image further than `n` planes away
/// along axis k is at least `n * d_k` from the origin cell.
pub fn interplanar_spacings(lattice: &[[f64; 3]; 3]) -> [f64; 3] {
  let rows = [
    Vector3::from(lattice[0]),
    Vector3::from(lattice[1]),
    Vector3::from(lattice[2]),
  ];
  let volume = determinant(lattice).abs();
  let mut spacings = [0.0; 3];
  for (k, spacing) in spacings.iter_mut().enumerate() {
    let area = rows[(k + 1) % 3].cross(&rows[(k + 2) % 3]).norm();
    *spacing = if area > 0.0 { volume / area } else { 0.0 };
  }
  spacings
}

/// Lattice rows from lengths (Å) and angles (degrees).
///
/// `a` lies along x and `b` in the xy plane. Returns `None` when the angles
/// cannot close a cell.
pub fn lattice_from_lengths_and_angles(abc: [f64; 3], angles: [f64; 3]) -> Option<[[f64; 3]; 3]> {
  let [a, b, c] = abc;
  let to_rad = std::f64::consts::PI / 180.0;
  let (alpha, beta, gamma) = (angles[0] * to_rad, angles[1] * to_rad, angles[2] * to_rad);

  let v_sq = 1.0 - alpha.cos().powi(2) - beta.cos().powi(2) - gamma.cos().powi(2)
    + 2.0 * alpha.cos() * beta.cos() * gamma.cos();
  if v_sq <= 0.0 || gamma.sin().abs() < 1e-12 {
    return None;
  }
  let v = v_sq.sqrt();

  Some([
    [a, 0.0, 0.0],
    [b * gamma.cos(), b * gamma.sin(), 0.0],
    [
      c * beta.cos(),
      c * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin(),
      c * v / gamma.sin(),
    ],
  ])
}

pub fn norm(v: [f64; 3]) -> f64 {
  Vector3::from(v).norm()
}
