//! A reference-counted, invertible 4x4 transform.
//!
//! Follows a row-vector convention (`v' = v * M`, translation in the bottom
//! row) inherited from the teacher's original `Matrix44f`. A matrix and its
//! inverse are stored side by side in one `Arc`-backed allocation, so asking
//! a matrix for its inverse shares the refcount rather than allocating or
//! re-inverting; products of well-conditioned transforms compute their
//! inverse analytically from the factors' inverses instead of re-running
//! elimination.

use std::sync::Arc;

use log::warn;

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::point::Point;
use crate::ray::Ray;

type Rows = [[f64; 4]; 4];

const IDENTITY_ROWS: Rows = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[derive(Debug)]
struct MatrixData {
    forward: Rows,
    inverse: Rows,
}

/// An invertible matrix, or the absent/identity matrix (`None`, never
/// heap-allocated).
#[derive(Debug, Clone)]
pub struct Matrix {
    data: Option<Arc<MatrixData>>,
    inverted: bool,
}

impl Matrix {
    pub fn identity() -> Matrix {
        Matrix {
            data: None,
            inverted: false,
        }
    }

    fn from_data(forward: Rows, inverse: Rows) -> Matrix {
        Matrix {
            data: Some(Arc::new(MatrixData { forward, inverse })),
            inverted: false,
        }
    }

    /// Builds a matrix from 16 explicit row-major components, inverting by
    /// Gauss-Jordan elimination with full pivoting.
    pub fn from_rows(rows: Rows) -> Result<Matrix> {
        for row in &rows {
            for v in row {
                if !v.is_finite() {
                    return Err(Error::InvalidArgument(0));
                }
            }
        }

        let mut inverse = rows;
        invert_full_pivot(&mut inverse)?;
        Ok(Matrix::from_data(rows, inverse))
    }

    pub fn translation(d: Direction) -> Result<Matrix> {
        if !d.is_finite() {
            return Err(Error::InvalidArgument(0));
        }

        let forward = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [d.x, d.y, d.z, 1.0],
        ];
        let inverse = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [-d.x, -d.y, -d.z, 1.0],
        ];
        Ok(Matrix::from_data(forward, inverse))
    }

    pub fn scaling(d: Direction) -> Result<Matrix> {
        if !d.is_finite() || d.x == 0.0 || d.y == 0.0 || d.z == 0.0 {
            return Err(Error::InvalidArgument(0));
        }

        let forward = [
            [d.x, 0.0, 0.0, 0.0],
            [0.0, d.y, 0.0, 0.0],
            [0.0, 0.0, d.z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let inverse = [
            [1.0 / d.x, 0.0, 0.0, 0.0],
            [0.0, 1.0 / d.y, 0.0, 0.0],
            [0.0, 0.0, 1.0 / d.z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Ok(Matrix::from_data(forward, inverse))
    }

    /// Rotation by `angle` radians about `axis` (need not be unit length;
    /// rejected if zero). Uses Rodrigues' formula; the inverse is the
    /// transpose of the 3x3 block, which is exact because the block is
    /// orthogonal.
    pub fn rotation(angle: f64, axis: Direction) -> Result<Matrix> {
        if !angle.is_finite() || !axis.is_valid_direction() {
            return Err(Error::InvalidArgument(1));
        }

        let axis = axis.normalize();
        let (x, y, z) = (axis.x, axis.y, axis.z);
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;

        let block = [
            [t * x * x + c, t * x * y + s * z, t * x * z - s * y],
            [t * x * y - s * z, t * y * y + c, t * y * z + s * x],
            [t * x * z + s * y, t * y * z - s * x, t * z * z + c],
        ];

        let mut forward = IDENTITY_ROWS;
        let mut inverse = IDENTITY_ROWS;
        for i in 0..3 {
            for j in 0..3 {
                forward[i][j] = block[i][j];
                inverse[i][j] = block[j][i];
            }
        }

        Ok(Matrix::from_data(forward, inverse))
    }

    /// Orthographic projection, OpenGL-style conventions. Degenerate extents
    /// (`left == right`, `bottom == top`, `near == far`) are rejected.
    pub fn orthographic(
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    ) -> Result<Matrix> {
        for v in [left, right, bottom, top, near, far] {
            if !v.is_finite() {
                return Err(Error::InvalidArgument(0));
            }
        }
        if left == right || bottom == top || near == far {
            return Err(Error::InvalidArgumentCombination(0));
        }

        let (rl, tb, fn_) = (right - left, top - bottom, far - near);
        let forward = [
            [2.0 / rl, 0.0, 0.0, 0.0],
            [0.0, 2.0 / tb, 0.0, 0.0],
            [0.0, 0.0, -2.0 / fn_, 0.0],
            [-(right + left) / rl, -(top + bottom) / tb, -(far + near) / fn_, 1.0],
        ];
        let inverse = [
            [rl / 2.0, 0.0, 0.0, 0.0],
            [0.0, tb / 2.0, 0.0, 0.0],
            [0.0, 0.0, -fn_ / 2.0, 0.0],
            [(right + left) / 2.0, (top + bottom) / 2.0, -(far + near) / 2.0, 1.0],
        ];
        Ok(Matrix::from_data(forward, inverse))
    }

    /// Perspective frustum, OpenGL-style conventions. `near` and `far` must
    /// be strictly positive; all extents must be non-degenerate.
    pub fn frustum(
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    ) -> Result<Matrix> {
        for v in [left, right, bottom, top, near, far] {
            if !v.is_finite() {
                return Err(Error::InvalidArgument(0));
            }
        }
        if near <= 0.0 || far <= 0.0 {
            return Err(Error::InvalidArgumentCombination(4));
        }
        if left == right || bottom == top || near == far {
            return Err(Error::InvalidArgumentCombination(0));
        }

        let (rl, tb, fn_) = (right - left, top - bottom, far - near);
        let forward = [
            [2.0 * near / rl, 0.0, 0.0, 0.0],
            [0.0, 2.0 * near / tb, 0.0, 0.0],
            [
                (right + left) / rl,
                (top + bottom) / tb,
                -(far + near) / fn_,
                -1.0,
            ],
            [0.0, 0.0, -2.0 * far * near / fn_, 0.0],
        ];

        let mut inverse = forward;
        invert_full_pivot(&mut inverse)?;
        Ok(Matrix::from_data(forward, inverse))
    }

    /// `Product(A, B)`: forward is `A.forward * B.forward`, inverse is
    /// `B.inverse * A.inverse`, computed without a numerical re-inversion.
    pub fn product(a: &Matrix, b: &Matrix) -> Matrix {
        match (a.rows_or_none(), b.rows_or_none()) {
            (None, None) => Matrix::identity(),
            (Some(_), None) => a.clone(),
            (None, Some(_)) => b.clone(),
            (Some(af), Some(bf)) => {
                let forward = mat_mul(&af, &bf);
                let inverse = mat_mul(&b.inverse_rows(), &a.inverse_rows());
                Matrix::from_data(forward, inverse)
            }
        }
    }

    /// Returns a lightweight handle to this matrix's inverse, sharing the
    /// same underlying allocation and refcount.
    pub fn inverse(&self) -> Matrix {
        Matrix {
            data: self.data.clone(),
            inverted: !self.inverted,
        }
    }

    /// Row-major 4x4 read of this matrix; the absent matrix reads as the
    /// identity.
    pub fn read(&self) -> Rows {
        match &self.data {
            None => IDENTITY_ROWS,
            Some(d) => {
                if self.inverted {
                    d.inverse
                } else {
                    d.forward
                }
            }
        }
    }

    fn rows_or_none(&self) -> Option<Rows> {
        self.data.as_ref().map(|_| self.read())
    }

    fn inverse_rows(&self) -> Rows {
        self.inverse().read()
    }

    pub fn is_identity(&self) -> bool {
        self.data.is_none()
    }

    pub fn point_mul(&self, p: Point) -> Point {
        point_mul_rows(&self.read(), p)
    }

    pub fn point_inverse_mul(&self, p: Point) -> Point {
        point_mul_rows(&self.inverse_rows(), p)
    }

    /// Multiplies a vector (direction), ignoring translation.
    pub fn vector_mul(&self, v: Direction) -> Direction {
        vector_mul_rows(&self.read(), v)
    }

    pub fn vector_inverse_mul(&self, v: Direction) -> Direction {
        vector_mul_rows(&self.inverse_rows(), v)
    }

    /// Multiplies a vector by the transpose of this matrix's 3x3 block, the
    /// form used to transform surface normals.
    pub fn vector_transpose_mul(&self, v: Direction) -> Direction {
        vector_mul_rows_transposed(&self.read(), v)
    }

    pub fn vector_inverse_transpose_mul(&self, v: Direction) -> Direction {
        vector_mul_rows_transposed(&self.inverse_rows(), v)
    }

    pub fn ray_mul(&self, r: Ray) -> Ray {
        Ray::new(self.point_mul(r.origin), self.vector_mul(r.direction))
    }

    pub fn ray_inverse_mul(&self, r: Ray) -> Ray {
        Ray::new(
            self.point_inverse_mul(r.origin),
            self.vector_inverse_mul(r.direction),
        )
    }
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        const EPSILON: f64 = f64::EPSILON * 100.0;
        let a = self.read();
        let b = other.read();
        for i in 0..4 {
            for j in 0..4 {
                if (a[i][j] - b[i][j]).abs() > EPSILON {
                    return false;
                }
            }
        }
        true
    }
}

fn mat_mul(a: &Rows, b: &Rows) -> Rows {
    let mut result = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            result[i][j] =
                a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j] + a[i][3] * b[3][j];
        }
    }
    result
}

fn point_mul_rows(m: &Rows, p: Point) -> Point {
    let mut v = Point::new(
        p.x * m[0][0] + p.y * m[1][0] + p.z * m[2][0] + m[3][0],
        p.x * m[0][1] + p.y * m[1][1] + p.z * m[2][1] + m[3][1],
        p.x * m[0][2] + p.y * m[1][2] + p.z * m[2][2] + m[3][2],
    );
    let w = p.x * m[0][3] + p.y * m[1][3] + p.z * m[2][3] + m[3][3];
    if w != 1.0 && w != 0.0 {
        v /= w;
    }
    v
}

fn vector_mul_rows(m: &Rows, v: Direction) -> Direction {
    Direction::new(
        v.x * m[0][0] + v.y * m[1][0] + v.z * m[2][0],
        v.x * m[0][1] + v.y * m[1][1] + v.z * m[2][1],
        v.x * m[0][2] + v.y * m[1][2] + v.z * m[2][2],
    )
}

fn vector_mul_rows_transposed(m: &Rows, v: Direction) -> Direction {
    Direction::new(
        v.x * m[0][0] + v.y * m[0][1] + v.z * m[0][2],
        v.x * m[1][0] + v.y * m[1][1] + v.z * m[1][2],
        v.x * m[2][0] + v.y * m[2][1] + v.z * m[2][2],
    )
}

/// In-place Gauss-Jordan inversion with full pivoting (search the entire
/// remaining submatrix for the largest-magnitude candidate pivot, swap both
/// rows and columns into place, unscramble the column permutation at the
/// end). A row or column already used as a pivot is never selected again; a
/// zero pivot after elimination means the matrix is singular.
fn invert_full_pivot(a: &mut Rows) -> Result<()> {
    let n = 4;
    let mut used = [0u8; 4];
    let mut pivot_row = [0usize; 4];
    let mut pivot_col = [0usize; 4];

    for i in 0..n {
        let mut big = 0.0_f64;
        let mut irow = 0;
        let mut icol = 0;

        for j in 0..n {
            if used[j] != 1 {
                for k in 0..n {
                    if used[k] == 0 {
                        if a[j][k].abs() >= big {
                            big = a[j][k].abs();
                            irow = j;
                            icol = k;
                        }
                    } else if used[k] > 1 {
                        return Err(Error::ArithmeticError);
                    }
                }
            }
        }
        used[icol] += 1;

        if irow != icol {
            a.swap(irow, icol);
        }

        pivot_row[i] = irow;
        pivot_col[i] = icol;

        if a[icol][icol] == 0.0 {
            return Err(Error::ArithmeticError);
        }
        if a[icol][icol].abs() < 1e-8 {
            warn!("matrix inversion pivot {} is near-singular", a[icol][icol]);
        }

        let piv_inv = 1.0 / a[icol][icol];
        a[icol][icol] = 1.0;
        for k in 0..n {
            a[icol][k] *= piv_inv;
        }

        for ll in 0..n {
            if ll != icol {
                let dum = a[ll][icol];
                a[ll][icol] = 0.0;
                for l in 0..n {
                    a[ll][l] -= a[icol][l] * dum;
                }
            }
        }
    }

    for l in (0..n).rev() {
        if pivot_row[l] != pivot_col[l] {
            for k in 0..n {
                a[k].swap(pivot_row[l], pivot_col[l]);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use crate::test_utils::ApproxEq;

    #[test]
    fn identity_inverse_is_identity() {
        let m = Matrix::identity();
        assert_approx_eq!(m, m.inverse());
    }

    #[test]
    fn translation_round_trips_a_point() {
        let m = Matrix::translation(Direction::new(1.0, 2.0, 3.0)).unwrap();
        let p = Point::new(5.0, -1.0, 2.0);
        let transformed = m.point_mul(p);
        let back = m.point_inverse_mul(transformed);
        assert_approx_eq!(back, p);
    }

    #[test]
    fn scaling_rejects_zero_axis() {
        assert!(Matrix::scaling(Direction::new(1.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn rotation_round_trips_a_vector() {
        let m = Matrix::rotation(std::f64::consts::FRAC_PI_3, Direction::new(0.0, 0.0, 1.0))
            .unwrap();
        let v = Direction::new(1.0, 0.0, 0.0);
        let rotated = m.vector_mul(v);
        let back = m.vector_inverse_mul(rotated);
        assert_approx_eq!(back, v);
    }

    #[test]
    fn product_matches_sequential_application() {
        let a = Matrix::translation(Direction::new(1.0, 2.0, 3.0)).unwrap();
        let b = Matrix::scaling(Direction::new(2.0, 2.0, 2.0)).unwrap();
        let c = Matrix::product(&a, &b);

        let p = Point::new(1.0, 1.0, 1.0);
        let direct = b.point_mul(a.point_mul(p));
        let via_product = c.point_mul(p);
        assert_approx_eq!(direct, via_product);
    }

    #[test]
    fn product_inverse_recovers_input() {
        let a = Matrix::translation(Direction::new(1.0, 2.0, 3.0)).unwrap();
        let b = Matrix::scaling(Direction::new(2.0, 2.0, 2.0)).unwrap();
        let c = Matrix::product(&a, &b);

        let p = Point::new(1.0, 1.0, 1.0);
        let transformed = c.point_mul(p);
        let back = c.point_inverse_mul(transformed);
        assert_approx_eq!(back, p);
    }

    #[test]
    fn orthographic_inverse_round_trips_a_point() {
        let m = Matrix::orthographic(-1.0, 1.0, -1.0, 1.0, 1.0, 3.0).unwrap();
        let p = Point::new(0.0, 0.0, 0.0);
        let transformed = m.point_mul(p);
        let back = m.point_inverse_mul(transformed);
        assert_approx_eq!(back, p);
    }

    #[test]
    fn from_rows_rejects_singular_matrix() {
        let rows = [
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 4.0, 6.0, 8.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(Matrix::from_rows(rows).is_err());
    }

    #[test]
    fn from_rows_matches_known_inverse() {
        let rows = [
            [1.0, 3.0, 2.0, 4.0],
            [4.0, 2.0, 3.0, 5.0],
            [5.0, 4.0, 3.0, 1.0],
            [3.0, 1.0, 2.0, 4.0],
        ];
        let m = Matrix::from_rows(rows).unwrap();
        let expected_inverse = [
            [0.0, -20.0 / 12.0, 4.0 / 12.0, 24.0 / 12.0],
            [6.0 / 12.0, -20.0 / 12.0, 4.0 / 12.0, 18.0 / 12.0],
            [-9.0 / 12.0, 64.0 / 12.0, -8.0 / 12.0, -69.0 / 12.0],
            [3.0 / 12.0, -12.0 / 12.0, 0.0, 15.0 / 12.0],
        ];

        let actual = m.inverse_rows();
        for i in 0..4 {
            for j in 0..4 {
                assert!((actual[i][j] - expected_inverse[i][j]).abs() < 1e-9);
            }
        }
    }
}
