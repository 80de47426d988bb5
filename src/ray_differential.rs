//! A ray bundled with two offset rays used to propagate screen-space
//! derivatives for texture filtering. Grounded in
//! `iris_advanced/ray_differential.h`.

use crate::error::Result;
use crate::matrix::Matrix;
use crate::ray::Ray;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayDifferential {
    pub ray: Ray,
    pub rx: Ray,
    pub ry: Ray,
    pub has_differentials: bool,
}

impl RayDifferential {
    /// Builds a differential with distinct offset rays.
    pub fn new(ray: Ray, rx: Ray, ry: Ray) -> Result<RayDifferential> {
        ray.validate(0)?;
        rx.validate(1)?;
        ry.validate(2)?;
        Ok(RayDifferential {
            ray,
            rx,
            ry,
            has_differentials: true,
        })
    }

    /// Builds a differential with no usable offsets; `rx`/`ry` default to
    /// the primary ray.
    pub fn without_differentials(ray: Ray) -> Result<RayDifferential> {
        ray.validate(0)?;
        Ok(RayDifferential {
            ray,
            rx: ray,
            ry: ray,
            has_differentials: false,
        })
    }

    pub fn validate(&self) -> bool {
        self.ray.origin.is_finite()
            && self.ray.direction.is_valid_direction()
            && self.rx.origin.is_finite()
            && self.rx.direction.is_valid_direction()
            && self.ry.origin.is_finite()
            && self.ry.direction.is_valid_direction()
    }

    pub fn matrix_mul(&self, m: &Matrix) -> RayDifferential {
        RayDifferential {
            ray: m.ray_mul(self.ray),
            rx: m.ray_mul(self.rx),
            ry: m.ray_mul(self.ry),
            has_differentials: self.has_differentials,
        }
    }

    pub fn matrix_inverse_mul(&self, m: &Matrix) -> RayDifferential {
        RayDifferential {
            ray: m.ray_inverse_mul(self.ray),
            rx: m.ray_inverse_mul(self.rx),
            ry: m.ray_inverse_mul(self.ry),
            has_differentials: self.has_differentials,
        }
    }

    pub fn normalize(&self) -> RayDifferential {
        let normalize_ray = |r: Ray| Ray::new(r.origin, r.direction.normalize());
        RayDifferential {
            ray: normalize_ray(self.ray),
            rx: normalize_ray(self.rx),
            ry: normalize_ray(self.ry),
            has_differentials: self.has_differentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use crate::direction::Direction;
    use crate::point::Point;
    use crate::test_utils::ApproxEq;

    fn sample_ray() -> Ray {
        Ray::new(Point::new(1.0, 2.0, 3.0), Direction::new(4.0, 5.0, 6.0))
    }

    #[test]
    fn without_differentials_defaults_offsets_to_primary() {
        let d = RayDifferential::without_differentials(sample_ray()).unwrap();
        assert!(!d.has_differentials);
        assert_eq!(d.rx, d.ray);
        assert_eq!(d.ry, d.ray);
    }

    #[test]
    fn matrix_round_trip() {
        let m = Matrix::translation(Direction::new(1.0, 2.0, 3.0)).unwrap();
        let d = RayDifferential::new(sample_ray(), sample_ray(), sample_ray()).unwrap();
        let transformed = d.matrix_mul(&m);
        let back = transformed.matrix_inverse_mul(&m);
        assert_approx_eq!(back.ray, d.ray);
        assert_approx_eq!(back.rx, d.rx);
        assert_approx_eq!(back.ry, d.ry);
    }
}
