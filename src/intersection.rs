//! Reconstructs model- and world-space hit points and derivatives from a
//! ray differential and a surface normal. Grounded in
//! `iris_advanced/intersection.h`.

use crate::direction::{Direction, Dot};
use crate::point::Point;
use crate::ray_differential::RayDifferential;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NormalCoordinateSpace {
    Model,
    World,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Intersection {
    pub model_hit_point: Point,
    pub world_hit_point: Point,
    pub model_dp_dx: Direction,
    pub model_dp_dy: Direction,
    pub world_dp_dx: Direction,
    pub world_dp_dy: Direction,
    pub has_derivatives: bool,
}

impl Intersection {
    /// `distance` is the hit's parametric t along both `model_ray.ray` and
    /// `world_ray.ray`; `normal` is the surface normal at the hit, expressed
    /// in whichever of the two spaces `normal_space` names.
    pub fn new(
        model_ray: RayDifferential,
        world_ray: RayDifferential,
        normal: Direction,
        normal_space: NormalCoordinateSpace,
        distance: f64,
    ) -> Intersection {
        debug_assert_eq!(model_ray.has_differentials, world_ray.has_differentials);

        let model_hit_point = model_ray.ray.endpoint(distance);
        let world_hit_point = world_ray.ray.endpoint(distance);

        let mut result = Intersection {
            model_hit_point,
            world_hit_point,
            model_dp_dx: Direction::zero(),
            model_dp_dy: Direction::zero(),
            world_dp_dx: Direction::zero(),
            world_dp_dy: Direction::zero(),
            has_derivatives: false,
        };

        if !model_ray.has_differentials {
            return result;
        }

        let (differential, hit_point) = match normal_space {
            NormalCoordinateSpace::Model => (&model_ray, model_hit_point),
            NormalCoordinateSpace::World => (&world_ray, world_hit_point),
        };

        let plane_distance = normal.dot(hit_point);

        let tx = -(normal.dot(differential.rx.origin) - plane_distance)
            / normal.dot(differential.rx.direction);
        if !tx.is_finite() {
            return result;
        }

        let ty = -(normal.dot(differential.ry.origin) - plane_distance)
            / normal.dot(differential.ry.direction);
        if !ty.is_finite() {
            return result;
        }

        result.model_dp_dx = model_ray.rx.endpoint(tx) - model_hit_point;
        result.model_dp_dy = model_ray.ry.endpoint(ty) - model_hit_point;
        result.world_dp_dx = world_ray.rx.endpoint(tx) - world_hit_point;
        result.world_dp_dy = world_ray.ry.endpoint(ty) - world_hit_point;
        result.has_derivatives = true;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;
    use crate::ray::Ray;
    use crate::ray_differential::RayDifferential;

    #[test]
    fn no_differentials_suppresses_derivatives() {
        let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));
        let d = RayDifferential::without_differentials(ray).unwrap();
        let normal = Direction::new(0.0, 0.0, -1.0);
        let i = Intersection::new(d, d, normal, NormalCoordinateSpace::World, 5.0);
        assert!(!i.has_derivatives);
        assert_eq!(i.world_hit_point, Point::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn parallel_offset_ray_suppresses_derivatives() {
        let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));
        let rx = Ray::new(Point::new(1.0, 0.0, -5.0), Direction::new(0.0, 1.0, 0.0));
        let ry = ray;
        let d = RayDifferential::new(ray, rx, ry).unwrap();
        let normal = Direction::new(0.0, 0.0, -1.0);
        let i = Intersection::new(d, d, normal, NormalCoordinateSpace::World, 5.0);
        assert!(!i.has_derivatives);
    }

    #[test]
    fn offset_rays_produce_finite_derivatives_on_a_plane() {
        let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));
        let rx = Ray::new(Point::new(0.1, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));
        let ry = Ray::new(Point::new(0.0, 0.1, -5.0), Direction::new(0.0, 0.0, 1.0));
        let d = RayDifferential::new(ray, rx, ry).unwrap();
        let normal = Direction::new(0.0, 0.0, -1.0);
        let i = Intersection::new(d, d, normal, NormalCoordinateSpace::World, 5.0);
        assert!(i.has_derivatives);
        assert!(i.world_dp_dx.is_finite());
        assert!(i.world_dp_dy.is_finite());
    }
}
