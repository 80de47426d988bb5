//! Exercises the public intersection-core API the way an integrator would:
//! building matrices, tracing rays through a small scene of shapes, and
//! walking both the closest-hit and all-hits entry points.

use std::ops::ControlFlow;

use raytracer::arena::{Arena, HitHandle};
use raytracer::direction::Direction;
use raytracer::error::Result;
use raytracer::hit_tester::ShapeTest;
use raytracer::matrix::Matrix;
use raytracer::point::Point;
use raytracer::ray::Ray;
use raytracer::ray_tracer::{RayTracer, SceneTrace};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Label(&'static str);

struct UnitSphereAtOrigin;

impl ShapeTest<Label> for UnitSphereAtOrigin {
    fn test(&self, ray: Ray, arena: &mut Arena<Label>) -> Result<Vec<HitHandle>> {
        let l = ray.origin - Point::zero();
        let a = ray.direction.dot_self();
        let b = 2.0 * ray.direction.dot_point(l);
        let c = l.dot_self() - 1.0;

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Ok(Vec::new());
        }

        let sqrt_d = discriminant.sqrt();
        let t0 = (-b - sqrt_d) / (2.0 * a);
        let t1 = (-b + sqrt_d) / (2.0 * a);

        let mut handles = Vec::new();
        for t in [t0, t1] {
            handles.push(arena.allocate(t, Label("sphere"))?);
        }
        Ok(handles)
    }
}

trait DotHelpers {
    fn dot_self(&self) -> f64;
    fn dot_point(&self, rhs: Direction) -> f64;
}

impl DotHelpers for Direction {
    fn dot_self(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
    fn dot_point(&self, rhs: Direction) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }
}

struct OffsetPlane {
    offset: f64,
}

impl ShapeTest<Label> for OffsetPlane {
    fn test(&self, ray: Ray, arena: &mut Arena<Label>) -> Result<Vec<HitHandle>> {
        if ray.direction.z.abs() < 1e-12 {
            return Ok(Vec::new());
        }
        let t = (self.offset - ray.origin.z) / ray.direction.z;
        Ok(vec![arena.allocate(t, Label("plane"))?])
    }
}

struct SphereAndPlaneWorld;

impl SceneTrace<Label> for SphereAndPlaneWorld {
    fn trace(&self, tester: &mut raytracer::hit_tester::HitTester<Label>, _ray: Ray) -> Result<()> {
        tester.test_world_geometry(&UnitSphereAtOrigin)?;
        tester.test_world_geometry(&OffsetPlane { offset: 10.0 })
    }
}

struct SphereTransformedAway {
    model_to_world: Matrix,
}

impl SceneTrace<Label> for SphereTransformedAway {
    fn trace(&self, tester: &mut raytracer::hit_tester::HitTester<Label>, _ray: Ray) -> Result<()> {
        tester.test_transformed_geometry(&UnitSphereAtOrigin, &self.model_to_world)
    }
}

#[test]
fn closest_hit_is_the_sphere_in_front_of_the_plane() {
    let mut tracer: RayTracer<Label> = RayTracer::new();
    let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));

    let mut seen = None;
    tracer
        .trace_closest_hit(ray, 0.0, &SphereAndPlaneWorld, |hit| {
            seen = Some((hit.payload, hit.distance));
            Ok(())
        })
        .unwrap();

    let (label, distance) = seen.expect("ray should hit the sphere");
    assert_eq!(label, Label("sphere"));
    assert!((distance - 4.0).abs() < 1e-9);
}

#[test]
fn all_hits_are_visited_in_increasing_distance_order() {
    let mut tracer: RayTracer<Label> = RayTracer::new();
    let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));

    let mut distances = Vec::new();
    tracer
        .trace_all_hits(ray, 0.0, &SphereAndPlaneWorld, |hit, _, _, _, _| {
            distances.push(hit.distance);
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();

    assert_eq!(distances.len(), 3);
    let mut sorted = distances.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(distances, sorted);
}

#[test]
fn transformed_geometry_round_trips_world_and_model_hit_points() {
    let model_to_world = Matrix::translation(Direction::new(10.0, 0.0, 0.0)).unwrap();
    let scene = SphereTransformedAway {
        model_to_world: model_to_world.clone(),
    };

    let mut tracer: RayTracer<Label> = RayTracer::new();
    let ray = Ray::new(Point::new(10.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));

    let mut world_point = None;
    let mut model_point = None;
    tracer
        .trace_closest_hit_with_coordinates(ray, 0.0, &scene, |_hit, _m, _viewer, model_hit, world_hit| {
            model_point = Some(model_hit);
            world_point = Some(world_hit);
            Ok(())
        })
        .unwrap();

    let world_point = world_point.expect("ray should hit the translated sphere");
    let model_point = model_point.expect("ray should hit the translated sphere");

    assert!((world_point.x - 10.0).abs() < 1e-6);
    assert!(model_point.x.abs() < 1e-6);
}

#[test]
fn a_ray_that_misses_every_shape_yields_no_closest_hit() {
    let mut tracer: RayTracer<Label> = RayTracer::new();
    let ray = Ray::new(Point::new(100.0, 100.0, -5.0), Direction::new(0.0, 0.0, 1.0));

    let mut called = false;
    tracer
        .trace_closest_hit(ray, 0.0, &SphereAndPlaneWorld, |_| {
            called = true;
            Ok(())
        })
        .unwrap();

    assert!(!called);
}

#[test]
fn negative_minimum_distance_is_rejected() {
    let mut tracer: RayTracer<Label> = RayTracer::new();
    let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Direction::new(0.0, 0.0, 1.0));

    let err = tracer.trace_closest_hit(ray, -1.0, &SphereAndPlaneWorld, |_| Ok(()));
    assert!(err.is_err());
}
