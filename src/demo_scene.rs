//! A minimal scene and camera for the `demo` binary: just enough geometry to
//! exercise [`crate::ray_tracer::RayTracer`] end to end and produce a PNG.
//! Not a feature-complete renderer — shading is flat Lambertian with a
//! single directional light, grounded in the teacher's `shapes/sphere.rs`
//! quadratic solver and `system.rs`'s camera-basis construction.

use crate::arena::{Arena, HitHandle};
use crate::direction::{Direction, Dot};
use crate::error::Result;
use crate::hit_tester::{HitTester, ShapeTest};
use crate::matrix::Matrix;
use crate::point::Point;
use crate::ray::Ray;
use crate::ray_tracer::{RayTracer, SceneTrace};

#[derive(Debug, Clone, Copy)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const fn new(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    pub const fn black() -> Color {
        Color::new(0.0, 0.0, 0.0)
    }

    pub fn gamma_2(self) -> Color {
        Color::new(self.r.sqrt(), self.g.sqrt(), self.b.sqrt())
    }
}

impl std::ops::Mul<f64> for Color {
    type Output = Color;
    fn mul(self, rhs: f64) -> Color {
        Color::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl std::ops::Add for Color {
    type Output = Color;
    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

/// A sphere with a flat albedo, solved with the classic `b^2 - 4ac`
/// quadratic (no analytic derivatives — the demo only needs a hit point and
/// a surface normal).
pub struct Sphere {
    pub origin: Point,
    pub radius: f64,
    pub albedo: Color,
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_discriminant = discriminant.sqrt();
    let q = if b > 0.0 {
        -0.5 * (b + sqrt_discriminant)
    } else {
        -0.5 * (b - sqrt_discriminant)
    };
    if q == 0.0 {
        return Some((0.0, 0.0));
    }
    let (mut t0, mut t1) = (q / a, c / q);
    if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
    }
    Some((t0, t1))
}

impl ShapeTest<Payload> for Sphere {
    fn test(&self, ray: Ray, arena: &mut Arena<Payload>) -> Result<Vec<HitHandle>> {
        let l = ray.origin - self.origin;
        let a = ray.direction.dot(ray.direction);
        let b = 2.0 * ray.direction.dot(l);
        let c = l.dot(l) - self.radius * self.radius;

        let (t0, t1) = match solve_quadratic(a, b, c) {
            Some(roots) => roots,
            None => return Ok(Vec::new()),
        };

        let mut hits = Vec::with_capacity(2);
        for t in [t0, t1] {
            if t < 0.0 {
                continue;
            }
            let hit_point = ray.endpoint(t);
            let normal = (hit_point - self.origin).normalize();
            hits.push(arena.allocate(
                t,
                Payload {
                    normal,
                    albedo: self.albedo,
                },
            )?);
        }
        Ok(hits)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Payload {
    pub normal: Direction,
    pub albedo: Color,
}

pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub light_direction: Direction,
    pub background: Color,
}

impl SceneTrace<Payload> for Scene {
    fn trace(&self, tester: &mut HitTester<Payload>, _ray: Ray) -> Result<()> {
        for sphere in &self.spheres {
            tester.test_world_geometry(sphere)?;
        }
        Ok(())
    }
}

impl Scene {
    pub fn shade(&self, tracer: &mut RayTracer<Payload>, ray: Ray) -> Result<Color> {
        let mut color = self.background;
        tracer.trace_closest_hit(ray, 0.0, self, |hit| {
            let lambertian = hit.payload.normal.dot(self.light_direction).max(0.0);
            color = hit.payload.albedo * (0.1 + 0.9 * lambertian);
            Ok(())
        })?;
        Ok(color)
    }
}

/// A pinhole camera, basis constructed the way `system::Camera::new` builds
/// its `camera_to_world` matrix from an eye point and a look-at target.
pub struct Camera {
    width: f64,
    height: f64,
    fov_factor: f64,
    camera_to_world: Matrix,
}

impl Camera {
    pub fn new(width: u32, height: u32, fov_degrees: f64, origin: Point, look_at: Point) -> Result<Camera> {
        let up = Direction::new(0.0, 1.0, 0.0);
        let z_axis = (origin - look_at).normalize();
        let x_axis = up.normalize().cross(z_axis).normalize();
        let y_axis = z_axis.cross(x_axis);

        let camera_to_world = Matrix::from_rows([
            [x_axis.x, x_axis.y, x_axis.z, 0.0],
            [y_axis.x, y_axis.y, y_axis.z, 0.0],
            [z_axis.x, z_axis.y, z_axis.z, 0.0],
            [origin.x, origin.y, origin.z, 1.0],
        ])?;

        Ok(Camera {
            width: width as f64,
            height: height as f64,
            fov_factor: (fov_degrees * 0.5).to_radians().tan(),
            camera_to_world,
        })
    }

    /// The primary ray through pixel-space coordinates `(pixel_u,
    /// pixel_v)`, as placed by an [`crate::image_sampler::ImageSampler`].
    pub fn ray(&self, pixel_u: f64, pixel_v: f64) -> Ray {
        let aspect_ratio = self.width / self.height;
        let ndc_x = pixel_u / self.width;
        let ndc_y = pixel_v / self.height;
        let cx = (2.0 * ndc_x - 1.0) * self.fov_factor * aspect_ratio;
        let cy = (1.0 - 2.0 * ndc_y) * self.fov_factor;

        let origin = self.camera_to_world.point_mul(Point::zero());
        let through = self.camera_to_world.point_mul(Point::new(cx, cy, -1.0));
        Ray::new(origin, (through - origin).normalize())
    }
}
