//! The top-level entry points that validate arguments, reset the hit
//! tester, run the scene's trace callback, and hand the result to a
//! process-hit callback. Grounded in `iris/ray_tracer.c`.

use std::ops::ControlFlow;

use log::debug;

use crate::arena::Hit;
use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::hit_tester::HitTester;
use crate::matrix::Matrix;
use crate::point::Point;
use crate::ray::Ray;

/// A scene (or a single top-level shape) that knows how to drive the hit
/// tester for one ray. Implementors call one or more of the tester's
/// `TestGeometry` variants.
pub trait SceneTrace<P: Clone> {
    fn trace(&self, tester: &mut HitTester<P>, ray: Ray) -> Result<()>;
}

/// Owns the hit tester (and, transitively, its hit arena) for the lifetime
/// of a render job. One `RayTracer` is duplicated per worker the same way
/// the teacher's `Camera`/`ImageSampler` pair is.
pub struct RayTracer<P: Clone> {
    tester: HitTester<P>,
}

impl<P: Clone> RayTracer<P> {
    pub fn new() -> RayTracer<P> {
        RayTracer {
            tester: HitTester::new(),
        }
    }

    pub fn farthest_hit_allowed(&self) -> f64 {
        self.tester.farthest_hit_allowed()
    }

    fn validate_minimum_distance(minimum_distance: f64, position: u32) -> Result<()> {
        if !minimum_distance.is_finite() || minimum_distance < 0.0 {
            return Err(Error::InvalidArgument(position));
        }
        Ok(())
    }

    /// Traces `ray`, invoking `process_hit` once with the closest
    /// admissible hit, if any exists.
    pub fn trace_closest_hit<S, F>(
        &mut self,
        ray: Ray,
        minimum_distance: f64,
        scene: &S,
        mut process_hit: F,
    ) -> Result<()>
    where
        S: SceneTrace<P>,
        F: FnMut(&Hit<P>) -> Result<()>,
    {
        ray.validate(0)?;
        Self::validate_minimum_distance(minimum_distance, 1)?;
        debug!("trace_closest_hit: minimum_distance={minimum_distance}");

        self.tester.reset(ray, minimum_distance);
        scene.trace(&mut self.tester, ray)?;

        if let Some(hit) = self.tester.closest_hit() {
            if hit.distance.is_finite() {
                process_hit(hit)?;
            }
        }

        Ok(())
    }

    /// As [`RayTracer::trace_closest_hit`], but reconstructs model/world
    /// hit points (and a model-space viewer direction) before invoking
    /// `process_hit`, following the three-way branch in
    /// `RayTracerProcessHitWithContext`:
    ///
    /// - no `model_to_world`: both hit points equal the recorded model hit
    ///   point (if the shape supplied one) or `ray.endpoint(t)`.
    /// - premultiplied: world hit point from `ray.endpoint(t)`; model hit
    ///   point from the world point mapped through `model_to_world`'s
    ///   inverse.
    /// - otherwise (transformed): world hit point from `ray.endpoint(t)`;
    ///   model hit point from the shape's recorded point, or else the same
    ///   inverse-multiply.
    pub fn trace_closest_hit_with_coordinates<S, F>(
        &mut self,
        ray: Ray,
        minimum_distance: f64,
        scene: &S,
        mut process_hit: F,
    ) -> Result<()>
    where
        S: SceneTrace<P>,
        F: FnMut(&Hit<P>, Option<&Matrix>, Direction, Point, Point) -> Result<()>,
    {
        ray.validate(0)?;
        Self::validate_minimum_distance(minimum_distance, 1)?;
        debug!("trace_closest_hit_with_coordinates: minimum_distance={minimum_distance}");

        self.tester.reset(ray, minimum_distance);
        scene.trace(&mut self.tester, ray)?;

        let hit = match self.tester.closest_hit() {
            Some(hit) if hit.distance.is_finite() => hit,
            _ => return Ok(()),
        };

        let (model_hit_point, world_hit_point) = reconstruct_hit_points(hit, ray);
        let model_viewer = match &hit.model_to_world {
            Some(m) => m.vector_inverse_mul(-ray.direction).normalize(),
            None => (-ray.direction).normalize(),
        };

        process_hit(
            hit,
            hit.model_to_world.as_ref(),
            model_viewer,
            model_hit_point,
            world_hit_point,
        )
    }

    /// Traces `ray`, then invokes `process_hit` once per admissible hit in
    /// increasing distance order. A callback returning
    /// `ControlFlow::Break(())` stops the walk early; this crate does not
    /// distinguish that from exhausting the list, matching the upstream
    /// behavior where callers cannot tell "done at hit 0" from "done at hit
    /// n" from the return status alone.
    pub fn trace_all_hits<S, F>(
        &mut self,
        ray: Ray,
        minimum_distance: f64,
        scene: &S,
        mut process_hit: F,
    ) -> Result<()>
    where
        S: SceneTrace<P>,
        F: FnMut(&Hit<P>, Option<&Matrix>, Direction, Point, Point) -> Result<ControlFlow<()>>,
    {
        ray.validate(0)?;
        Self::validate_minimum_distance(minimum_distance, 1)?;
        debug!("trace_all_hits: minimum_distance={minimum_distance}");

        self.tester.reset_collecting(ray, minimum_distance);
        scene.trace(&mut self.tester, ray)?;

        for handle in self.tester.collected_hits_sorted() {
            let hit = self.tester.hit(handle);
            let (model_hit_point, world_hit_point) = reconstruct_hit_points(hit, ray);
            let model_viewer = match &hit.model_to_world {
                Some(m) => m.vector_inverse_mul(-ray.direction).normalize(),
                None => (-ray.direction).normalize(),
            };

            let flow = process_hit(
                hit,
                hit.model_to_world.as_ref(),
                model_viewer,
                model_hit_point,
                world_hit_point,
            )?;

            if flow == ControlFlow::Break(()) {
                break;
            }
        }

        Ok(())
    }
}

impl<P: Clone> Default for RayTracer<P> {
    fn default() -> Self {
        RayTracer::new()
    }
}

fn reconstruct_hit_points<P>(hit: &Hit<P>, ray: Ray) -> (Point, Point) {
    match (&hit.model_to_world, hit.premultiplied) {
        (None, _) => {
            let p = hit.model_hit_point.unwrap_or_else(|| ray.endpoint(hit.distance));
            (p, p)
        }
        (Some(model_to_world), true) => {
            let world = ray.endpoint(hit.distance);
            let model = model_to_world.point_inverse_mul(world);
            (model, world)
        }
        (Some(model_to_world), false) => {
            let world = ray.endpoint(hit.distance);
            let model = hit
                .model_hit_point
                .unwrap_or_else(|| model_to_world.point_inverse_mul(world));
            (model, world)
        }
    }
}
