//! Per-ray closest-hit selection and nested-geometry recursion. Grounded in
//! `iris/hit_tester.c`.
//!
//! The source threads an opaque `hit_data` context through the allocator so
//! a shape callback's nested calls can stamp freshly-allocated hits with the
//! right payload without knowing it ahead of time. This crate's [`Arena`] is
//! generic over a `Copy`/`Clone` payload type instead, so a [`ShapeTest`]
//! implementor already owns whatever payload it wants to attach and passes
//! it straight to `arena.allocate(..)` — there is nothing left to swap in
//! and back out around a nested call.

use crate::arena::{Arena, Hit, HitHandle};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::ray::Ray;

/// A shape (or composite of shapes) that can be tested against a ray.
/// Returns the handles of every hit it allocated, in the order it wants
/// them considered; an empty vector means no intersection.
pub trait ShapeTest<P: Clone> {
    fn test(&self, ray: Ray, arena: &mut Arena<P>) -> Result<Vec<HitHandle>>;
}

/// Selection discipline for the current ray: `ClosestHit` keeps only the
/// single nearest admissible hit (discarding every other allocation after
/// each `TestGeometry` call, per `iris/hit_tester.c`); `AllHits` is this
/// crate's extension for `RayTracer::trace_all_hits`, which needs every
/// admissible hit rather than just the winner, so it retains them all
/// instead of pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ClosestHit,
    AllHits,
}

pub struct HitTester<P: Clone> {
    arena: Arena<P>,
    world_ray: Ray,
    current_model_ray: Ray,
    minimum_distance: f64,
    maximum_distance: f64,
    closest: Option<HitHandle>,
    collected: Vec<HitHandle>,
    mode: Mode,
}

impl<P: Clone> HitTester<P> {
    pub fn new() -> HitTester<P> {
        let zero_ray = Ray::new(
            crate::point::Point::zero(),
            crate::direction::Direction::new(0.0, 0.0, 1.0),
        );
        HitTester {
            arena: Arena::new(),
            world_ray: zero_ray,
            current_model_ray: zero_ray,
            minimum_distance: 0.0,
            maximum_distance: f64::INFINITY,
            closest: None,
            collected: Vec::new(),
            mode: Mode::ClosestHit,
        }
    }

    /// Resets the tester for a new ray: clears the arena, forgets the
    /// previous closest hit, and reopens the admissible distance window to
    /// `[minimum_distance, +inf)`.
    pub fn reset(&mut self, world_ray: Ray, minimum_distance: f64) {
        self.arena.free_all();
        self.world_ray = world_ray;
        self.current_model_ray = world_ray;
        self.minimum_distance = minimum_distance;
        self.maximum_distance = f64::INFINITY;
        self.closest = None;
        self.collected.clear();
        self.mode = Mode::ClosestHit;
    }

    /// Resets as [`HitTester::reset`], but puts the tester into
    /// [`Mode::AllHits`] for the duration of this ray, so every admissible
    /// hit is retained in distance order rather than pruned to the single
    /// closest.
    pub fn reset_collecting(&mut self, world_ray: Ray, minimum_distance: f64) {
        self.reset(world_ray, minimum_distance);
        self.mode = Mode::AllHits;
    }

    /// Valid only after a `reset_collecting`-driven trace: every admissible
    /// hit, sorted by increasing distance.
    pub fn collected_hits_sorted(&self) -> Vec<HitHandle> {
        let mut handles = self.collected.clone();
        handles.sort_by(|&a, &b| {
            self.arena
                .get(a)
                .distance
                .partial_cmp(&self.arena.get(b).distance)
                .expect("hit distances are always finite")
        });
        handles
    }

    pub fn hit(&self, handle: HitHandle) -> &Hit<P> {
        self.arena.get(handle)
    }

    pub fn world_ray(&self) -> Ray {
        self.world_ray
    }

    /// The tightest upper bound on admissible distance seen so far; shapes
    /// may use this to prune their own intersection search early.
    pub fn farthest_hit_allowed(&self) -> f64 {
        self.maximum_distance
    }

    pub fn closest_hit(&self) -> Option<&Hit<P>> {
        self.closest.map(|h| self.arena.get(h))
    }

    /// Tests geometry whose callback already operates directly in world
    /// coordinates and has no model transform of its own.
    pub fn test_world_geometry<S: ShapeTest<P>>(&mut self, shape: &S) -> Result<()> {
        self.current_model_ray = self.world_ray;
        let hits = shape.test(self.world_ray, &mut self.arena)?;
        self.select_closest(hits, None, false)
    }

    /// Tests geometry that has a `model_to_world` transform but whose
    /// intersection test is numerically performed in world coordinates
    /// (the transform has already been baked into the shape's data).
    pub fn test_premultiplied_geometry<S: ShapeTest<P>>(
        &mut self,
        shape: &S,
        model_to_world: &Matrix,
    ) -> Result<()> {
        self.current_model_ray = self.world_ray;
        let hits = shape.test(self.world_ray, &mut self.arena)?;
        self.select_closest(hits, Some(model_to_world.clone()), true)
    }

    /// Tests geometry in its own model coordinates, transforming the world
    /// ray into model space first.
    pub fn test_transformed_geometry<S: ShapeTest<P>>(
        &mut self,
        shape: &S,
        model_to_world: &Matrix,
    ) -> Result<()> {
        let model_ray = model_to_world.ray_inverse_mul(self.world_ray);
        self.current_model_ray = model_ray;
        let hits = shape.test(model_ray, &mut self.arena)?;
        self.select_closest(hits, Some(model_to_world.clone()), false)
    }

    /// The union of [`HitTester::test_premultiplied_geometry`] and
    /// [`HitTester::test_transformed_geometry`], dispatching on
    /// `premultiplied`; `model_to_world` absent dispatches to
    /// [`HitTester::test_world_geometry`].
    pub fn test_geometry<S: ShapeTest<P>>(
        &mut self,
        shape: &S,
        model_to_world: Option<&Matrix>,
        premultiplied: bool,
    ) -> Result<()> {
        match model_to_world {
            None => self.test_world_geometry(shape),
            Some(m) if premultiplied => self.test_premultiplied_geometry(shape, m),
            Some(m) => self.test_transformed_geometry(shape, m),
        }
    }

    /// Recurses into a composite shape's children from within an enclosing
    /// shape callback. Runs `shape` against the ray currently being tested
    /// (in whatever coordinate space the enclosing call established) and
    /// returns its hits directly, without consulting or perturbing the
    /// tester's closest-hit state.
    pub fn test_nested_geometry<S: ShapeTest<P>>(&mut self, shape: &S) -> Result<Vec<HitHandle>> {
        shape.test(self.current_model_ray, &mut self.arena)
    }

    fn select_closest(
        &mut self,
        hits: Vec<HitHandle>,
        model_to_world: Option<Matrix>,
        premultiplied: bool,
    ) -> Result<()> {
        for handle in hits {
            let distance = self.arena.get(handle).distance;
            if distance < self.minimum_distance || distance > self.maximum_distance {
                continue;
            }

            {
                let hit = self.arena.get_mut(handle);
                hit.model_to_world = model_to_world.clone();
                hit.premultiplied = premultiplied;
            }

            match self.mode {
                Mode::ClosestHit => {
                    self.maximum_distance = distance;
                    self.closest = Some(handle);
                }
                Mode::AllHits => {
                    self.collected.push(handle);
                }
            }
        }

        if self.mode == Mode::ClosestHit {
            self.closest = match self.closest {
                Some(handle) => Some(self.arena.free_all_except(handle)),
                None => {
                    self.arena.free_all();
                    None
                }
            };
        }

        Ok(())
    }
}

impl<P: Clone> Default for HitTester<P> {
    fn default() -> Self {
        HitTester::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::point::Point;

    struct FixedHits(Vec<f64>);

    impl ShapeTest<&'static str> for FixedHits {
        fn test(&self, _ray: Ray, arena: &mut Arena<&'static str>) -> Result<Vec<HitHandle>> {
            self.0
                .iter()
                .map(|&d| arena.allocate(d, "x"))
                .collect::<Result<Vec<_>>>()
        }
    }

    fn ray() -> Ray {
        Ray::new(Point::new(1.0, 2.0, 3.0), Direction::new(4.0, 5.0, 6.0))
    }

    #[test]
    fn closest_hit_wins_across_two_calls() {
        let mut tester: HitTester<&'static str> = HitTester::new();
        tester.reset(ray(), 0.0);

        tester.test_world_geometry(&FixedHits(vec![3.0])).unwrap();
        tester.test_world_geometry(&FixedHits(vec![1.0])).unwrap();

        assert_eq!(tester.farthest_hit_allowed(), 1.0);
        assert_eq!(tester.closest_hit().unwrap().distance, 1.0);
    }

    #[test]
    fn distance_window_rejects_hits_outside_range() {
        let mut tester: HitTester<&'static str> = HitTester::new();
        tester.reset(ray(), 10.0);
        tester.maximum_distance = 20.0;

        let descending: Vec<f64> = (1..=1000).rev().map(|x| x as f64).collect();
        tester.test_world_geometry(&FixedHits(descending)).unwrap();

        assert_eq!(tester.closest_hit().unwrap().distance, 10.0);
        assert_eq!(tester.farthest_hit_allowed(), 10.0);
    }

    struct NestedSix;

    impl ShapeTest<&'static str> for NestedSix {
        fn test(&self, ray: Ray, arena: &mut Arena<&'static str>) -> Result<Vec<HitHandle>> {
            let _ = ray;
            [1.0, 0.0, 3.0, 2.0, 5.0, 4.0]
                .iter()
                .map(|&d| arena.allocate(d, "nested"))
                .collect::<Result<Vec<_>>>()
        }
    }

    #[test]
    fn nested_geometry_preserves_order_and_does_not_touch_closest_hit() {
        let mut tester: HitTester<&'static str> = HitTester::new();
        tester.reset(ray(), 0.0);
        tester.test_world_geometry(&FixedHits(vec![100.0])).unwrap();

        let nested_handles = tester.test_nested_geometry(&NestedSix {}).unwrap();
        let distances: Vec<f64> = nested_handles
            .iter()
            .map(|&h| tester.arena.get(h).distance)
            .collect();
        assert_eq!(distances, vec![1.0, 0.0, 3.0, 2.0, 5.0, 4.0]);

        assert_eq!(tester.closest_hit().unwrap().distance, 100.0);
    }
}
