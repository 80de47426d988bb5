//! A per-ray bump allocator for hits. Grounded in `iris/hit_allocator.c`:
//! allocations are never individually freed, only collectively reclaimed by
//! [`Arena::free_all_except`] (after a closest-hit walk) or
//! [`Arena::free_all`] (between rays). The backing storage grows to the
//! render's high-water mark and is then reused, never shrunk.
//!
//! The source represents a hit's caller data as an untyped `(pointer, size,
//! align)` triple copied by raw `memcpy`. This crate takes the alternative
//! the design notes call out: the arena is generic over one `Copy` payload
//! type chosen by the integrator, so hits carry typed data without unsafe
//! casts.

use log::trace;

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::point::Point;

/// An opaque, stable reference to one hit inside an [`Arena`]. Invalidated
/// by [`Arena::free_all_except`] (for every handle but the one passed in)
/// and by [`Arena::free_all`].
pub type HitHandle = usize;

#[derive(Debug, Clone)]
pub struct Hit<P> {
    pub distance: f64,
    pub payload: P,
    pub model_hit_point: Option<Point>,
    pub model_to_world: Option<Matrix>,
    pub premultiplied: bool,
}

impl<P> Hit<P> {
    fn new(distance: f64, payload: P, model_hit_point: Option<Point>) -> Hit<P> {
        Hit {
            distance,
            payload,
            model_hit_point,
            model_to_world: None,
            premultiplied: false,
        }
    }
}

pub struct Arena<P> {
    storage: Vec<Hit<P>>,
    cursor: usize,
}

impl<P: Clone> Default for Arena<P> {
    fn default() -> Self {
        Arena::new()
    }
}

impl<P: Clone> Arena<P> {
    pub fn new() -> Arena<P> {
        Arena {
            storage: Vec::new(),
            cursor: 0,
        }
    }

    /// Allocates a hit with no recorded model-space hit point. `distance`
    /// must be finite.
    pub fn allocate(&mut self, distance: f64, payload: P) -> Result<HitHandle> {
        if !distance.is_finite() {
            return Err(Error::InvalidArgument(0));
        }
        self.push(Hit::new(distance, payload, None))
    }

    /// Allocates a hit that additionally records the model-space hit point
    /// computed by the shape callback (so the ray tracer need not
    /// reconstruct it via an inverse-matrix multiply later).
    ///
    /// Argument-position note: a non-finite `hit_point` fails with position
    /// 8, matching `HitAllocatorAllocateWithHitPoint`'s own signature order;
    /// this differs from the no-hit-point variant above, which instead uses
    /// position 0 for its (differently-ordered) distance check. The
    /// asymmetry is intentional upstream and preserved here rather than
    /// unified behind a shared helper.
    pub fn allocate_with_hit_point(
        &mut self,
        distance: f64,
        hit_point: Point,
        payload: P,
    ) -> Result<HitHandle> {
        if !hit_point.is_finite() {
            return Err(Error::InvalidArgument(8));
        }
        if !distance.is_finite() {
            return Err(Error::InvalidArgument(0));
        }
        self.push(Hit::new(distance, payload, Some(hit_point)))
    }

    pub fn get(&self, handle: HitHandle) -> &Hit<P> {
        &self.storage[handle]
    }

    pub fn get_mut(&mut self, handle: HitHandle) -> &mut Hit<P> {
        &mut self.storage[handle]
    }

    /// Discards every allocation except `handle`, which is preserved and
    /// returned under a (possibly different) handle. Callers must stop
    /// using the old handle and adopt the one returned here.
    pub fn free_all_except(&mut self, handle: HitHandle) -> HitHandle {
        trace!("arena reset, preserving handle {handle}");
        let preserved = self.storage[handle].clone();
        self.cursor = 0;
        self.push(preserved).expect("preserved hit was already valid")
    }

    /// Discards every allocation. Capacity is retained for the next ray.
    pub fn free_all(&mut self) {
        trace!("arena reset, discarding all {} hits", self.cursor);
        self.cursor = 0;
    }

    fn push(&mut self, hit: Hit<P>) -> Result<HitHandle> {
        let handle = self.cursor;
        trace!("arena allocate at handle {handle}, distance {}", hit.distance);
        if handle < self.storage.len() {
            self.storage[handle] = hit;
        } else {
            self.storage.push(hit);
        }
        self.cursor += 1;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rejects_non_finite_distance() {
        let mut arena: Arena<u32> = Arena::new();
        assert!(arena.allocate(f64::NAN, 1).is_err());
        assert!(arena.allocate(f64::INFINITY, 1).is_err());
    }

    #[test]
    fn free_all_except_preserves_payload_and_invalidates_others() {
        let mut arena: Arena<&'static str> = Arena::new();
        let a = arena.allocate(3.0, "a").unwrap();
        let _b = arena.allocate(1.0, "b").unwrap();
        let _c = arena.allocate(2.0, "c").unwrap();

        let kept = arena.free_all_except(a);
        assert_eq!(arena.get(kept).payload, "a");
        assert_eq!(arena.get(kept).distance, 3.0);

        let d = arena.allocate(5.0, "d").unwrap();
        assert_eq!(arena.get(d).payload, "d");
    }

    #[test]
    fn free_all_resets_cursor_without_losing_capacity() {
        let mut arena: Arena<u32> = Arena::new();
        for i in 0..64 {
            arena.allocate(i as f64, i).unwrap();
        }
        arena.free_all();
        let h = arena.allocate(1.0, 100).unwrap();
        assert_eq!(h, 0);
        assert_eq!(arena.get(h).payload, 100);
    }
}
