use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::point::Point;

/// A ray in either world or model coordinates.
///
/// `direction` need not be unit length; callers that need a parametric
/// distance in world units normalize separately.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Point,
    pub direction: Direction,
}

impl Ray {
    pub fn new(origin: Point, direction: Direction) -> Ray {
        Ray { origin, direction }
    }

    /// Validates a ray per position `position` in the caller's argument list.
    pub fn validate(self, position: u32) -> Result<Ray> {
        if !self.origin.is_finite() || !self.direction.is_valid_direction() {
            return Err(Error::InvalidArgument(position));
        }
        Ok(self)
    }

    /// The point `origin + t * direction`.
    pub fn endpoint(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }
}
