use std::fmt::Debug;

use crate::direction::Direction;
use crate::matrix::Matrix;
use crate::point::Point;
use crate::ray::Ray;

const TEST_EPSILON: f64 = 0.0001;

pub trait ApproxEq: Debug {
    fn approx_eq(&self, other: &Self) -> bool;
}

impl ApproxEq for f64 {
    fn approx_eq(&self, other: &Self) -> bool {
        if self.is_nan() || other.is_nan() {
            return false;
        }
        (*self - *other).abs() < TEST_EPSILON
    }
}

impl<T> ApproxEq for [T]
where
    T: ApproxEq,
{
    fn approx_eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|(a, b)| a.approx_eq(b))
    }
}

impl<T> ApproxEq for Vec<T>
where
    T: ApproxEq,
{
    fn approx_eq(&self, other: &Self) -> bool {
        self.as_slice().approx_eq(other.as_slice())
    }
}

impl ApproxEq for Matrix {
    fn approx_eq(&self, other: &Self) -> bool {
        let a = self.read();
        let b = other.read();
        a.iter().zip(b.iter()).all(|(ra, rb)| ra.approx_eq(rb))
    }
}

impl ApproxEq for Direction {
    fn approx_eq(&self, other: &Self) -> bool {
        let a = [self.x, self.y, self.z];
        let b = [other.x, other.y, other.z];

        a.approx_eq(&b)
    }
}

impl ApproxEq for Point {
    fn approx_eq(&self, other: &Self) -> bool {
        let a = [self.x, self.y, self.z];
        let b = [other.x, other.y, other.z];

        a.approx_eq(&b)
    }
}

impl ApproxEq for Ray {
    fn approx_eq(&self, other: &Self) -> bool {
        self.origin.approx_eq(&other.origin) && self.direction.approx_eq(&other.direction)
    }
}

#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        if !$crate::test_utils::ApproxEq::approx_eq(&$a, &$b) {
            panic!(
                "assertion failed: `(left == right)`\n   left: `{:?}`,\n  right: `{:?}`",
                $a, $b,
            )
        }
    };
}
