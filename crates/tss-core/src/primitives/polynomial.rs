//! Byte-level sums and Shamir polynomial evaluation

use super::{Point, Scalar};
use crate::Result;

/// Sum encoded scalars modulo `n`.
///
/// Every operand must be exactly 32 bytes; one bad operand fails the whole
/// sum. Over-range operands are reduced.
pub fn sum_scalars<B: AsRef<[u8]>>(scalars: &[B]) -> Result<Scalar> {
    scalars
        .iter()
        .try_fold(Scalar::ZERO, |acc, s| Ok(acc + Scalar::parse_reduced(s.as_ref())?))
}

/// Sum encoded points. An empty input yields the identity.
pub fn sum_points<B: AsRef<[u8]>>(points: &[B]) -> Result<Point> {
    points
        .iter()
        .try_fold(Point::IDENTITY, |acc, p| Ok(acc + Point::parse(p.as_ref())?))
}

/// Evaluate `sum coefficients[i] * x^i` with Horner's rule
pub fn solve_scalar_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, c| acc * *x + *c)
}

/// Evaluate `sum coefficients[i] * x^i` over commitment points
pub fn solve_point_polynomial(coefficients: &[Point], x: &Scalar) -> Point {
    coefficients
        .iter()
        .rev()
        .fold(Point::IDENTITY, |acc, c| acc * *x + *c)
}
