//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Limit a value to the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Wrap an angle into the interval `(-pi, pi]`.
///
/// The result is the same as repeatedly shifting the angle by `2pi` until it lies inside the
/// interval, but the remainder is taken in one step so very large angles do not spin. `%` on
/// floats is exact, and both final shifts subtract values within a factor of two of each other,
/// so no rounding can push the result outside the interval.
pub fn wrap_to_pi<T>(theta: T) -> T
where
    T: Float + FloatConst
{
    let pi = T::PI();
    let tau = pi + pi;

    let mut wrapped = theta % tau;

    if wrapped > pi {
        wrapped = wrapped - tau;
    }
    else if wrapped <= -pi {
        wrapped = wrapped + tau;
    }

    wrapped
}
