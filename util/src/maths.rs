//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

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

/// Clamp a value into `[min, max]`.
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

/// Clamp a value into `[-limit, limit]`.
pub fn clamp_sym<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(&value, &-limit, &limit)
}

/// Wrap an angle in radians into the range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    wrap_half_period(angle, T::from(std::f64::consts::PI).unwrap_or_else(T::zero))
}

/// Wrap an angle in degrees into the range (-180, 180].
pub fn wrap_180<T>(angle: T) -> T
where
    T: Float
{
    wrap_half_period(angle, T::from(180.0).unwrap_or_else(T::zero))
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap into (-half, half], where the full period is `2 * half`.
fn wrap_half_period<T>(angle: T, half: T) -> T
where
    T: Float
{
    let period = half + half;
    let wrapped = half - rem_euclid(half - angle, period);

    // rem_euclid may round up to the full period, which would land on -half
    if wrapped <= -half {
        wrapped + period
    }
    else {
        wrapped
    }
}
