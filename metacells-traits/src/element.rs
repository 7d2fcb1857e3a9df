//! Element type bounds for kernel buffers.

use std::cmp::Ordering;
use std::fmt::Debug;

use num_traits::{AsPrimitive, NumCast, PrimInt, Zero};

/// Shared trait bounds for every value type stored in a kernel buffer.
///
/// Blanket-implemented for all primitive numeric types that convert to and
/// from `f64` and `u64` with `as` semantics, which covers the registered
/// `f32`, `f64`, `i32`, `i64`, `u32` and `u64` element types.
///
/// Weights handed to the downsampling kernels are interpreted as integer unit
/// counts through [`DataElement::as_count`]; scoring kernels compute in `f64`
/// and store back through [`DataElement::from_f64`].
pub trait DataElement:
    Copy + Send + Sync + PartialOrd + Debug + Zero + NumCast + 'static
{
    /// Lossy widening to `f64`.
    fn as_f64(self) -> f64;

    /// Saturating narrowing from `f64` (`as` semantics).
    fn from_f64(value: f64) -> Self;

    /// Interpret the value as a count of indivisible units.
    ///
    /// Fractional parts are truncated. Negative values must be rejected by the
    /// caller before converting.
    fn as_count(self) -> u64;

    /// Store a count of units.
    fn from_count(count: u64) -> Self;

    /// Convert to another element type, exactly when representable.
    #[inline]
    fn convert<O: DataElement>(self) -> O {
        <O as NumCast>::from(self).unwrap_or_else(|| O::from_f64(self.as_f64()))
    }

    /// Total order used by the selection kernels.
    ///
    /// Agrees with `partial_cmp` where it is defined and falls back to
    /// `f64::total_cmp` for NaN, so selection never sees an inconsistent order.
    #[inline]
    fn order(self, other: Self) -> Ordering {
        self.partial_cmp(&other)
            .unwrap_or_else(|| self.as_f64().total_cmp(&other.as_f64()))
    }
}

impl<T> DataElement for T
where
    T: Copy
        + Send
        + Sync
        + PartialOrd
        + Debug
        + Zero
        + NumCast
        + AsPrimitive<f64>
        + AsPrimitive<u64>
        + 'static,
    f64: AsPrimitive<T>,
    u64: AsPrimitive<T>,
{
    #[inline(always)]
    fn as_f64(self) -> f64 {
        AsPrimitive::<f64>::as_(self)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value.as_()
    }

    #[inline(always)]
    fn as_count(self) -> u64 {
        AsPrimitive::<u64>::as_(self)
    }

    #[inline(always)]
    fn from_count(count: u64) -> Self {
        count.as_()
    }
}

/// Trait bounds for element indices and band offsets of compressed matrices.
///
/// Signed index types are accepted; a negative value converts to a position
/// beyond any buffer and is rejected by the bounds checks of the views.
pub trait IndexElement: PrimInt + Send + Sync + Debug + 'static {
    fn as_position(self) -> usize;

    fn from_position(position: usize) -> Self;
}

impl<T> IndexElement for T
where
    T: PrimInt + Send + Sync + Debug + AsPrimitive<usize> + 'static,
    usize: AsPrimitive<T>,
{
    #[inline(always)]
    fn as_position(self) -> usize {
        self.as_()
    }

    #[inline(always)]
    fn from_position(position: usize) -> Self {
        position.as_()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_data_element<T: DataElement>() {}
    fn assert_index_element<T: IndexElement>() {}

    #[test]
    fn test_standard_types() {
        assert_data_element::<f32>();
        assert_data_element::<f64>();
        assert_data_element::<i32>();
        assert_data_element::<i64>();
        assert_data_element::<u32>();
        assert_data_element::<u64>();
        assert_index_element::<i32>();
        assert_index_element::<i64>();
        assert_index_element::<u32>();
        assert_index_element::<u64>();
        assert_index_element::<usize>();
    }

    #[test]
    fn test_count_conversions() {
        assert_eq!(7.9f32.as_count(), 7);
        assert_eq!(12i64.as_count(), 12);
        assert_eq!(f64::from_count(5), 5.0);
        assert_eq!(u32::from_count(5), 5);
    }

    #[test]
    fn test_convert_is_exact_for_large_integers() {
        let big = (1i64 << 60) + 1;
        let copied: i64 = big.convert();
        assert_eq!(copied, big);
        let narrowed: f32 = 2.5f64.convert();
        assert_eq!(narrowed, 2.5);
    }

    #[test]
    fn test_convert_saturates_out_of_range() {
        let negative: u32 = (-3i32).convert();
        assert_eq!(negative, 0);
    }

    #[test]
    fn test_order_handles_nan() {
        assert_eq!(1.0f64.order(2.0), Ordering::Less);
        assert_eq!(f64::NAN.order(1.0), Ordering::Greater);
        assert_eq!(3u32.order(3), Ordering::Equal);
    }

    #[test]
    fn test_negative_positions_are_out_of_range() {
        assert_eq!(7i32.as_position(), 7);
        assert!((-1i32).as_position() > 1 << 31);
        assert_eq!(u32::from_position(9), 9);
    }
}
