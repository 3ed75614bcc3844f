use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use nalgebra::RealField;
use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::Float;
use single_svdlib::SvdFloat;

/// Element type accepted by every operator and by the solver.
///
/// Both `num_traits::Float` and `nalgebra::RealField` are required, so method
/// calls that exist on both (`sqrt`, `abs`, `max`, ...) must be written in the
/// qualified form `Float::sqrt(x)`. `SvdFloat` lets the type go through the
/// single-svdlib solvers.
pub trait IpcasFloat:
    Float
    + RealField
    + SvdFloat
    + LinalgScalar
    + ScalarOperand
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum
    + Send
    + Sync
    + Debug
    + Display
    + LowerExp
    + 'static
{
}

impl IpcasFloat for f32 {}
impl IpcasFloat for f64 {}

/// Lossy cast used for literals and counts. NaN if the value cannot be represented.
#[inline]
pub(crate) fn cast<T: IpcasFloat>(value: f64) -> T {
    num_traits::cast::<f64, T>(value).unwrap_or_else(<T as Float>::nan)
}

#[inline]
pub(crate) fn cast_usize<T: IpcasFloat>(value: usize) -> T {
    num_traits::cast::<usize, T>(value).unwrap_or_else(<T as Float>::nan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_literals() {
        assert_eq!(cast::<f64>(0.25), 0.25);
        assert_eq!(cast::<f32>(0.25), 0.25f32);
        assert_eq!(cast_usize::<f64>(17), 17.0);
    }

    fn scientific<T: IpcasFloat>(value: T) -> String {
        format!("{:e}", value)
    }

    #[test]
    fn test_scientific_formatting() {
        assert_eq!(scientific(1e-300f64), "1e-300");
        assert_eq!(scientific(0.5f32), "5e-1");
    }

    #[test]
    fn test_tiny_literal_underflows_for_f32() {
        // 1e-300 is representable in f64 only.
        assert_eq!(cast::<f32>(1e-300), 0.0f32);
        assert!(cast::<f64>(1e-300) > 0.0);
    }
}
