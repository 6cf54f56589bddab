// =============================================================================
// Indicator Engine
// =============================================================================
//
// Pure, side-effect-free rolling statistics over an ordered bar series.  Every
// output series has the same length and index alignment as its input; an
// index that has no value carries `None`, never zero.
//
// Window convention: the value at index `i` is computed from the `window`
// closes strictly preceding it, i.e. the half-open slice `[i - window, i)`.
// The bar at `i` itself is not part of its own statistic.
//
// Non-finite closes: an index is undefined whenever its window, or its own
// bar, holds a non-finite close.  Each window is evaluated independently, so
// a bad bar only blanks the indices that can see it.
// =============================================================================

pub mod bollinger;
pub mod sma;

pub use bollinger::{bollinger_bands_with, BandPair};
pub use sma::moving_average;

use thiserror::Error;

/// Default look-back window for both the moving average and the bands.
pub const DEFAULT_WINDOW: i64 = 25;

/// Default band width in standard deviations.
pub const DEFAULT_BAND_STD: f64 = 2.0;

/// Decimal digits kept on every emitted value.
const DISPLAY_DECIMALS: i32 = 2;

/// Index-aligned derived series; `None` marks "no value yet".
pub type IndicatorSeries = Vec<Option<f64>>;

/// Errors raised by the indicator engine. These indicate misconfiguration,
/// never bad market data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Validate a window size and convert it to a slice length.
pub(crate) fn checked_window(window: i64) -> Result<usize, IndicatorError> {
    if window <= 0 {
        return Err(IndicatorError::InvalidParameter {
            name: "window",
            value: window.to_string(),
            reason: "must be a positive integer",
        });
    }
    usize::try_from(window).map_err(|_| IndicatorError::InvalidParameter {
        name: "window",
        value: window.to_string(),
        reason: "does not fit in memory on this platform",
    })
}

/// Round to [`DISPLAY_DECIMALS`] places, half away from zero.
///
/// Whole numbers are returned as-is. Every finite value above 2^52 is whole,
/// so scaling by the factor can never overflow a finite input to infinity.
pub(crate) fn round_display(value: f64) -> f64 {
    if value.fract() == 0.0 {
        return value;
    }
    let factor = 10f64.powi(DISPLAY_DECIMALS);
    (value * factor).round() / factor
}

/// Evaluate `stat` over every preceding window of `closes`.
///
/// Index `i` is `None` when `i < window`, when any close in `[i - window, i]`
/// is non-finite, or when `stat` itself yields `None`.
pub(crate) fn rolling<T, F>(closes: &[f64], window: usize, mut stat: F) -> Vec<Option<T>>
where
    F: FnMut(&[f64]) -> Option<T>,
{
    (0..closes.len())
        .map(|i| {
            if i < window {
                return None;
            }
            if closes[i - window..=i].iter().any(|c| !c.is_finite()) {
                return None;
            }
            stat(&closes[i - window..i])
        })
        .collect()
}

/// Arithmetic mean of a non-empty slice.
///
/// Each term is divided before summing, so the mean of finite values is
/// finite even when their plain sum would overflow.
pub(crate) fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    values.iter().map(|x| x / n).sum()
}
