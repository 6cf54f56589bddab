// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands bracket the moving average by k population standard
// deviations over the same preceding window:
//
//   m     = mean(close[i - w .. i])
//   σ     = sqrt( Σ (x - m)² / w )          (divisor w, not w - 1)
//   upper = m + k·σ
//   lower = m - k·σ
//
// Both bands are rounded to two decimals. Variance is clamped at zero before
// the square root so a flat window collapses the bands onto the mean.
// =============================================================================

use super::{
    checked_window, mean, rolling, round_display, IndicatorError, IndicatorSeries,
    DEFAULT_BAND_STD,
};
use crate::types::PriceBar;

/// Upper and lower bands, index-aligned with the input bars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandPair {
    pub upper: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// Calculate ±2σ Bollinger Bands for every bar in `bars`.
///
/// See [`bollinger_bands_with`]. The refresh cycle calls that form directly
/// because its band width is configurable.
#[allow(dead_code)]
pub fn bollinger_bands(bars: &[PriceBar], window: i64) -> Result<BandPair, IndicatorError> {
    bollinger_bands_with(bars, window, DEFAULT_BAND_STD)
}

/// Calculate Bollinger Bands `num_std` deviations wide.
///
/// Returns a [`BandPair`] whose series both have `bars.len()` entries.
/// An index is `None` in both bands when:
/// - it is below `window`;
/// - its window or its own bar holds a non-finite close;
/// - the resulting band would not be finite.
///
/// # Errors
/// [`IndicatorError::InvalidParameter`] when `window <= 0` or `num_std` is
/// negative or non-finite.
pub fn bollinger_bands_with(
    bars: &[PriceBar],
    window: i64,
    num_std: f64,
) -> Result<BandPair, IndicatorError> {
    let window = checked_window(window)?;
    if !num_std.is_finite() || num_std < 0.0 {
        return Err(IndicatorError::InvalidParameter {
            name: "num_std",
            value: num_std.to_string(),
            reason: "must be a finite, non-negative number",
        });
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let bands = rolling(&closes, window, |slice| {
        let middle = mean(slice);
        let std_dev = population_std_dev(slice, middle);

        let upper = round_display(middle + num_std * std_dev);
        let lower = round_display(middle - num_std * std_dev);
        (upper.is_finite() && lower.is_finite()).then_some((upper, lower))
    });

    let (upper, lower): (IndicatorSeries, IndicatorSeries) = bands
        .into_iter()
        .map(|b| match b {
            Some((u, l)) => (Some(u), Some(l)),
            None => (None, None),
        })
        .unzip();

    Ok(BandPair { upper, lower })
}

/// Population standard deviation of `slice` about `middle`.
///
/// Deviations are scaled by the largest one before squaring, so closes near
/// `f64::MAX` still give a finite σ when the spread itself is finite.
fn population_std_dev(slice: &[f64], middle: f64) -> f64 {
    let scale = slice
        .iter()
        .map(|x| (x - middle).abs())
        .fold(0.0_f64, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    let variance = slice
        .iter()
        .map(|x| ((x - middle) / scale).powi(2))
        .sum::<f64>()
        / slice.len() as f64;
    scale * variance.max(0.0).sqrt()
}
