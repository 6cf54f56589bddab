// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
//   SMA_i = mean(close[i - w .. i])      for i >= w
//
// Rounded to two decimals for display stability.
// =============================================================================

use super::{checked_window, mean, rolling, round_display, IndicatorError, IndicatorSeries};
use crate::types::PriceBar;

/// Compute the moving average of closes for every bar in `bars`.
///
/// The output has exactly `bars.len()` entries. Indices `[0, window)` are
/// `None`, as is any index whose window (or own bar) holds a non-finite close.
///
/// # Errors
/// [`IndicatorError::InvalidParameter`] when `window <= 0`.
pub fn moving_average(bars: &[PriceBar], window: i64) -> Result<IndicatorSeries, IndicatorError> {
    let window = checked_window(window)?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    Ok(rolling(&closes, window, |slice| {
        let avg = round_display(mean(slice));
        avg.is_finite().then_some(avg)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                time: Timestamp::Epoch(i as i64),
                open: close,
                high: close,
                low: close,
                close,
            })
            .collect()
    }

    #[test]
    fn sma_known_values() {
        let series = bars(&[100.0, 102.0, 101.0, 103.0, 99.0]);
        let sma = moving_average(&series, 3).unwrap();
        assert_eq!(sma, vec![None, None, None, Some(101.0), Some(102.0)]);
    }

    #[test]
    fn sma_length_and_alignment() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64 * 1.37).collect();
        let sma = moving_average(&bars(&closes), 25).unwrap();
        assert_eq!(sma.len(), 40);
        assert!(sma[..25].iter().all(Option::is_none));
        assert!(sma[25..].iter().all(|v| v.is_some_and(f64::is_finite)));
    }

    #[test]
    fn sma_constant_series() {
        let sma = moving_average(&bars(&[150.25; 30]), 25).unwrap();
        for v in sma.iter().flatten() {
            assert_eq!(*v, 150.25);
        }
        assert_eq!(sma.iter().flatten().count(), 5);
    }

    #[test]
    fn sma_rounds_to_two_decimals() {
        let sma = moving_average(&bars(&[1.0, 1.0, 2.0, 0.0]), 3).unwrap();
        // mean(1, 1, 2) = 1.3333...
        assert_eq!(sma[3], Some(1.33));
    }

    #[test]
    fn sma_rejects_non_positive_window() {
        let series = bars(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            moving_average(&series, 0),
            Err(IndicatorError::InvalidParameter { name: "window", .. })
        ));
        assert!(moving_average(&series, -1).is_err());
    }

    #[test]
    fn sma_window_longer_than_series() {
        let sma = moving_average(&bars(&[1.0, 2.0, 3.0]), 10).unwrap();
        assert_eq!(sma, vec![None, None, None]);
    }

    #[test]
    fn sma_empty_input() {
        assert!(moving_average(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn sma_non_finite_close_is_contained() {
        let w = 3;
        let mut closes: Vec<f64> = (0..12).map(|x| 100.0 + x as f64).collect();
        let baseline = moving_average(&bars(&closes), w).unwrap();

        let k = 5;
        closes[k] = f64::NAN;
        let sma = moving_average(&bars(&closes), w).unwrap();

        for (i, v) in sma.iter().enumerate() {
            if (k..=k + w as usize).contains(&i) {
                assert!(v.is_none(), "index {i} should be undefined");
            } else {
                assert_eq!(*v, baseline[i], "index {i} should match baseline");
            }
        }
    }

    #[test]
    fn sma_huge_finite_closes_stay_defined() {
        let sma = moving_average(&bars(&[1e307, 1e307, 1e307]), 2).unwrap();
        assert_eq!(sma, vec![None, None, Some(1e307)]);

        let sma = moving_average(&bars(&[1e308, 1e308, 0.0]), 2).unwrap();
        assert_eq!(sma[2], Some(1e308));
    }

    #[test]
    fn sma_does_not_mutate_input() {
        let series = bars(&[3.0, 1.0, 2.0, 5.0]);
        let copy = series.clone();
        let _ = moving_average(&series, 2).unwrap();
        assert_eq!(series, copy);
    }
}
