use chrono::Utc;
use serde::Serialize;

use crate::indicators::{BandPair, IndicatorSeries};
use crate::types::{OrderAnnotation, PriceBar};

/// Everything the chart needs for one frame, produced fresh by each pass.
///
/// Undefined indicator values serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBundle {
    pub title: String,
    pub pass: u64,
    /// RFC 3339 UTC time the bundle was assembled.
    pub generated_at: String,
    pub window: i64,
    pub categories: Vec<String>,
    /// `[open, close, low, high]` per bar.
    pub candles: Vec<[f64; 4]>,
    pub moving_average: IndicatorSeries,
    pub band_upper: IndicatorSeries,
    pub band_lower: IndicatorSeries,
    pub annotations: Vec<OrderAnnotation>,
}

impl ChartBundle {
    pub fn assemble(
        title: &str,
        pass: u64,
        window: i64,
        bars: &[PriceBar],
        moving_average: IndicatorSeries,
        bands: BandPair,
        annotations: Vec<OrderAnnotation>,
    ) -> Self {
        Self {
            title: title.to_string(),
            pass,
            generated_at: Utc::now().to_rfc3339(),
            window,
            categories: bars.iter().map(|b| b.time.to_string()).collect(),
            candles: bars.iter().map(PriceBar::candle).collect(),
            moving_average,
            band_upper: bands.upper,
            band_lower: bands.lower,
            annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn serialises_camel_case_with_nulls() {
        let bars = vec![PriceBar {
            time: Timestamp::Text("2024-01-01T00:00:00Z".into()),
            open: 1.0,
            high: 3.0,
            low: 0.5,
            close: 2.0,
        }];
        let bundle = ChartBundle::assemble(
            "T",
            7,
            25,
            &bars,
            vec![None],
            BandPair {
                upper: vec![None],
                lower: vec![None],
            },
            vec![OrderAnnotation {
                price: 1.5,
                label: "bid".into(),
            }],
        );

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["categories"][0], "2024-01-01T00:00:00Z");
        assert_eq!(json["candles"][0], serde_json::json!([1.0, 2.0, 0.5, 3.0]));
        assert!(json["movingAverage"][0].is_null());
        assert!(json["bandUpper"][0].is_null());
        assert!(json["bandLower"][0].is_null());
        assert_eq!(json["annotations"][0]["label"], "bid");
        assert_eq!(json["pass"], 7);
        assert!(json["generatedAt"].is_string());
    }
}
