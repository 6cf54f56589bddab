// =============================================================================
// Payload parsing & validation for the series source and the order feed
// =============================================================================
//
// Series document:  [ { "time": <number|string>, "open", "high", "low", "close" }, ... ]
// Orders document:  [ { "price": <number>, "label": <string> }, ... ]
//
// Numeric fields may arrive as JSON numbers or as numeric strings.  Strings
// such as "NaN" or "Infinity" are accepted for prices in the series: they are
// data quality problems, not schema violations, and the indicator engine
// blanks every value that depends on them.
// =============================================================================

use std::cmp::Ordering;

use serde_json::Value;

use super::FeedError;
use crate::types::{OrderAnnotation, PriceBar, Timestamp};

/// Parse and validate a price-series document.
///
/// Fails with [`FeedError::Malformed`] when the body is not a JSON array, a
/// field is missing or has the wrong type, timestamps mix kinds, or
/// timestamps are not strictly ascending (duplicates included).
pub fn parse_series(body: &[u8]) -> Result<Vec<PriceBar>, FeedError> {
    let items = parse_array(body, "series")?;

    let mut bars = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let bar = PriceBar {
            time: parse_timestamp(&item["time"], i)?,
            open: parse_f64(&item["open"], "open", i)?,
            high: parse_f64(&item["high"], "high", i)?,
            low: parse_f64(&item["low"], "low", i)?,
            close: parse_f64(&item["close"], "close", i)?,
        };
        bars.push(bar);
    }

    ensure_ascending(&bars)?;
    Ok(bars)
}

/// Parse and validate an order-feed document. Order is not significant.
///
/// Every `price` must be finite; a non-finite price has no level to mark.
pub fn parse_orders(body: &[u8]) -> Result<Vec<OrderAnnotation>, FeedError> {
    let items = parse_array(body, "orders")?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let price = parse_f64(&item["price"], "price", i)?;
            if !price.is_finite() {
                return Err(FeedError::Malformed(format!(
                    "order {i}: price {price} is not finite"
                )));
            }
            let label = item["label"]
                .as_str()
                .ok_or_else(|| FeedError::Malformed(format!("order {i}: missing string field label")))?
                .to_string();
            Ok(OrderAnnotation { price, label })
        })
        .collect()
}

fn parse_array(body: &[u8], what: &str) -> Result<Vec<Value>, FeedError> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| FeedError::Malformed(format!("{what} payload is not valid JSON: {e}")))?;

    match root {
        Value::Array(items) => Ok(items),
        other => Err(FeedError::Malformed(format!(
            "{what} payload must be a JSON array, got {}",
            json_type(&other)
        ))),
    }
}

/// Numbers may be sent as JSON numbers or as strings ("101.25", "NaN").
fn parse_f64(val: &Value, name: &str, index: usize) -> Result<f64, FeedError> {
    match val {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FeedError::Malformed(format!("item {index}: {name} is not a valid f64"))),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            FeedError::Malformed(format!("item {index}: failed to parse {name} as f64: {s}"))
        }),
        Value::Null => Err(FeedError::Malformed(format!(
            "item {index}: missing field {name}"
        ))),
        other => Err(FeedError::Malformed(format!(
            "item {index}: field {name} has unexpected JSON type {}",
            json_type(other)
        ))),
    }
}

fn parse_timestamp(val: &Value, index: usize) -> Result<Timestamp, FeedError> {
    match val {
        Value::Number(n) => n.as_i64().map(Timestamp::Epoch).ok_or_else(|| {
            FeedError::Malformed(format!("item {index}: time {n} is not an integer epoch"))
        }),
        Value::String(s) => Ok(Timestamp::Text(s.clone())),
        Value::Null => Err(FeedError::Malformed(format!(
            "item {index}: missing field time"
        ))),
        other => Err(FeedError::Malformed(format!(
            "item {index}: field time has unexpected JSON type {}",
            json_type(other)
        ))),
    }
}

fn ensure_ascending(bars: &[PriceBar]) -> Result<(), FeedError> {
    for (i, pair) in bars.windows(2).enumerate() {
        match pair[0].time.compare(&pair[1].time) {
            Some(Ordering::Less) => {}
            Some(_) => {
                return Err(FeedError::Malformed(format!(
                    "item {}: time {} does not follow {}",
                    i + 1,
                    pair[1].time,
                    pair[0].time
                )))
            }
            None => {
                return Err(FeedError::Malformed(format!(
                    "item {}: time {} mixes key kinds with {}",
                    i + 1,
                    pair[1].time,
                    pair[0].time
                )))
            }
        }
    }
    Ok(())
}

fn json_type(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
