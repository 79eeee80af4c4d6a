use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

// ============================================================================
// Raw Search Result Rows
// ============================================================================

/// One candidate itinerary exactly as it arrives in a ranking batch.
///
/// Timestamp columns are kept as text here and parsed by [`ItineraryRow::normalize`],
/// so a bad value degrades to a missing timestamp instead of failing the batch.
/// Columns without `default` are required keys (their values may still be `null`).
#[derive(Debug, Clone, Deserialize)]
pub struct ItineraryRow {
    /// Key of the row when the batch was an index-keyed object
    #[serde(skip)]
    pub row_key: Option<String>,
    #[serde(rename = "RequestID", deserialize_with = "de::text")]
    pub request_id: String,
    #[serde(rename = "RequestDate", deserialize_with = "de::nullable_text")]
    pub request_date: Option<String>,
    #[serde(rename = "RequestDepartureDate", deserialize_with = "de::nullable_text")]
    pub request_departure_date: Option<String>,
    #[serde(rename = "RequestReturnDate", deserialize_with = "de::nullable_text")]
    pub request_return_date: Option<String>,
    #[serde(rename = "SearchRoute", deserialize_with = "de::text")]
    pub search_route: String,
    #[serde(rename = "DepartureDate", deserialize_with = "de::nullable_text")]
    pub departure_date: Option<String>,
    #[serde(rename = "ArrivalDate", deserialize_with = "de::nullable_text")]
    pub arrival_date: Option<String>,
    // Upstream may send the legacy misspelled column, the corrected one, or both.
    // At least one must be present; see `ItineraryRow::return_departure_date`.
    #[serde(rename = "ReturnDepartureDate", default, deserialize_with = "de::present_text")]
    return_departure_date: Option<Option<String>>,
    #[serde(rename = "ReturnDepatrureDate", default, deserialize_with = "de::present_text")]
    legacy_return_departure_date: Option<Option<String>>,
    #[serde(rename = "ReturnArrivalDate", deserialize_with = "de::nullable_text")]
    pub return_arrival_date: Option<String>,
    #[serde(rename = "SegmentCount", deserialize_with = "de::nullable_int")]
    pub segment_count: Option<i64>,
    #[serde(rename = "Amount", deserialize_with = "de::nullable_float")]
    pub amount: Option<f64>,
    #[serde(rename = "IsBaggage", default, deserialize_with = "de::flag")]
    pub is_baggage: u8,
    #[serde(rename = "isRefundPermitted", default, deserialize_with = "de::flag")]
    pub is_refund_permitted: u8,
    #[serde(rename = "isExchangePermitted", default, deserialize_with = "de::flag")]
    pub is_exchange_permitted: u8,
    #[serde(rename = "TravellerGrade", default, deserialize_with = "de::nullable_text")]
    pub traveller_grade: Option<String>,
}

pub const UNKNOWN_TRAVELLER_GRADE: &str = "Unknown";

impl ItineraryRow {
    /// Parse a batch given either as a JSON array of rows or as an
    /// index-keyed object (`{"0": {...}, "1": {...}}`).
    ///
    /// Rows keep the order they were sent in. Object keys are kept in `row_key`.
    pub fn parse_batch(value: serde_json::Value) -> CoreResult<Vec<ItineraryRow>> {
        match value {
            serde_json::Value::Array(rows) => rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| Self::parse_row(&i.to_string(), row))
                .collect(),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(key, row)| -> CoreResult<ItineraryRow> {
                    let mut row = Self::parse_row(&key, row)?;
                    row.row_key = Some(key);
                    Ok(row)
                })
                .collect(),
            other => Err(CoreError::InvalidInput(format!(
                "expected an array or object of rows, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn parse_row(label: &str, value: serde_json::Value) -> CoreResult<ItineraryRow> {
        let row: ItineraryRow = serde_json::from_value(value)
            .map_err(|e| CoreError::InvalidInput(format!("row {}: {}", label, e)))?;
        if row.return_departure_date.is_none() && row.legacy_return_departure_date.is_none() {
            return Err(CoreError::InvalidInput(format!(
                "row {}: missing field `ReturnDepartureDate`",
                label
            )));
        }
        Ok(row)
    }

    /// Raw return departure. A non-null legacy `ReturnDepatrureDate` wins over
    /// `ReturnDepartureDate`.
    pub fn return_departure_date(&self) -> Option<&str> {
        let legacy = self.legacy_return_departure_date.as_ref().and_then(|v| v.as_deref());
        legacy.or_else(|| self.return_departure_date.as_ref().and_then(|v| v.as_deref()))
    }

    /// Parse timestamps and apply defaults for optional columns.
    pub fn normalize(&self) -> Itinerary {
        Itinerary {
            request_id: self.request_id.clone(),
            request_date: parse_column("RequestDate", self.request_date.as_deref()),
            request_departure_date: parse_column("RequestDepartureDate", self.request_departure_date.as_deref()),
            request_return_date: parse_column("RequestReturnDate", self.request_return_date.as_deref()),
            search_route: self.search_route.clone(),
            departure_date: parse_column("DepartureDate", self.departure_date.as_deref()),
            arrival_date: parse_column("ArrivalDate", self.arrival_date.as_deref()),
            return_departure_date: parse_column("ReturnDepartureDate", self.return_departure_date()),
            return_arrival_date: parse_column("ReturnArrivalDate", self.return_arrival_date.as_deref()),
            segment_count: self.segment_count,
            amount: self.amount,
            is_baggage: self.is_baggage,
            is_refund_permitted: self.is_refund_permitted,
            is_exchange_permitted: self.is_exchange_permitted,
            traveller_grade: self
                .traveller_grade
                .clone()
                .unwrap_or_else(|| UNKNOWN_TRAVELLER_GRADE.to_string()),
        }
    }
}

/// A row with parsed timestamps and defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Itinerary {
    #[serde(rename = "RequestID")]
    pub request_id: String,
    #[serde(rename = "RequestDate")]
    pub request_date: Option<NaiveDateTime>,
    #[serde(rename = "RequestDepartureDate")]
    pub request_departure_date: Option<NaiveDateTime>,
    #[serde(rename = "RequestReturnDate")]
    pub request_return_date: Option<NaiveDateTime>,
    #[serde(rename = "SearchRoute")]
    pub search_route: String,
    #[serde(rename = "DepartureDate")]
    pub departure_date: Option<NaiveDateTime>,
    #[serde(rename = "ArrivalDate")]
    pub arrival_date: Option<NaiveDateTime>,
    #[serde(rename = "ReturnDepartureDate")]
    pub return_departure_date: Option<NaiveDateTime>,
    #[serde(rename = "ReturnArrivalDate")]
    pub return_arrival_date: Option<NaiveDateTime>,
    #[serde(rename = "SegmentCount")]
    pub segment_count: Option<i64>,
    #[serde(rename = "Amount")]
    pub amount: Option<f64>,
    #[serde(rename = "IsBaggage")]
    pub is_baggage: u8,
    #[serde(rename = "isRefundPermitted")]
    pub is_refund_permitted: u8,
    #[serde(rename = "isExchangePermitted")]
    pub is_exchange_permitted: u8,
    #[serde(rename = "TravellerGrade")]
    pub traveller_grade: String,
}

// ============================================================================
// Timestamp Parsing
// ============================================================================

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a wall-clock timestamp. RFC 3339 input keeps the local time it states.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nat") || raw.eq_ignore_ascii_case("nan") {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_column(column: &str, raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        tracing::warn!("Unparsable {} value {:?}, treating as missing", column, raw);
    }
    parsed
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Lenient column deserializers for loosely typed upstream rows
mod de {
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("expected text, got {}", other))),
        }
    }

    pub fn nullable_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Distinguishes a present-but-null column (`Some(None)`) from an absent one,
    /// which the field's `default` turns into `None`.
    pub fn present_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        nullable_text(deserializer).map(Some)
    }

    pub fn nullable_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }

    pub fn nullable_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|v| is_whole_i64(*v)).map(|v| v as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    /// Whole and inside the `i64` range, so the cast below cannot saturate
    fn is_whole_i64(v: f64) -> bool {
        v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => u8::from(b),
            Value::Number(n) => u8::from(n.as_f64().is_some_and(|v| v != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => 1,
                other => u8::from(other.parse::<f64>().is_ok_and(|v| v != 0.0)),
            },
            _ => 0,
        })
    }
}
