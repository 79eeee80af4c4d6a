use altis_core::{AirportResolver, AirportTable, Itinerary, ItineraryRow, RouteAirports, TimeConverter};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

/// An itinerary plus every derived feature the scoring models consume.
///
/// All "may be missing" values are `Option`s and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRow {
    #[serde(flatten)]
    pub itinerary: Itinerary,

    // Airports
    #[serde(flatten)]
    pub airports: RouteAirports,
    pub dep_forw_tz: Option<String>,
    pub dep_forw_country: Option<String>,
    pub arr_forw_tz: Option<String>,
    pub arr_forw_country: Option<String>,
    pub dep_back_tz: Option<String>,
    pub dep_back_country: Option<String>,
    pub arr_back_tz: Option<String>,
    pub arr_back_country: Option<String>,

    // Zone-normalized departures
    #[serde(rename = "DepartureDate_conv")]
    pub departure_date_conv: Option<NaiveDateTime>,
    #[serde(rename = "ReturnDepartureDate_conv")]
    pub return_departure_date_conv: Option<NaiveDateTime>,

    // Elapsed time
    pub forw_hours: Option<f64>,
    pub back_hours: Option<f64>,
    pub total_hours: Option<f64>,

    // Group-relative features
    pub forw_hours_diff_min: Option<f64>,
    pub forw_hours_diff_mean: Option<f64>,
    pub back_hours_diff_min: Option<f64>,
    pub back_hours_diff_mean: Option<f64>,
    pub price_diff_min_perc: Option<f64>,
    pub price_diff_mean_perc: Option<f64>,

    // Requested vs actual
    pub req_dep_hours_diff: Option<f64>,
    pub req_ret_hours_diff: Option<f64>,

    pub is_direct: u8,
}

/// Turns a raw batch into model-ready rows.
///
/// Row order is preserved and nothing in the input is mutated. A single bad row
/// never fails the batch: unresolvable data only produces missing features.
pub struct FeatureEngineer<'a> {
    resolver: AirportResolver<'a>,
}

impl<'a> FeatureEngineer<'a> {
    pub fn new(airports: &'a AirportTable) -> Self {
        Self {
            resolver: AirportResolver::new(airports),
        }
    }

    pub fn transform(&self, rows: &[ItineraryRow]) -> Vec<EnrichedRow> {
        // Pass 1: per-row features
        let mut enriched: Vec<EnrichedRow> = rows.iter().map(|row| self.enrich_row(row)).collect();

        // Pass 2: per-request aggregates, then the relative features
        let forw = GroupAggregates::collect(&enriched, |r| r.forw_hours);
        let back = GroupAggregates::collect(&enriched, |r| r.back_hours);
        let price = GroupAggregates::collect(&enriched, |r| r.itinerary.amount);
        let group_count = forw.group_count();

        let relative: Vec<RelativeFeatures> = enriched
            .iter()
            .map(|row| {
                let key = row.itinerary.request_id.as_str();
                let (forw_min, forw_mean) = forw.min_mean(key);
                let (back_min, back_mean) = back.min_mean(key);
                let (price_min, price_mean) = price.min_mean(key);
                RelativeFeatures {
                    forw_min: relative_diff(row.forw_hours, forw_min),
                    forw_mean: relative_diff(row.forw_hours, forw_mean),
                    back_min: relative_diff(row.back_hours, back_min),
                    back_mean: relative_diff(row.back_hours, back_mean),
                    price_min: relative_diff(row.itinerary.amount, price_min),
                    price_mean: relative_diff(row.itinerary.amount, price_mean),
                }
            })
            .collect();

        for (row, rel) in enriched.iter_mut().zip(relative) {
            row.forw_hours_diff_min = rel.forw_min;
            row.forw_hours_diff_mean = rel.forw_mean;
            row.back_hours_diff_min = rel.back_min;
            row.back_hours_diff_mean = rel.back_mean;
            row.price_diff_min_perc = rel.price_min;
            row.price_diff_mean_perc = rel.price_mean;
        }

        tracing::debug!(
            "Transformed {} rows across {} request groups",
            enriched.len(),
            group_count
        );
        enriched
    }

    fn enrich_row(&self, row: &ItineraryRow) -> EnrichedRow {
        let itinerary = row.normalize();
        let airports = AirportResolver::extract_airports(&itinerary.search_route);

        let (dep_forw_tz, dep_forw_country) = self.resolver.resolve(&airports.dep_forw);
        let (arr_forw_tz, arr_forw_country) = self.resolver.resolve(&airports.arr_forw);
        let (dep_back_tz, dep_back_country) = self.resolver.resolve(&airports.dep_back);
        let (arr_back_tz, arr_back_country) = self.resolver.resolve(&airports.arr_back);

        let departure_date_conv =
            TimeConverter::convert_opt(itinerary.departure_date, dep_forw_tz, arr_forw_tz);
        let return_departure_date_conv = if airports.has_return() {
            TimeConverter::convert_opt(itinerary.return_departure_date, dep_back_tz, arr_back_tz)
        } else {
            None
        };

        let forw_hours = hours_between(itinerary.arrival_date, departure_date_conv);
        let back_hours = hours_between(itinerary.return_arrival_date, return_departure_date_conv);
        let total_hours = forw_hours.zip(back_hours).map(|(f, b)| f + b);

        let req_dep_hours_diff = hours_between(itinerary.departure_date, itinerary.request_departure_date);
        let req_ret_hours_diff =
            hours_between(itinerary.return_departure_date, itinerary.request_return_date);

        let is_direct = classify_direct(itinerary.segment_count, back_hours);

        EnrichedRow {
            dep_forw_tz: dep_forw_tz.map(str::to_string),
            dep_forw_country: dep_forw_country.map(str::to_string),
            arr_forw_tz: arr_forw_tz.map(str::to_string),
            arr_forw_country: arr_forw_country.map(str::to_string),
            dep_back_tz: dep_back_tz.map(str::to_string),
            dep_back_country: dep_back_country.map(str::to_string),
            arr_back_tz: arr_back_tz.map(str::to_string),
            arr_back_country: arr_back_country.map(str::to_string),
            itinerary,
            airports,
            departure_date_conv,
            return_departure_date_conv,
            forw_hours,
            back_hours,
            total_hours,
            forw_hours_diff_min: None,
            forw_hours_diff_mean: None,
            back_hours_diff_min: None,
            back_hours_diff_mean: None,
            price_diff_min_perc: None,
            price_diff_mean_perc: None,
            req_dep_hours_diff,
            req_ret_hours_diff,
            is_direct,
        }
    }
}

/// Elapsed hours from `start` to `end`; missing if either side is.
fn hours_between(end: Option<NaiveDateTime>, start: Option<NaiveDateTime>) -> Option<f64> {
    let elapsed = end? - start?;
    Some(elapsed.num_milliseconds() as f64 / 3_600_000.0)
}

/// `(x - reference) / x`. A zero `x` gives `None`.
fn relative_diff(x: Option<f64>, reference: Option<f64>) -> Option<f64> {
    let x = x?;
    let reference = reference?;
    if x == 0.0 {
        return None;
    }
    Some((x - reference) / x)
}

/// Segment-count proxy for a direct flight; does not look at connections.
pub fn classify_direct(segment_count: Option<i64>, back_hours: Option<f64>) -> u8 {
    match (segment_count, back_hours) {
        (Some(1), None) => 1,
        (Some(2), Some(hours)) if hours > 0.0 => 1,
        _ => 0,
    }
}

// ============================================================================
// Group Aggregates
// ============================================================================

struct RelativeFeatures {
    forw_min: Option<f64>,
    forw_mean: Option<f64>,
    back_min: Option<f64>,
    back_mean: Option<f64>,
    price_min: Option<f64>,
    price_mean: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Aggregate {
    min: Option<f64>,
    sum: f64,
    count: usize,
}

impl Aggregate {
    fn push(&mut self, value: Option<f64>) {
        let Some(value) = value else { return };
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Min and mean of one column per `RequestID`, skipping missing values.
struct GroupAggregates<'r> {
    groups: HashMap<&'r str, Aggregate>,
}

impl<'r> GroupAggregates<'r> {
    fn collect(rows: &'r [EnrichedRow], value: impl Fn(&EnrichedRow) -> Option<f64>) -> Self {
        let mut groups: HashMap<&'r str, Aggregate> = HashMap::new();
        for row in rows {
            groups
                .entry(row.itinerary.request_id.as_str())
                .or_default()
                .push(value(row));
        }
        Self { groups }
    }

    fn min_mean(&self, request_id: &str) -> (Option<f64>, Option<f64>) {
        self.groups
            .get(request_id)
            .map(|agg| (agg.min, agg.mean()))
            .unwrap_or((None, None))
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use altis_core::AirportRecord;
    use serde_json::json;

    fn airports() -> AirportTable {
        [
            ("JFK", AirportRecord { timezone: "Etc/GMT+5".to_string(), country: "US".to_string() }),
            ("CDG", AirportRecord { timezone: "Etc/GMT-1".to_string(), country: "FR".to_string() }),
        ]
        .into_iter()
        .collect()
    }

    fn row(request_id: &str, route: &str, segments: i64, amount: f64) -> serde_json::Value {
        json!({
            "RequestID": request_id,
            "RequestDate": "2024-06-01 09:00:00",
            "RequestDepartureDate": "2024-06-10 00:00:00",
            "RequestReturnDate": null,
            "SearchRoute": route,
            "DepartureDate": "2024-06-10 22:00:00",
            "ArrivalDate": "2024-06-11 12:00:00",
            "ReturnDepartureDate": null,
            "ReturnArrivalDate": null,
            "SegmentCount": segments,
            "Amount": amount
        })
    }

    fn parse(values: Vec<serde_json::Value>) -> Vec<ItineraryRow> {
        ItineraryRow::parse_batch(serde_json::Value::Array(values)).unwrap()
    }

    #[test]
    fn test_forward_hours_across_zones() {
        let table = airports();
        let rows = parse(vec![row("r1", "JFKCDG", 1, 100.0)]);
        let out = FeatureEngineer::new(&table).transform(&rows);

        // 22:00 UTC-5 is 04:00 next day in UTC+1, arrival at 12:00 local
        assert_eq!(
            out[0].departure_date_conv,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 11).unwrap().and_hms_opt(4, 0, 0)
        );
        assert_eq!(out[0].forw_hours, Some(8.0));
        assert_eq!(out[0].req_dep_hours_diff, Some(22.0));
        assert_eq!(out[0].dep_forw_country.as_deref(), Some("US"));
        assert_eq!(out[0].arr_forw_tz.as_deref(), Some("Etc/GMT-1"));
    }

    #[test]
    fn test_one_way_row_has_missing_return_features() {
        let table = airports();
        let rows = parse(vec![row("r1", "JFKCDG", 1, 100.0), row("r1", "JFKCDG", 1, 200.0)]);
        let out = FeatureEngineer::new(&table).transform(&rows);

        for r in &out {
            assert_eq!(r.airports.dep_back, "");
            assert_eq!(r.dep_back_tz, None);
            assert_eq!(r.arr_back_country, None);
            assert_eq!(r.return_departure_date_conv, None);
            assert_eq!(r.back_hours, None);
            assert_eq!(r.total_hours, None);
            assert_eq!(r.back_hours_diff_min, None);
            assert_eq!(r.back_hours_diff_mean, None);
            assert_eq!(r.req_ret_hours_diff, None);
            assert_eq!(r.is_direct, 1);
        }
    }

    #[test]
    fn test_round_trip_features() {
        let table = airports();
        let mut value = row("r1", "JFKCDG/CDGJFK", 2, 300.0);
        value["RequestReturnDate"] = json!("2024-06-20");
        value["ReturnDepartureDate"] = json!("2024-06-20 10:00:00");
        value["ReturnArrivalDate"] = json!("2024-06-20 12:30:00");
        let out = FeatureEngineer::new(&table).transform(&parse(vec![value]));

        // 10:00 UTC+1 is 04:00 UTC-5, so the return takes 8.5h
        assert_eq!(out[0].back_hours, Some(8.5));
        assert_eq!(out[0].total_hours, Some(16.5));
        assert_eq!(out[0].req_ret_hours_diff, Some(10.0));
        assert_eq!(out[0].is_direct, 1);
    }

    fn round_trip(request_id: &str, arrival: &str, return_arrival: Option<&str>) -> serde_json::Value {
        let mut value = row(request_id, "JFKCDG/CDGJFK", 2, 300.0);
        value["ArrivalDate"] = json!(arrival);
        value["ReturnDepartureDate"] = json!("2024-06-20 10:00:00");
        value["ReturnArrivalDate"] = json!(return_arrival);
        value
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("feature should be present");
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_duration_relative_features_per_group() {
        let table = airports();
        let rows = parse(vec![
            round_trip("r1", "2024-06-11 12:00:00", Some("2024-06-20 12:30:00")),
            round_trip("r1", "2024-06-11 16:00:00", Some("2024-06-20 16:00:00")),
            round_trip("r1", "2024-06-11 14:00:00", None),
        ]);
        let out = FeatureEngineer::new(&table).transform(&rows);

        let forw: Vec<Option<f64>> = out.iter().map(|r| r.forw_hours).collect();
        let back: Vec<Option<f64>> = out.iter().map(|r| r.back_hours).collect();
        assert_eq!(forw, vec![Some(8.0), Some(12.0), Some(10.0)]);
        assert_eq!(back, vec![Some(8.5), Some(12.0), None]);

        // outbound: min 8, mean 10
        assert_close(out[0].forw_hours_diff_min, 0.0);
        assert_close(out[0].forw_hours_diff_mean, -0.25);
        assert_close(out[1].forw_hours_diff_min, 4.0 / 12.0);
        assert_close(out[1].forw_hours_diff_mean, 2.0 / 12.0);
        assert_close(out[2].forw_hours_diff_min, 0.2);
        assert_close(out[2].forw_hours_diff_mean, 0.0);

        // return: the missing leg is skipped, so min 8.5, mean 10.25
        assert_close(out[0].back_hours_diff_min, 0.0);
        assert_close(out[0].back_hours_diff_mean, -1.75 / 8.5);
        assert_close(out[1].back_hours_diff_min, 3.5 / 12.0);
        assert_close(out[1].back_hours_diff_mean, 1.75 / 12.0);
        assert_eq!(out[2].back_hours_diff_min, None);
        assert_eq!(out[2].back_hours_diff_mean, None);
        assert_eq!(out[2].total_hours, None);
    }

    #[test]
    fn test_price_relative_features_per_group() {
        let table = airports();
        let rows = parse(vec![
            row("a", "JFKCDG", 1, 100.0),
            row("b", "JFKCDG", 1, 50.0),
            row("a", "JFKCDG", 1, 200.0),
            row("a", "JFKCDG", 1, 0.0),
        ]);
        let out = FeatureEngineer::new(&table).transform(&rows);

        // group "a": min 0, mean 100
        assert_eq!(out[0].price_diff_min_perc, Some(1.0));
        assert_eq!(out[0].price_diff_mean_perc, Some(0.0));
        assert_eq!(out[2].price_diff_min_perc, Some(1.0));
        assert_eq!(out[2].price_diff_mean_perc, Some(0.5));
        // zero price has no defined relative distance
        assert_eq!(out[3].price_diff_min_perc, None);
        assert_eq!(out[3].price_diff_mean_perc, None);
        // group "b" is on its own
        assert_eq!(out[1].price_diff_min_perc, Some(0.0));
        assert_eq!(out[1].price_diff_mean_perc, Some(0.0));
    }

    #[test]
    fn test_unknown_airport_degrades_to_missing() {
        let table = airports();
        let rows = parse(vec![row("r1", "XXXCDG", 1, 100.0), row("r1", "JFKCDG", 1, 100.0)]);
        let out = FeatureEngineer::new(&table).transform(&rows);

        assert_eq!(out[0].dep_forw_tz, None);
        assert_eq!(out[0].departure_date_conv, None);
        assert_eq!(out[0].forw_hours, None);
        assert_eq!(out[0].forw_hours_diff_min, None);
        // the sibling still gets group features computed over known values only
        assert_eq!(out[1].forw_hours_diff_min, Some(0.0));
        assert_eq!(out[1].forw_hours_diff_mean, Some(0.0));
    }

    #[test]
    fn test_classify_direct() {
        assert_eq!(classify_direct(Some(1), None), 1);
        assert_eq!(classify_direct(Some(2), Some(5.0)), 1);
        assert_eq!(classify_direct(Some(2), None), 0);
        assert_eq!(classify_direct(Some(3), Some(2.0)), 0);
        assert_eq!(classify_direct(Some(1), Some(3.0)), 0);
        assert_eq!(classify_direct(Some(2), Some(0.0)), 0);
        assert_eq!(classify_direct(None, None), 0);
    }

    #[test]
    fn test_enriched_row_serializes_missing_as_null() {
        let table = airports();
        let out = FeatureEngineer::new(&table).transform(&parse(vec![row("r1", "JFKCDG", 1, 100.0)]));
        let value = serde_json::to_value(&out[0]).unwrap();

        assert_eq!(value["RequestID"], json!("r1"));
        assert_eq!(value["dep_forw"], json!("JFK"));
        assert_eq!(value["back_hours"], serde_json::Value::Null);
        assert_eq!(value["forw_hours"], json!(8.0));
        assert_eq!(value["TravellerGrade"], json!("Unknown"));
    }
}
