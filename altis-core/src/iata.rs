use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Airport Reference Data
// ============================================================================

/// Static metadata for one IATA airport code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportRecord {
    #[serde(alias = "tz")]
    pub timezone: String,
    pub country: String,
}

/// Read-only IATA code -> airport lookup, built once at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "HashMap<String, AirportRecord>")]
pub struct AirportTable {
    records: HashMap<String, AirportRecord>,
}

impl AirportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, record: AirportRecord) {
        self.records.insert(code.into().trim().to_ascii_uppercase(), record);
    }

    /// Merge `other` over this table; entries in `other` win.
    pub fn extend(&mut self, other: AirportTable) {
        for (code, record) in other.records {
            self.insert(code, record);
        }
    }

    pub fn get(&self, code: &str) -> Option<&AirportRecord> {
        self.records.get(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<HashMap<String, AirportRecord>> for AirportTable {
    fn from(records: HashMap<String, AirportRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<(S, AirportRecord)> for AirportTable {
    fn from_iter<I: IntoIterator<Item = (S, AirportRecord)>>(iter: I) -> Self {
        let mut table = AirportTable::new();
        for (code, record) in iter {
            table.insert(code, record);
        }
        table
    }
}

// ============================================================================
// Route Parsing
// ============================================================================

/// The four airport codes encoded in a `SearchRoute`.
///
/// Return-leg codes are empty strings when the route has no return segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAirports {
    pub dep_forw: String,
    pub arr_forw: String,
    pub dep_back: String,
    pub arr_back: String,
}

impl RouteAirports {
    pub fn has_return(&self) -> bool {
        !self.dep_back.is_empty()
    }
}

const CODE_LEN: usize = 3;
const LEG_LEN: usize = CODE_LEN * 2;

/// Resolves route strings and airport codes against an [`AirportTable`]
#[derive(Debug, Clone, Copy)]
pub struct AirportResolver<'a> {
    table: &'a AirportTable,
}

impl<'a> AirportResolver<'a> {
    pub fn new(table: &'a AirportTable) -> Self {
        Self { table }
    }

    /// Split a route such as `MOWLED` or `MOWLED/LEDMOW` into its airport codes.
    ///
    /// A leg that is not exactly two three-letter codes yields empty codes.
    pub fn extract_airports(route: &str) -> RouteAirports {
        let legs: Vec<String> = route
            .split('/')
            .map(|leg| {
                leg.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_uppercase()
            })
            .filter(|leg| !leg.is_empty())
            .collect();

        // Both legs glued together without a separator
        let legs = match legs.as_slice() {
            [single] if single.len() == LEG_LEN * 2 => {
                vec![single[..LEG_LEN].to_string(), single[LEG_LEN..].to_string()]
            }
            _ => legs,
        };

        let (dep_forw, arr_forw) = legs.first().map(|leg| split_leg(leg)).unwrap_or_default();
        let (dep_back, arr_back) = legs.get(1).map(|leg| split_leg(leg)).unwrap_or_default();

        RouteAirports {
            dep_forw,
            arr_forw,
            dep_back,
            arr_back,
        }
    }

    /// Look up (timezone, country) for a code. Unknown or empty codes give `(None, None)`.
    pub fn resolve(&self, code: &str) -> (Option<&'a str>, Option<&'a str>) {
        if code.is_empty() {
            return (None, None);
        }
        match self.table.get(code) {
            Some(record) => (Some(record.timezone.as_str()), Some(record.country.as_str())),
            None => {
                tracing::warn!("Unknown airport code {}", code);
                (None, None)
            }
        }
    }
}

fn split_leg(leg: &str) -> (String, String) {
    if leg.len() != LEG_LEN {
        tracing::warn!("Malformed route leg {:?}", leg);
        return (String::new(), String::new());
    }
    (leg[..CODE_LEN].to_string(), leg[CODE_LEN..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AirportTable {
        [
            ("SVO", AirportRecord { timezone: "Europe/Moscow".to_string(), country: "RU".to_string() }),
            ("JFK", AirportRecord { timezone: "America/New_York".to_string(), country: "US".to_string() }),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_extract_one_way_route() {
        let airports = AirportResolver::extract_airports("SVOJFK");
        assert_eq!(airports.dep_forw, "SVO");
        assert_eq!(airports.arr_forw, "JFK");
        assert_eq!(airports.dep_back, "");
        assert_eq!(airports.arr_back, "");
        assert!(!airports.has_return());
    }

    #[test]
    fn test_extract_round_trip_route() {
        let airports = AirportResolver::extract_airports("svojfk/JFKSVO");
        assert_eq!(airports.dep_forw, "SVO");
        assert_eq!(airports.arr_forw, "JFK");
        assert_eq!(airports.dep_back, "JFK");
        assert_eq!(airports.arr_back, "SVO");
        assert!(airports.has_return());

        let glued = AirportResolver::extract_airports("SVOJFKJFKSVO");
        assert_eq!(glued, airports);
    }

    #[test]
    fn test_extract_malformed_route() {
        assert_eq!(AirportResolver::extract_airports(""), RouteAirports::default());

        let airports = AirportResolver::extract_airports("SVOJ/JFKSVO");
        assert_eq!(airports.dep_forw, "");
        assert_eq!(airports.dep_back, "JFK");
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let table = table();
        let resolver = AirportResolver::new(&table);

        assert_eq!(resolver.resolve("JFK"), (Some("America/New_York"), Some("US")));
        assert_eq!(resolver.resolve("XXX"), (None, None));
        assert_eq!(resolver.resolve(""), (None, None));
    }

    #[test]
    fn test_table_extend_overrides() {
        let mut base = table();
        let extra: AirportTable = [(
            "jfk",
            AirportRecord { timezone: "America/Chicago".to_string(), country: "US".to_string() },
        )]
        .into_iter()
        .collect();
        base.extend(extra);

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("JFK").map(|r| r.timezone.as_str()), Some("America/Chicago"));
    }

    #[test]
    fn test_table_deserialization() {
        let json = r#"{ "led": { "tz": "Europe/Moscow", "country": "RU" } }"#;
        let table: AirportTable = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(table.get("LED").map(|r| r.country.as_str()), Some("RU"));
    }
}
