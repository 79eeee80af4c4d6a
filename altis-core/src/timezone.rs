use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Re-expresses wall-clock timestamps between IANA timezones.
///
/// Unknown zones and non-existent local times (DST gaps) yield `None`;
/// ambiguous local times resolve to the earliest instant.
pub struct TimeConverter;

impl TimeConverter {
    /// Interpret `timestamp` as wall-clock time in `from_zone` and return the
    /// same instant as wall-clock time in `to_zone`.
    pub fn convert(timestamp: NaiveDateTime, from_zone: &str, to_zone: &str) -> Option<NaiveDateTime> {
        let from = parse_zone(from_zone)?;
        let to = parse_zone(to_zone)?;

        let Some(instant) = from.from_local_datetime(&timestamp).earliest() else {
            tracing::warn!("Local time {} does not exist in {}", timestamp, from_zone);
            return None;
        };

        Some(instant.with_timezone(&to).naive_local())
    }

    /// [`TimeConverter::convert`] over possibly-missing operands; any missing input gives `None`.
    pub fn convert_opt(
        timestamp: Option<NaiveDateTime>,
        from_zone: Option<&str>,
        to_zone: Option<&str>,
    ) -> Option<NaiveDateTime> {
        Self::convert(timestamp?, from_zone?, to_zone?)
    }
}

fn parse_zone(name: &str) -> Option<Tz> {
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            tracing::warn!("Unknown timezone {:?}", name);
            None
        }
    }
}
