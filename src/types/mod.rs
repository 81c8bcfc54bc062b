pub mod events;
pub mod messaging;
pub mod user;
pub mod wishlist;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

/// Deserializes a server timestamp. The backend emits both MySQL-style
/// `"2025-05-24 10:00:00"` strings and RFC 3339; anything unparseable is
/// treated as absent rather than failing the whole payload.
pub(crate) fn deserialize_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_utc())
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    #[test]
    fn parses_mysql_and_rfc3339_timestamps() {
        assert!(parse_timestamp("2025-05-24 10:00:00").is_some());
        assert!(parse_timestamp("2025-05-24T10:00:00").is_some());
        assert!(parse_timestamp("2025-05-24T10:00:00+00:00").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
