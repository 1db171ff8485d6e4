use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time at the millisecond precision records are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// ISO-8601 with millisecond precision, as used in listing bodies.
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// RFC 1123 date for `Last-Modified` style headers.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter storing timestamps as ISO-8601 strings.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso8601(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_iso8601(&value).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {value}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de};

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::super::format_iso8601(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(value) if value.trim().is_empty() => Ok(None),
                Some(value) => super::super::parse_iso8601(&value)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {value}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn formats_listing_and_header_dates() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_iso8601(&dt), "2024-03-09T07:05:01.000Z");
        assert_eq!(format_http_date(&dt), "Sat, 09 Mar 2024 07:05:01 GMT");
    }

    #[test]
    fn now_survives_an_iso8601_round_trip() {
        let now = now();
        assert_eq!(parse_iso8601(&format_iso8601(&now)), Some(now));
        assert_eq!(parse_iso8601("2024-03-09T07:05:01+08:00").unwrap().to_rfc3339(), "2024-03-08T23:05:01+00:00");
        assert!(parse_iso8601("yesterday").is_none());
    }
}
