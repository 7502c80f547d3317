//! "HH:MM" wall-clock helpers shared by slots, schedules and appointments.

use chrono::{NaiveTime, Timelike};

/// Slot granularity in minutes.
pub const SLOT_MINUTES: u32 = 15;

pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// True for :00, :15, :30 and :45 with no seconds.
pub fn is_quarter_hour(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0 && time.minute() % SLOT_MINUTES == 0
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).ok_or_else(|| D::Error::custom(format!("invalid HH:MM time: {}", raw)))
    }
}

/// Calendar dates as "YYYY-MM-DD". Full ISO timestamps are accepted on input
/// and cut to their date part.
pub mod ymd {
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let day = raw.trim().get(..10).unwrap_or(raw.trim());
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| D::Error::custom(format!("invalid date: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(parse_hhmm("09:15"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_hhmm("9:15"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_hhmm("17:00:00"), NaiveTime::from_hms_opt(17, 0, 0));
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_hhmm("nine"), None);
    }

    #[test]
    fn quarter_hours() {
        assert!(is_quarter_hour(NaiveTime::from_hms_opt(9, 45, 0).unwrap()));
        assert!(!is_quarter_hour(NaiveTime::from_hms_opt(9, 40, 0).unwrap()));
        assert!(!is_quarter_hour(NaiveTime::from_hms_opt(9, 45, 30).unwrap()));
    }

    #[test]
    fn dates_accept_iso_timestamps() {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(with = "ymd")]
            date: chrono::NaiveDate,
        }

        let row: Row = serde_json::from_str(r#"{"date": "2024-06-03T00:00:00.000Z"}"#).unwrap();
        assert_eq!(row.date, chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());

        assert!(serde_json::from_str::<Row>(r#"{"date": "June 3rd"}"#).is_err());
    }
}
