use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum GtfsParseError {
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("invalid date value: {0}")]
    InvalidDateValue(String),
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("invalid time value: {0}")]
    InvalidTimeValue(String),
}

/// Calendar date as written in the feed (`YYYYMMDD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GtfsDate {
    year: i32,
    month: u8,
    day: u8,
}

impl GtfsDate {
    pub fn parse(value: &str) -> Result<Self, GtfsParseError> {
        let trimmed = value.trim();
        if trimmed.len() != 8 || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(GtfsParseError::InvalidDateFormat(value.to_string()));
        }

        let year: i32 = trimmed[0..4]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;
        let month: u8 = trimmed[4..6]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;
        let day: u8 = trimmed[6..8]
            .parse()
            .map_err(|_| GtfsParseError::InvalidDateFormat(value.to_string()))?;

        if NaiveDate::from_ymd_opt(year, month as u32, day as u32).is_none() {
            return Err(GtfsParseError::InvalidDateValue(value.to_string()));
        }

        Ok(Self { year, month, day })
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    /// `None` only for dates that were never validated by [`GtfsDate::parse`].
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
    }
}

impl Default for GtfsDate {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 1,
        }
    }
}

impl fmt::Display for GtfsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

impl Serialize for GtfsDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GtfsDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GtfsDateVisitor;

        impl<'de> Visitor<'de> for GtfsDateVisitor {
            type Value = GtfsDate;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GTFS date in YYYYMMDD format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<GtfsDate, E> {
                GtfsDate::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(GtfsDateVisitor)
    }
}

/// Seconds since the start of the service day. May exceed 24h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GtfsTime {
    total_seconds: i32,
}

impl GtfsTime {
    pub fn from_seconds(total_seconds: i32) -> Self {
        Self { total_seconds }
    }

    pub fn parse(value: &str) -> Result<Self, GtfsParseError> {
        let trimmed = value.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 3 {
            return Err(GtfsParseError::InvalidTimeFormat(value.to_string()));
        }

        let hours: i32 = parts[0]
            .parse()
            .map_err(|_| GtfsParseError::InvalidTimeFormat(value.to_string()))?;
        let minutes: i32 = parts[1]
            .parse()
            .map_err(|_| GtfsParseError::InvalidTimeFormat(value.to_string()))?;
        let seconds: i32 = parts[2]
            .parse()
            .map_err(|_| GtfsParseError::InvalidTimeFormat(value.to_string()))?;

        if hours < 0 || !(0..=59).contains(&minutes) || !(0..=59).contains(&seconds) {
            return Err(GtfsParseError::InvalidTimeValue(value.to_string()));
        }

        let total_seconds = hours
            .checked_mul(3600)
            .and_then(|total| total.checked_add(minutes * 60 + seconds))
            .ok_or_else(|| GtfsParseError::InvalidTimeValue(value.to_string()))?;
        Ok(Self { total_seconds })
    }

    pub fn total_seconds(&self) -> i32 {
        self.total_seconds
    }

    pub fn hours(&self) -> i32 {
        self.total_seconds / 3600
    }

    pub fn minutes(&self) -> i32 {
        (self.total_seconds % 3600) / 60
    }

    pub fn seconds(&self) -> i32 {
        self.total_seconds % 60
    }
}

impl fmt::Display for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl Serialize for GtfsTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GtfsTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GtfsTimeVisitor;

        impl<'de> Visitor<'de> for GtfsTimeVisitor {
            type Value = GtfsTime;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GTFS time in HH:MM:SS format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<GtfsTime, E> {
                GtfsTime::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(GtfsTimeVisitor)
    }
}

/// Route mode. Codes outside the basic table are kept verbatim in `Other` so
/// range checks can still see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Tram,
    Subway,
    Rail,
    Bus,
    Ferry,
    CableCar,
    Gondola,
    Funicular,
    Other(i32),
}

impl RouteType {
    pub fn from_code(value: i32) -> Self {
        match value {
            0 => RouteType::Tram,
            1 => RouteType::Subway,
            2 => RouteType::Rail,
            3 => RouteType::Bus,
            4 => RouteType::Ferry,
            5 => RouteType::CableCar,
            6 => RouteType::Gondola,
            7 => RouteType::Funicular,
            other => RouteType::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            RouteType::Tram => 0,
            RouteType::Subway => 1,
            RouteType::Rail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableCar => 5,
            RouteType::Gondola => 6,
            RouteType::Funicular => 7,
            RouteType::Other(code) => code,
        }
    }
}

impl<'de> Deserialize<'de> for RouteType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RouteTypeVisitor;

        impl<'de> Visitor<'de> for RouteTypeVisitor {
            type Value = RouteType;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GTFS route_type numeric value")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RouteType, E> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(E::custom("empty route_type"));
                }
                let parsed: i32 = trimmed.parse().map_err(E::custom)?;
                Ok(RouteType::from_code(parsed))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RouteType, E> {
                Ok(RouteType::from_code(value as i32))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RouteType, E> {
                Ok(RouteType::from_code(value as i32))
            }
        }

        deserializer.deserialize_any(RouteTypeVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
pub enum ServiceAvailability {
    #[default]
    #[serde(rename = "0")]
    Unavailable,
    #[serde(rename = "1")]
    Available,
    #[serde(other)]
    Other,
}

impl ServiceAvailability {
    pub fn is_available(self) -> bool {
        matches!(self, ServiceAvailability::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
pub enum ExceptionType {
    #[serde(rename = "1")]
    Added,
    #[serde(rename = "2")]
    Removed,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Agency {
    pub agency_id: Option<String>,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Stop {
    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: Option<String>,
    pub stop_desc: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub parent_station: Option<String>,
}

impl Stop {
    pub fn has_coordinates(&self) -> bool {
        self.coordinates().is_some()
    }

    /// `(lat, lon)` when both are present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.stop_lat, self.stop_lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub agency_id: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
    pub route_type: RouteType,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            route_id: String::new(),
            agency_id: None,
            route_short_name: None,
            route_long_name: None,
            route_desc: None,
            route_type: RouteType::Bus,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Trip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
}

impl Trip {
    /// Trimmed block id, `None` when absent or blank.
    pub fn block(&self) -> Option<&str> {
        non_blank(self.block_id.as_deref())
    }

    pub fn shape(&self) -> Option<&str> {
        non_blank(self.shape_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: Option<GtfsTime>,
    pub departure_time: Option<GtfsTime>,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub shape_dist_traveled: Option<f64>,
}

impl StopTime {
    /// Arrival, falling back to departure when the arrival column is empty.
    pub fn arrival_or_departure(&self) -> Option<GtfsTime> {
        self.arrival_time.or(self.departure_time)
    }

    /// Departure, falling back to arrival when the departure column is empty.
    pub fn departure_or_arrival(&self) -> Option<GtfsTime> {
        self.departure_time.or(self.arrival_time)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Calendar {
    pub service_id: String,
    pub monday: ServiceAvailability,
    pub tuesday: ServiceAvailability,
    pub wednesday: ServiceAvailability,
    pub thursday: ServiceAvailability,
    pub friday: ServiceAvailability,
    pub saturday: ServiceAvailability,
    pub sunday: ServiceAvailability,
    pub start_date: GtfsDate,
    pub end_date: GtfsDate,
}

impl Calendar {
    pub fn availability(&self, weekday: Weekday) -> ServiceAvailability {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: GtfsDate,
    pub exception_type: ExceptionType,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    pub shape_dist_traveled: Option<f64>,
}

impl ShapePoint {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if self.shape_pt_lat.is_finite() && self.shape_pt_lon.is_finite() {
            Some((self.shape_pt_lat, self.shape_pt_lon))
        } else {
            None
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gtfs_date() {
        let date = GtfsDate::parse("20240131").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 31);
        assert_eq!(date.to_string(), "20240131");
        assert_eq!(date.to_naive(), NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(GtfsDate::parse("20240230").is_err());
        assert!(GtfsDate::parse("2024-01-01").is_err());
    }

    #[test]
    fn parses_time_past_midnight() {
        let time = GtfsTime::parse(" 25:10:05 ").unwrap();
        assert_eq!(time.total_seconds(), 25 * 3600 + 10 * 60 + 5);
        assert_eq!(time.to_string(), "25:10:05");
    }

    #[test]
    fn rejects_invalid_time() {
        assert!(GtfsTime::parse("25:99:00").is_err());
        assert!(GtfsTime::parse("bad").is_err());
    }

    #[test]
    fn rejects_hours_that_overflow_seconds() {
        assert!(matches!(
            GtfsTime::parse("999999:00:00"),
            Err(GtfsParseError::InvalidTimeValue(_))
        ));
        let largest = GtfsTime::parse("596523:14:07").unwrap();
        assert_eq!(largest.total_seconds(), i32::MAX);
    }

    #[test]
    fn route_type_keeps_unknown_codes() {
        assert_eq!(RouteType::from_code(3), RouteType::Bus);
        assert_eq!(RouteType::from_code(3).code(), 3);
        assert_eq!(RouteType::from_code(715).code(), 715);
        assert_eq!(RouteType::from_code(-1), RouteType::Other(-1));
    }

    #[test]
    fn non_finite_coordinates_are_unresolved() {
        let stop = Stop {
            stop_id: "S1".into(),
            stop_lat: Some(f64::NAN),
            stop_lon: Some(10.0),
            ..Default::default()
        };
        assert!(!stop.has_coordinates());
    }

    #[test]
    fn blank_block_id_is_absent() {
        let trip = Trip {
            block_id: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(trip.block(), None);
    }
}
