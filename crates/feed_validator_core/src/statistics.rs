use chrono::NaiveDate;
use serde::Serialize;

use feedlint_model::ExceptionType;

use crate::GtfsFeed;

/// Entity counts and the calendar span of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatistics {
    pub agency_count: usize,
    pub route_count: usize,
    pub trip_count: usize,
    pub stop_count: usize,
    pub stop_time_count: usize,
    pub shape_point_count: usize,
    pub service_start: Option<NaiveDate>,
    pub service_end: Option<NaiveDate>,
}

impl FeedStatistics {
    pub fn from_feed(feed: &GtfsFeed) -> Self {
        let calendar_bounds = feed.all_calendars().iter().flat_map(|calendar| {
            [calendar.start_date.to_naive(), calendar.end_date.to_naive()]
        });
        let added_dates = feed
            .all_calendar_dates()
            .iter()
            .filter(|exception| exception.exception_type == ExceptionType::Added)
            .map(|exception| exception.date.to_naive());

        let (service_start, service_end) = calendar_bounds
            .chain(added_dates)
            .flatten()
            .fold((None, None), |(start, end): (Option<NaiveDate>, Option<NaiveDate>), date| {
                (
                    Some(start.map_or(date, |start| start.min(date))),
                    Some(end.map_or(date, |end| end.max(date))),
                )
            });

        Self {
            agency_count: feed.all_agencies().len(),
            route_count: feed.all_routes().len(),
            trip_count: feed.all_trips().len(),
            stop_count: feed.all_stops().len(),
            stop_time_count: feed.all_stop_times().len(),
            shape_point_count: feed.all_shape_points().len(),
            service_start,
            service_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{daily_calendar, feed_with, stop, trip};
    use crate::CsvTable;
    use feedlint_model::{CalendarDate, GtfsDate};

    #[test]
    fn counts_entities_and_service_span() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("A", 0.0, 0.0), stop("B", 0.0, 0.0)];
            feed.trips.rows = vec![trip("T1", "S1", None, None)];
            feed.calendar = Some(CsvTable::from_rows(vec![
                daily_calendar("S1", "20240301", "20240630"),
                daily_calendar("S2", "20240115", "20240401"),
            ]));
            feed.calendar_dates = Some(CsvTable::from_rows(vec![
                CalendarDate {
                    service_id: "S1".into(),
                    date: GtfsDate::parse("20240704").unwrap(),
                    exception_type: ExceptionType::Added,
                },
                CalendarDate {
                    service_id: "S1".into(),
                    date: GtfsDate::parse("20231225").unwrap(),
                    exception_type: ExceptionType::Removed,
                },
            ]));
        });

        let stats = FeedStatistics::from_feed(&feed);
        assert_eq!(stats.stop_count, 2);
        assert_eq!(stats.trip_count, 1);
        assert_eq!(stats.route_count, 0);
        assert_eq!(stats.service_start, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(stats.service_end, NaiveDate::from_ymd_opt(2024, 7, 4));
    }

    #[test]
    fn empty_feed_has_no_service_span() {
        let stats = FeedStatistics::from_feed(&GtfsFeed::default());
        assert_eq!(stats, FeedStatistics::default());
    }
}
