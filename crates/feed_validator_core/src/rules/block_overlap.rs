use rustc_hash::FxHashMap;

use feedlint_model::{GtfsTime, Trip};

use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext, Validator};

/// Trips sharing a block must not run at the same time on the same day.
#[derive(Debug, Default)]
pub struct BlockOverlapValidator;

#[derive(Debug, Clone, Copy)]
struct BlockInterval<'a> {
    trip: &'a Trip,
    start: GtfsTime,
    first_arrival: GtfsTime,
    last_departure: GtfsTime,
}

impl BlockInterval<'_> {
    fn disjoint_from(&self, other: &BlockInterval<'_>) -> bool {
        self.last_departure <= other.first_arrival || other.last_departure <= self.first_arrival
    }
}

impl Validator for BlockOverlapValidator {
    fn name(&self) -> &'static str {
        "block_overlap"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let Ok(index) = ctx.index() else {
            return;
        };

        let mut block_order: Vec<&str> = Vec::new();
        let mut blocks: FxHashMap<&str, Vec<BlockInterval<'_>>> = FxHashMap::default();
        for trip in ctx.feed().all_trips() {
            let Some(block_id) = trip.block() else {
                continue;
            };
            let stop_times = index.stop_times(&trip.trip_id);
            let (Some(first), Some(last)) = (stop_times.first(), stop_times.last()) else {
                continue;
            };
            let (Some(start), Some(first_arrival), Some(last_departure)) = (
                first.departure_or_arrival(),
                first.arrival_or_departure(),
                last.departure_or_arrival(),
            ) else {
                continue;
            };
            let intervals = blocks.entry(block_id).or_insert_with(|| {
                block_order.push(block_id);
                Vec::new()
            });
            intervals.push(BlockInterval {
                trip,
                start,
                first_arrival,
                last_departure,
            });
        }

        let active_dates = ctx.active_dates();
        for block_id in block_order {
            let Some(intervals) = blocks.get_mut(block_id) else {
                continue;
            };
            intervals.sort_by_key(|interval| interval.start);

            for (position, a) in intervals.iter().enumerate() {
                for b in &intervals[position + 1..] {
                    if a.trip.trip_id == b.trip.trip_id || a.disjoint_from(b) {
                        continue;
                    }
                    let same_service = a.trip.service_id == b.trip.service_id;
                    if same_service
                        || active_dates.share_any_date(&a.trip.service_id, &b.trip.service_id)
                    {
                        report.push(overlap_finding(block_id, a, b));
                    }
                }
            }
        }
    }
}

fn overlap_finding(block_id: &str, a: &BlockInterval<'_>, b: &BlockInterval<'_>) -> Finding {
    let (trip_a, trip_b) = (a.trip.trip_id.as_str(), b.trip.trip_id.as_str());
    Finding::new(
        RuleCode::OverlappingTripsInBlock,
        EntityKind::Trip,
        "block_id",
        block_id,
        format!("Trip Ids {trip_a} & {trip_b} overlap and share block Id {block_id}"),
    )
    .with_context_field("blockId", block_id)
    .with_context_field("tripIdA", trip_a)
    .with_context_field("tripIdB", trip_b)
    .with_context_field("serviceIdA", a.trip.service_id.as_str())
    .with_context_field("serviceIdB", b.trip.service_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{daily_calendar, feed_with, run_validator, stop, stop_time, trip};
    use crate::CsvTable;

    fn block_feed(
        trips: Vec<(&str, &str, &str, &str, &str)>,
        calendars: Vec<feedlint_model::Calendar>,
    ) -> crate::GtfsFeed {
        feed_with(|feed| {
            feed.stops.rows = vec![stop("A", 0.0, 0.0), stop("B", 0.0, 0.0)];
            for (trip_id, service_id, block_id, start, end) in trips {
                feed.trips.rows.push(trip(trip_id, service_id, Some(block_id), None));
                feed.stop_times.rows.push(stop_time(trip_id, "A", 1, start, start));
                feed.stop_times.rows.push(stop_time(trip_id, "B", 2, end, end));
            }
            feed.calendar = Some(CsvTable::from_rows(calendars));
        })
    }

    #[test]
    fn overlapping_trips_with_same_service() {
        let feed = block_feed(
            vec![
                ("T1", "S1", "B1", "08:00:00", "08:30:00"),
                ("T2", "S1", "B1", "08:15:00", "08:45:00"),
            ],
            vec![],
        );
        let report = run_validator(&BlockOverlapValidator, &feed);
        assert_eq!(report.len(), 1);
        let finding = report.iter().next().unwrap();
        assert_eq!(finding.code, RuleCode::OverlappingTripsInBlock);
        assert_eq!(finding.entity_id, "B1");
        assert_eq!(finding.context_str("tripIdA"), Some("T1"));
        assert_eq!(finding.context_str("tripIdB"), Some("T2"));
        assert_eq!(
            finding.message,
            "Trip Ids T1 & T2 overlap and share block Id B1"
        );
    }

    #[test]
    fn back_to_back_trips_do_not_overlap() {
        let feed = block_feed(
            vec![
                ("T1", "S1", "B1", "08:00:00", "08:30:00"),
                ("T2", "S1", "B1", "08:30:00", "09:00:00"),
            ],
            vec![],
        );
        assert!(run_validator(&BlockOverlapValidator, &feed).is_empty());
    }

    #[test]
    fn different_services_need_a_common_date() {
        let overlapping = block_feed(
            vec![
                ("T1", "S1", "B1", "08:00:00", "08:30:00"),
                ("T2", "S2", "B1", "08:15:00", "08:45:00"),
            ],
            vec![
                daily_calendar("S1", "20240101", "20240131"),
                daily_calendar("S2", "20240115", "20240215"),
            ],
        );
        assert_eq!(run_validator(&BlockOverlapValidator, &overlapping).len(), 1);

        let disjoint = block_feed(
            vec![
                ("T1", "S1", "B1", "08:00:00", "08:30:00"),
                ("T2", "S2", "B1", "08:15:00", "08:45:00"),
            ],
            vec![
                daily_calendar("S1", "20240101", "20240131"),
                daily_calendar("S2", "20240201", "20240229"),
            ],
        );
        assert!(run_validator(&BlockOverlapValidator, &disjoint).is_empty());
    }

    #[test]
    fn services_without_dates_never_overlap() {
        let feed = block_feed(
            vec![
                ("T1", "S1", "B1", "08:00:00", "08:30:00"),
                ("T2", "S2", "B1", "08:15:00", "08:45:00"),
            ],
            vec![daily_calendar("S1", "20240101", "20240131")],
        );
        assert!(run_validator(&BlockOverlapValidator, &feed).is_empty());
    }

    #[test]
    fn blocks_are_reported_in_order_of_first_appearance() {
        let feed = block_feed(
            vec![
                ("T1", "S1", "ZED", "08:00:00", "08:30:00"),
                ("T2", "S1", "ALPHA", "08:00:00", "08:30:00"),
                ("T3", "S1", "ZED", "08:10:00", "08:40:00"),
                ("T4", "S1", "ALPHA", "08:10:00", "08:40:00"),
                ("T5", "S1", "ALPHA", "08:20:00", "08:50:00"),
            ],
            vec![],
        );
        let report = run_validator(&BlockOverlapValidator, &feed);
        let blocks: Vec<_> = report.iter().map(|finding| finding.entity_id.as_str()).collect();
        assert_eq!(blocks, vec!["ZED", "ALPHA", "ALPHA", "ALPHA"]);
    }

    #[test]
    fn trips_without_block_are_ignored() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("A", 0.0, 0.0)];
            feed.trips.rows = vec![
                trip("T1", "S1", Some("  "), None),
                trip("T2", "S1", None, None),
            ];
            feed.stop_times.rows = vec![
                stop_time("T1", "A", 1, "08:00:00", "08:30:00"),
                stop_time("T2", "A", 1, "08:00:00", "08:30:00"),
            ];
        });
        assert!(run_validator(&BlockOverlapValidator, &feed).is_empty());
    }
}
