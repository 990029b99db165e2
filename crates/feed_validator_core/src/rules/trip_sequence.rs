use std::fmt;

use rustc_hash::FxHashMap;

use feedlint_model::{GtfsTime, StopTime};

use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext, Validator};

/// Stop-time ordering per trip, plus detection of trips that repeat another
/// trip's service, block, times and stop pattern.
#[derive(Debug, Default)]
pub struct TripSequenceValidator;

/// Identity of a trip's schedule. Two trips with equal signatures run the
/// same vehicle path at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TripSignature<'a> {
    service_id: &'a str,
    block_id: &'a str,
    first_departure: Option<GtfsTime>,
    last_arrival: Option<GtfsTime>,
    stop_ids: Vec<&'a str>,
}

impl fmt::Display for TripSignature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = |value: Option<GtfsTime>| value.map(|time| time.to_string()).unwrap_or_default();
        write!(
            f,
            "{}_{}_{}_{}_",
            self.service_id,
            self.block_id,
            time(self.first_departure),
            time(self.last_arrival)
        )?;
        for stop_id in &self.stop_ids {
            write!(f, "{stop_id},")?;
        }
        Ok(())
    }
}

impl Validator for TripSequenceValidator {
    fn name(&self) -> &'static str {
        "trip_sequence"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let Ok(index) = ctx.index() else {
            return;
        };
        let mut seen: FxHashMap<TripSignature<'_>, &str> = FxHashMap::default();

        for trip in ctx.feed().all_trips() {
            let trip_id = trip.trip_id.as_str();
            let stop_times = index.stop_times(trip_id);
            let (Some(first), Some(last)) = (stop_times.first(), stop_times.last()) else {
                report.push(Finding::new(
                    RuleCode::NoStopTimesForTrip,
                    EntityKind::Trip,
                    "trip_id",
                    trip_id,
                    format!("Trip Id {trip_id} has no stop times."),
                ));
                continue;
            };

            check_sequence(trip_id, stop_times, report);

            let signature = TripSignature {
                service_id: trip.service_id.as_str(),
                block_id: trip.block().unwrap_or(""),
                first_departure: first.departure_or_arrival(),
                last_arrival: last.arrival_or_departure(),
                stop_ids: stop_times
                    .iter()
                    .map(|stop_time| stop_time.stop_id.as_str())
                    .collect(),
            };
            if let Some(original_id) = seen.get(&signature).copied() {
                report.push(
                    Finding::new(
                        RuleCode::DuplicateTrip,
                        EntityKind::Trip,
                        "trip_id",
                        trip_id,
                        format!("Trip Ids {original_id} & {trip_id} are duplicates ({signature})"),
                    )
                    .with_context_field("tripIdA", original_id)
                    .with_context_field("tripIdB", trip_id),
                );
            } else {
                seen.insert(signature, trip_id);
            }
        }
    }
}

fn check_sequence(trip_id: &str, stop_times: &[&StopTime], report: &mut Report) {
    let mut previous: Option<&StopTime> = None;
    for stop_time in stop_times.iter().copied() {
        let times = (stop_time.arrival_time, stop_time.departure_time);
        if let (Some(arrival), Some(departure)) = times {
            if departure < arrival {
                report.push(
                    Finding::new(
                        RuleCode::StopTimeDepartureBeforeArrival,
                        EntityKind::StopTime,
                        "trip_id",
                        trip_id,
                        format!(
                            "Trip Id {trip_id} stop sequence {} departs before arriving.",
                            stop_time.stop_sequence
                        ),
                    )
                    .with_context_field("stopSequence", stop_time.stop_sequence),
                );
            }
        }

        let Some(arrival) = stop_time.arrival_or_departure() else {
            continue;
        };
        if let Some(prev) = previous {
            let prev_departure = prev.departure_or_arrival().unwrap_or(arrival);
            if arrival < prev_departure {
                report.push(
                    Finding::new(
                        RuleCode::StopTimesOutOfSequence,
                        EntityKind::StopTime,
                        "trip_id",
                        trip_id,
                        format!(
                            "Trip Id {trip_id} stop sequence {} arrives before departing {}",
                            stop_time.stop_sequence, prev.stop_sequence
                        ),
                    )
                    .with_context_field("stopSequence", stop_time.stop_sequence)
                    .with_context_field("previousStopSequence", prev.stop_sequence),
                );
                // Only the first inversion per trip is reported.
                break;
            }
        }
        previous = Some(stop_time);
    }
}
