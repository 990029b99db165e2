use rustc_hash::FxHashMap;

use feedlint_model::{ShapePoint, StopTime, Trip};

use crate::config::DEFAULT_DISTANCE_MULTIPLIER;
use crate::geometry::{GeometryAdapter, GeometryError, PlanarPoint};
use crate::{EntityKind, Finding, FeedIndex, Report, RuleCode, ValidationContext, Validator};

/// Flags trips whose first stop sits near the end of their shape and whose
/// last stop sits near its start.
#[derive(Debug, Clone)]
pub struct ShapeDirectionValidator {
    distance_multiplier: f64,
}

impl Default for ShapeDirectionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_MULTIPLIER)
    }
}

impl ShapeDirectionValidator {
    pub fn new(distance_multiplier: f64) -> Self {
        Self {
            distance_multiplier,
        }
    }
}

struct Endpoints<T> {
    first: T,
    last: T,
}

/// Lowest and highest sequence entries; on ties the entry seen last wins.
fn endpoints_by<T: Copy>(
    items: impl IntoIterator<Item = T>,
    sequence: impl Fn(T) -> u32,
) -> Option<Endpoints<T>> {
    let mut endpoints: Option<Endpoints<T>> = None;
    for item in items {
        match endpoints.as_mut() {
            None => {
                endpoints = Some(Endpoints {
                    first: item,
                    last: item,
                })
            }
            Some(current) => {
                if sequence(item) <= sequence(current.first) {
                    current.first = item;
                }
                if sequence(item) >= sequence(current.last) {
                    current.last = item;
                }
            }
        }
    }
    endpoints
}

enum TripGeometry {
    Resolved {
        first_stop: PlanarPoint,
        last_stop: PlanarPoint,
        shape_start: PlanarPoint,
        shape_end: PlanarPoint,
    },
    Missing(Finding),
}

impl Validator for ShapeDirectionValidator {
    fn name(&self) -> &'static str {
        "shape_direction"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let Ok(index) = ctx.index() else {
            return;
        };
        let geometry = ctx.geometry();

        let mut shape_points: FxHashMap<&str, Vec<&ShapePoint>> = FxHashMap::default();
        for point in ctx.feed().all_shape_points() {
            shape_points
                .entry(point.shape_id.as_str())
                .or_default()
                .push(point);
        }
        let shape_endpoints: FxHashMap<&str, Endpoints<&ShapePoint>> = shape_points
            .into_iter()
            .filter_map(|(shape_id, points)| {
                endpoints_by(points, |point| point.shape_pt_sequence)
                    .map(|endpoints| (shape_id, endpoints))
            })
            .collect();

        for trip in ctx.feed().all_trips() {
            let trip_id = trip.trip_id.as_str();
            let Some(shape_id) = trip.shape() else {
                report.push(missing_shape(trip_id, format!("Trip {trip_id} is missing a shape")));
                continue;
            };
            let Some(shape) = shape_endpoints.get(shape_id) else {
                report.push(missing_shape(
                    trip_id,
                    format!("Trip {trip_id} references unknown shape {shape_id}"),
                ));
                continue;
            };

            match resolve(trip, shape, index, geometry) {
                TripGeometry::Missing(finding) => report.push(finding),
                TripGeometry::Resolved {
                    first_stop,
                    last_stop,
                    shape_start,
                    shape_end,
                } => {
                    let first_to_start = geometry.distance(first_stop, shape_start);
                    let first_to_end = geometry.distance(first_stop, shape_end);
                    let last_to_end = geometry.distance(last_stop, shape_end);
                    let last_to_start = geometry.distance(last_stop, shape_start);
                    if first_to_start > first_to_end * self.distance_multiplier
                        && last_to_end > last_to_start * self.distance_multiplier
                    {
                        report.push(
                            Finding::new(
                                RuleCode::ReversedTripShape,
                                EntityKind::Trip,
                                "shape_id",
                                trip_id,
                                format!("Trip {trip_id} references reversed shape {shape_id}"),
                            )
                            .with_context_field("shapeId", shape_id)
                            .with_context_field("distanceMultiplier", self.distance_multiplier),
                        );
                    }
                }
            }
        }
    }
}

fn resolve(
    trip: &Trip,
    shape: &Endpoints<&ShapePoint>,
    index: &FeedIndex<'_>,
    geometry: &dyn GeometryAdapter,
) -> TripGeometry {
    let trip_id = trip.trip_id.as_str();
    let missing_coordinates = || {
        TripGeometry::Missing(Finding::new(
            RuleCode::MissingCoordinates,
            EntityKind::Trip,
            "shape_id",
            trip_id,
            format!("Trip {trip_id} is missing coordinates"),
        ))
    };

    let stop_times = index.stop_times(trip_id).iter().copied();
    let Some(stops) = endpoints_by(stop_times, |stop_time: &StopTime| stop_time.stop_sequence)
    else {
        return missing_coordinates();
    };
    let coordinates = |stop_time: &StopTime| {
        index
            .stop(&stop_time.stop_id)
            .and_then(|stop| stop.coordinates())
    };
    let (Some(first_stop), Some(last_stop), Some(shape_start), Some(shape_end)) = (
        coordinates(stops.first),
        coordinates(stops.last),
        shape.first.coordinates(),
        shape.last.coordinates(),
    ) else {
        return missing_coordinates();
    };

    let project = |(lat, lon): (f64, f64)| geometry.project_to_planar(lat, lon);
    match (
        project(first_stop),
        project(last_stop),
        project(shape_start),
        project(shape_end),
    ) {
        (Ok(first_stop), Ok(last_stop), Ok(shape_start), Ok(shape_end)) => {
            TripGeometry::Resolved {
                first_stop,
                last_stop,
                shape_start,
                shape_end,
            }
        }
        (Err(err), ..) | (_, Err(err), ..) | (_, _, Err(err), _) | (.., Err(err)) => {
            TripGeometry::Missing(coordinate_out_of_range(trip_id, err))
        }
    }
}

fn missing_shape(trip_id: &str, message: String) -> Finding {
    Finding::new(
        RuleCode::MissingShape,
        EntityKind::Trip,
        "shape_id",
        trip_id,
        message,
    )
}

fn coordinate_out_of_range(trip_id: &str, err: GeometryError) -> Finding {
    let GeometryError::CoordinateOutOfRange { lat, lon } = err;
    Finding::new(
        RuleCode::CoordinateOutOfRange,
        EntityKind::Trip,
        "shape_id",
        trip_id,
        format!("Trip {trip_id} has coordinates ({lat}, {lon}) outside the projection"),
    )
    .with_context_field("lat", lat)
    .with_context_field("lon", lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{feed_with, run_validator, shape_point, stop, stop_time, trip};
    use crate::{CsvTable, GtfsFeed, UtmProjection, ValidationConfig};

    /// Shape S1 runs north from (0, 0) to (100, 0).
    fn feed_with_trip(first_lat: f64, last_lat: f64) -> GtfsFeed {
        feed_with(|feed| {
            feed.stops.rows = vec![stop("FIRST", first_lat, 0.0), stop("LAST", last_lat, 0.0)];
            feed.trips.rows = vec![trip("T1", "S1", None, Some("S1"))];
            feed.stop_times.rows = vec![
                stop_time("T1", "FIRST", 1, "08:00:00", "08:00:00"),
                stop_time("T1", "LAST", 2, "08:30:00", "08:30:00"),
            ];
            feed.shapes = Some(CsvTable::from_rows(vec![
                shape_point("S1", 2, 50.0, 0.0),
                shape_point("S1", 1, 0.0, 0.0),
                shape_point("S1", 3, 100.0, 0.0),
            ]));
        })
    }

    #[test]
    fn trip_following_its_shape_is_fine() {
        let report = run_validator(&ShapeDirectionValidator::default(), &feed_with_trip(1.0, 99.0));
        assert!(report.is_empty());
    }

    #[test]
    fn reports_reversed_shape() {
        let report = run_validator(&ShapeDirectionValidator::default(), &feed_with_trip(99.0, 1.0));
        assert_eq!(report.len(), 1);
        let finding = report.iter().next().unwrap();
        assert_eq!(finding.code, RuleCode::ReversedTripShape);
        assert_eq!(finding.message, "Trip T1 references reversed shape S1");
    }

    #[test]
    fn both_ends_must_look_reversed() {
        // First stop is near the end, last stop is also near the end.
        let feed = feed_with_trip(99.0, 98.0);
        let report = run_validator(&ShapeDirectionValidator::default(), &feed);
        assert!(report.is_empty());
    }

    #[test]
    fn larger_multiplier_never_flags_more_trips() {
        let feeds: Vec<_> = [(99.0, 1.0), (60.0, 40.0), (70.0, 45.0), (1.0, 99.0)]
            .into_iter()
            .map(|(first, last)| feed_with_trip(first, last))
            .collect();
        let mut previous = usize::MAX;
        for multiplier in [0.5, 1.0, 1.5, 2.0, 5.0, 50.0] {
            let validator = ShapeDirectionValidator::new(multiplier);
            let flagged: usize = feeds
                .iter()
                .map(|feed| run_validator(&validator, feed).count(RuleCode::ReversedTripShape))
                .sum();
            assert!(flagged <= previous, "multiplier {multiplier} flagged {flagged}");
            previous = flagged;
        }
    }

    #[test]
    fn missing_and_unknown_shapes() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("A", 0.0, 0.0)];
            feed.trips.rows = vec![
                trip("T1", "S1", None, None),
                trip("T2", "S1", None, Some("NOPE")),
            ];
            feed.stop_times.rows = vec![
                stop_time("T1", "A", 1, "08:00:00", "08:00:00"),
                stop_time("T2", "A", 1, "08:00:00", "08:00:00"),
            ];
        });
        let report = run_validator(&ShapeDirectionValidator::default(), &feed);
        assert_eq!(report.count(RuleCode::MissingShape), 2);
    }

    #[test]
    fn stop_without_coordinates_is_reported() {
        let mut feed = feed_with_trip(1.0, 99.0);
        feed.stops.rows[1].stop_lon = None;
        let report = run_validator(&ShapeDirectionValidator::default(), &feed);
        assert_eq!(report.len(), 1);
        assert_eq!(
            report.iter().next().unwrap().code,
            RuleCode::MissingCoordinates
        );
    }

    #[test]
    fn trip_without_stop_times_is_missing_coordinates() {
        let mut feed = feed_with_trip(1.0, 99.0);
        feed.stop_times.rows.clear();
        let report = run_validator(&ShapeDirectionValidator::default(), &feed);
        assert_eq!(report.count(RuleCode::MissingCoordinates), 1);
    }

    #[test]
    fn unprojectable_shape_only_affects_its_own_trip() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("P1", 48.85, 2.30), stop("P2", 48.86, 2.40)];
            feed.trips.rows = vec![
                trip("T1", "S1", None, Some("RIVER")),
                trip("T2", "S1", None, Some("POLAR")),
            ];
            feed.stop_times.rows = vec![
                stop_time("T1", "P2", 1, "08:00:00", "08:00:00"),
                stop_time("T1", "P1", 2, "08:20:00", "08:20:00"),
                stop_time("T2", "P1", 1, "09:00:00", "09:00:00"),
                stop_time("T2", "P2", 2, "09:20:00", "09:20:00"),
            ];
            feed.shapes = Some(CsvTable::from_rows(vec![
                shape_point("RIVER", 1, 48.85, 2.30),
                shape_point("RIVER", 2, 48.86, 2.40),
                shape_point("POLAR", 1, 89.0, 2.30),
                shape_point("POLAR", 2, 48.86, 2.40),
            ]));
        });
        let projection = UtmProjection::new(31);
        let config = ValidationConfig::default();
        let ctx = ValidationContext::new(&feed, &projection, &config);
        let mut report = Report::new();
        ShapeDirectionValidator::default().validate(&ctx, &mut report);

        let results: Vec<_> = report
            .iter()
            .map(|finding| (finding.code, finding.entity_id.as_str()))
            .collect();
        assert_eq!(
            results,
            vec![
                (RuleCode::ReversedTripShape, "T1"),
                (RuleCode::CoordinateOutOfRange, "T2"),
            ]
        );
    }

    #[test]
    fn ties_on_sequence_take_the_last_seen_point() {
        let mut feed = feed_with_trip(99.0, 1.0);
        // A later point with the same lowest sequence moves the shape start
        // next to the first stop, so the trip no longer looks reversed.
        if let Some(shapes) = feed.shapes.as_mut() {
            shapes.rows.push(shape_point("S1", 1, 99.0, 0.0));
        }
        let report = run_validator(&ShapeDirectionValidator::default(), &feed);
        assert!(report.is_empty());
    }
}
