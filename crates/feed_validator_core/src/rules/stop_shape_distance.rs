use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::DEFAULT_STOP_SHAPE_DISTANCE_METERS;
use crate::geometry::PlanarPoint;
use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext, Validator};

/// Stops served by a trip that lie too far from the trip's shape.
///
/// Trips whose shape or stops cannot be placed are skipped here; the shape
/// direction check reports those.
#[derive(Debug, Clone)]
pub struct StopShapeDistanceValidator {
    max_distance: f64,
}

impl Default for StopShapeDistanceValidator {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_SHAPE_DISTANCE_METERS)
    }
}

impl StopShapeDistanceValidator {
    pub fn new(max_distance: f64) -> Self {
        Self { max_distance }
    }
}

impl Validator for StopShapeDistanceValidator {
    fn name(&self) -> &'static str {
        "stop_shape_distance"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let Ok(index) = ctx.index() else {
            return;
        };
        let geometry = ctx.geometry();
        let project = |coordinates: Option<(f64, f64)>| {
            coordinates.and_then(|(lat, lon)| geometry.project_to_planar(lat, lon).ok())
        };

        let mut polylines: FxHashMap<&str, Option<Vec<PlanarPoint>>> = FxHashMap::default();
        let mut stop_points: FxHashMap<&str, Option<PlanarPoint>> = FxHashMap::default();
        let mut reported: FxHashSet<(&str, &str)> = FxHashSet::default();

        for trip in ctx.feed().all_trips() {
            let Some(shape_id) = trip.shape() else {
                continue;
            };
            let polyline = polylines.entry(shape_id).or_insert_with(|| {
                let points = index.shape_points(shape_id);
                if points.is_empty() {
                    return None;
                }
                points
                    .iter()
                    .map(|point| project(point.coordinates()))
                    .collect::<Option<Vec<_>>>()
            });
            let Some(polyline) = polyline.as_deref() else {
                continue;
            };

            for stop_time in index.stop_times(&trip.trip_id) {
                let stop_id = stop_time.stop_id.as_str();
                if reported.contains(&(shape_id, stop_id)) {
                    continue;
                }
                let point = *stop_points.entry(stop_id).or_insert_with(|| {
                    project(index.stop(stop_id).and_then(|stop| stop.coordinates()))
                });
                let Some(point) = point else {
                    continue;
                };
                let distance = geometry.distance_to_line(point, polyline);
                if distance > self.max_distance {
                    reported.insert((shape_id, stop_id));
                    report.push(
                        Finding::new(
                            RuleCode::StopTooFarFromShape,
                            EntityKind::Stop,
                            "stop_lat,stop_lon",
                            stop_id,
                            format!(
                                "Stop {stop_id} on trip {} is {distance:.2} m from shape {shape_id}",
                                trip.trip_id
                            ),
                        )
                        .with_context_field("tripId", trip.trip_id.as_str())
                        .with_context_field("shapeId", shape_id)
                        .with_context_field("stopId", stop_id)
                        .with_context_field("distanceMeters", distance),
                    );
                }
            }
        }
    }
}
