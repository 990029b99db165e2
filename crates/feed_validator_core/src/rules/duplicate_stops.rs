use rustc_hash::FxHashSet;

use feedlint_model::Stop;

use crate::config::DEFAULT_BUFFER_DISTANCE_METERS;
use crate::geometry::{Envelope, GeometryError, PlanarPoint};
use crate::spatial_index::SpatialIndexBuilder;
use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext, Validator};

/// Stop identity qualified by agency.
type QualifiedStopId<'a> = (&'a str, &'a str);

/// Stops closer to each other than `buffer_distance` meters.
#[derive(Debug, Clone)]
pub struct DuplicateStopsValidator {
    buffer_distance: f64,
}

impl Default for DuplicateStopsValidator {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_DISTANCE_METERS)
    }
}

impl DuplicateStopsValidator {
    pub fn new(buffer_distance: f64) -> Self {
        Self {
            buffer_distance: buffer_distance.abs(),
        }
    }
}

impl Validator for DuplicateStopsValidator {
    fn name(&self) -> &'static str {
        "duplicate_stops"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let feed = ctx.feed();
        let geometry = ctx.geometry();
        let agency_id = feed.default_agency_id();
        let stops = feed.all_stops();

        let mut projected: Vec<Option<PlanarPoint>> = Vec::with_capacity(stops.len());
        let mut builder = SpatialIndexBuilder::with_capacity(stops.len());
        for (index, stop) in stops.iter().enumerate() {
            let point = stop
                .coordinates()
                .and_then(|(lat, lon)| match geometry.project_to_planar(lat, lon) {
                    Ok(point) => Some(point),
                    Err(err) => {
                        report.push(coordinate_out_of_range(stop, err));
                        None
                    }
                });
            if let Some(point) = point {
                builder.insert(Envelope::of_point(point), index);
            }
            projected.push(point);
        }
        let spatial_index = builder.build();

        let mut reported: FxHashSet<(QualifiedStopId<'_>, QualifiedStopId<'_>)> =
            FxHashSet::default();
        for (index, stop) in stops.iter().enumerate() {
            let Some(point) = projected[index] else {
                continue;
            };
            let mut candidates: Vec<usize> = spatial_index
                .query(&geometry.buffer(point, self.buffer_distance))
                .copied()
                .filter(|candidate| *candidate != index)
                .collect();
            candidates.sort_unstable();

            for candidate in candidates {
                let other = &stops[candidate];
                if other.stop_id == stop.stop_id {
                    continue;
                }
                let key = canonical_pair(
                    (agency_id, stop.stop_id.as_str()),
                    (agency_id, other.stop_id.as_str()),
                );
                if reported.contains(&key) {
                    continue;
                }
                let Some(other_point) = projected[candidate] else {
                    continue;
                };
                let distance = geometry.distance(point, other_point);
                if distance <= self.buffer_distance {
                    reported.insert(key);
                    report.push(duplicate_finding(stop, other, distance));
                }
            }
        }
    }
}

fn canonical_pair<'a>(
    a: QualifiedStopId<'a>,
    b: QualifiedStopId<'a>,
) -> (QualifiedStopId<'a>, QualifiedStopId<'a>) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn duplicate_finding(a: &Stop, b: &Stop, distance: f64) -> Finding {
    let (id_a, id_b) = (a.stop_id.as_str(), b.stop_id.as_str());
    Finding::new(
        RuleCode::DuplicateStops,
        EntityKind::Stop,
        "stop_lat,stop_lon",
        format!("{id_a},{id_b}"),
        format!("Stops {id_a} and {id_b} are {distance:.2} m apart"),
    )
    .with_context_field("stopIdA", id_a)
    .with_context_field("stopIdB", id_b)
    .with_context_field("distanceMeters", distance)
}

fn coordinate_out_of_range(stop: &Stop, err: GeometryError) -> Finding {
    let GeometryError::CoordinateOutOfRange { lat, lon } = err;
    Finding::new(
        RuleCode::CoordinateOutOfRange,
        EntityKind::Stop,
        "stop_lat,stop_lon",
        stop.stop_id.as_str(),
        format!("Stop {} has coordinates ({lat}, {lon}) outside the projection", stop.stop_id),
    )
    .with_context_field("stopLat", lat)
    .with_context_field("stopLon", lon)
}
