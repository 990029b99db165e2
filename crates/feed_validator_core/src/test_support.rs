//! Feed builders shared by the unit tests.

use feedlint_model::{
    Calendar, GtfsDate, GtfsTime, ServiceAvailability, ShapePoint, Stop, StopTime, Trip,
};

use crate::geometry::{GeometryAdapter, GeometryError, PlanarPoint};
use crate::{GtfsFeed, Report, ValidationConfig, ValidationContext, Validator};

/// Treats latitude/longitude as planar meters so distances can be checked by
/// hand.
pub(crate) struct IdentityProjection;

impl GeometryAdapter for IdentityProjection {
    fn project_to_planar(&self, lat: f64, lon: f64) -> Result<PlanarPoint, GeometryError> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 1.0e6 || lon.abs() > 1.0e6 {
            return Err(GeometryError::CoordinateOutOfRange { lat, lon });
        }
        Ok(PlanarPoint::new(lon, lat))
    }
}

pub(crate) fn feed_with(build: impl FnOnce(&mut GtfsFeed)) -> GtfsFeed {
    let mut feed = GtfsFeed::default();
    build(&mut feed);
    feed
}

pub(crate) fn run_validator(validator: &dyn Validator, feed: &GtfsFeed) -> Report {
    let config = ValidationConfig::default();
    let ctx = ValidationContext::new(feed, &IdentityProjection, &config);
    let mut report = Report::new();
    validator.validate(&ctx, &mut report);
    report
}

pub(crate) fn time(value: &str) -> GtfsTime {
    GtfsTime::parse(value).expect("time")
}

pub(crate) fn stop(id: &str, lat: f64, lon: f64) -> Stop {
    Stop {
        stop_id: id.into(),
        stop_lat: Some(lat),
        stop_lon: Some(lon),
        ..Default::default()
    }
}

pub(crate) fn trip(
    id: &str,
    service_id: &str,
    block_id: Option<&str>,
    shape_id: Option<&str>,
) -> Trip {
    Trip {
        route_id: "R1".into(),
        service_id: service_id.into(),
        trip_id: id.into(),
        block_id: block_id.map(Into::into),
        shape_id: shape_id.map(Into::into),
        ..Default::default()
    }
}

pub(crate) fn stop_time(
    trip_id: &str,
    stop_id: &str,
    sequence: u32,
    arrival: &str,
    departure: &str,
) -> StopTime {
    let parse = |value: &str| (!value.is_empty()).then(|| time(value));
    StopTime {
        trip_id: trip_id.into(),
        stop_id: stop_id.into(),
        stop_sequence: sequence,
        arrival_time: parse(arrival),
        departure_time: parse(departure),
        ..Default::default()
    }
}

pub(crate) fn shape_point(shape_id: &str, sequence: u32, lat: f64, lon: f64) -> ShapePoint {
    ShapePoint {
        shape_id: shape_id.into(),
        shape_pt_lat: lat,
        shape_pt_lon: lon,
        shape_pt_sequence: sequence,
        shape_dist_traveled: None,
    }
}

/// Calendar running every day between `start` and `end`.
pub(crate) fn daily_calendar(service_id: &str, start: &str, end: &str) -> Calendar {
    Calendar {
        service_id: service_id.into(),
        monday: ServiceAvailability::Available,
        tuesday: ServiceAvailability::Available,
        wednesday: ServiceAvailability::Available,
        thursday: ServiceAvailability::Available,
        friday: ServiceAvailability::Available,
        saturday: ServiceAvailability::Available,
        sunday: ServiceAvailability::Available,
        start_date: GtfsDate::parse(start).expect("start date"),
        end_date: GtfsDate::parse(end).expect("end date"),
    }
}
