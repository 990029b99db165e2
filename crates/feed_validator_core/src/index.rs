use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use feedlint_model::{ShapePoint, Stop, StopTime};

use crate::GtfsFeed;

/// Broken references that make trip level checks meaningless.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedIntegrityError {
    #[error("trip_id {trip_id} is defined more than once")]
    DuplicateTripId { trip_id: String },
    #[error("stop time #{stop_sequence} references unknown trip {trip_id}")]
    UnknownTrip { trip_id: String, stop_sequence: u32 },
    #[error("trip {trip_id} references unknown stop {stop_id}")]
    UnknownStop { trip_id: String, stop_id: String },
}

/// Lookups derived once per run and shared by all validators.
#[derive(Debug, Default)]
pub struct FeedIndex<'a> {
    stops_by_id: FxHashMap<&'a str, &'a Stop>,
    stop_times_by_trip: FxHashMap<&'a str, Vec<&'a StopTime>>,
    shapes_by_id: FxHashMap<&'a str, Vec<&'a ShapePoint>>,
}

impl<'a> FeedIndex<'a> {
    pub fn build(feed: &'a GtfsFeed) -> Result<Self, FeedIntegrityError> {
        let mut stops_by_id = FxHashMap::default();
        for stop in feed.all_stops() {
            stops_by_id.entry(stop.stop_id.as_str()).or_insert(stop);
        }

        let mut trip_ids = FxHashSet::default();
        for trip in feed.all_trips() {
            if !trip_ids.insert(trip.trip_id.as_str()) {
                warn!(trip_id = %trip.trip_id, "duplicate trip id");
                return Err(FeedIntegrityError::DuplicateTripId {
                    trip_id: trip.trip_id.clone(),
                });
            }
        }

        let mut stop_times_by_trip: FxHashMap<&str, Vec<&StopTime>> = FxHashMap::default();
        for stop_time in feed.all_stop_times() {
            if !trip_ids.contains(stop_time.trip_id.as_str()) {
                warn!(trip_id = %stop_time.trip_id, "stop time references unknown trip");
                return Err(FeedIntegrityError::UnknownTrip {
                    trip_id: stop_time.trip_id.clone(),
                    stop_sequence: stop_time.stop_sequence,
                });
            }
            if !stops_by_id.contains_key(stop_time.stop_id.as_str()) {
                warn!(stop_id = %stop_time.stop_id, "stop time references unknown stop");
                return Err(FeedIntegrityError::UnknownStop {
                    trip_id: stop_time.trip_id.clone(),
                    stop_id: stop_time.stop_id.clone(),
                });
            }
            stop_times_by_trip
                .entry(stop_time.trip_id.as_str())
                .or_default()
                .push(stop_time);
        }
        // sort_by_key is stable: equal sequences keep input order.
        for stop_times in stop_times_by_trip.values_mut() {
            stop_times.sort_by_key(|stop_time| stop_time.stop_sequence);
        }

        let mut shapes_by_id: FxHashMap<&str, Vec<&ShapePoint>> = FxHashMap::default();
        for point in feed.all_shape_points() {
            shapes_by_id
                .entry(point.shape_id.as_str())
                .or_default()
                .push(point);
        }
        for points in shapes_by_id.values_mut() {
            points.sort_by_key(|point| point.shape_pt_sequence);
        }

        debug!(
            stops = stops_by_id.len(),
            trips = trip_ids.len(),
            shapes = shapes_by_id.len(),
            "built feed index"
        );
        Ok(Self {
            stops_by_id,
            stop_times_by_trip,
            shapes_by_id,
        })
    }

    pub fn stop(&self, stop_id: &str) -> Option<&'a Stop> {
        self.stops_by_id.get(stop_id).copied()
    }

    /// Stop times of `trip_id` ordered by stop sequence. Empty for trips
    /// without stop times.
    pub fn stop_times(&self, trip_id: &str) -> &[&'a StopTime] {
        self.stop_times_by_trip
            .get(trip_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Points of `shape_id` ordered by sequence.
    pub fn shape_points(&self, shape_id: &str) -> &[&'a ShapePoint] {
        self.shapes_by_id
            .get(shape_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
