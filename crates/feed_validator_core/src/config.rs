use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::ServiceDatePolicy;

pub const DEFAULT_BUFFER_DISTANCE_METERS: f64 = 2.0;
pub const DEFAULT_DISTANCE_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_STOP_SHAPE_DISTANCE_METERS: f64 = 130.0;
pub const DEFAULT_MAX_ROUTE_SHORT_NAME_LENGTH: usize = 6;
pub const DEFAULT_MIN_ROUTE_TYPE: i32 = 0;
pub const DEFAULT_MAX_ROUTE_TYPE: i32 = 7;

/// Tunables shared by every validator of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    pub buffer_distance_meters: f64,
    pub distance_multiplier: f64,
    pub stop_shape_distance_meters: f64,
    pub max_route_short_name_length: usize,
    pub min_route_type: i32,
    pub max_route_type: i32,
    pub service_date_policy: ServiceDatePolicy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            buffer_distance_meters: DEFAULT_BUFFER_DISTANCE_METERS,
            distance_multiplier: DEFAULT_DISTANCE_MULTIPLIER,
            stop_shape_distance_meters: DEFAULT_STOP_SHAPE_DISTANCE_METERS,
            max_route_short_name_length: DEFAULT_MAX_ROUTE_SHORT_NAME_LENGTH,
            min_route_type: DEFAULT_MIN_ROUTE_TYPE,
            max_route_type: DEFAULT_MAX_ROUTE_TYPE,
            service_date_policy: ServiceDatePolicy::default(),
        }
    }
}

impl ValidationConfig {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn route_type_range(&self) -> RangeInclusive<i32> {
        self.min_route_type..=self.max_route_type
    }
}
