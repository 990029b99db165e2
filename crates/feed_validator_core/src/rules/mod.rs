mod block_overlap;
mod duplicate_stops;
mod routes;
mod shape_direction;
mod stop_shape_distance;
mod trip_sequence;
mod unused_stop;

pub use block_overlap::BlockOverlapValidator;
pub use duplicate_stops::DuplicateStopsValidator;
pub use routes::RouteFieldValidator;
pub use shape_direction::ShapeDirectionValidator;
pub use stop_shape_distance::StopShapeDistanceValidator;
pub use trip_sequence::TripSequenceValidator;
pub use unused_stop::UnusedStopValidator;

use crate::{ValidationConfig, ValidatorRunner};

/// Trip level checks, in the order their findings are reported.
pub fn trip_runner(config: &ValidationConfig) -> ValidatorRunner {
    let mut runner = ValidatorRunner::new();
    runner.register(UnusedStopValidator);
    runner.register(TripSequenceValidator);
    runner.register(BlockOverlapValidator);
    runner.register(ShapeDirectionValidator::new(config.distance_multiplier));
    runner
}

/// Every check, configured from `config`.
pub fn default_runner(config: &ValidationConfig) -> ValidatorRunner {
    let mut runner = ValidatorRunner::new();
    runner.register(RouteFieldValidator::from_config(config));
    runner.register(UnusedStopValidator);
    runner.register(TripSequenceValidator);
    runner.register(BlockOverlapValidator);
    runner.register(ShapeDirectionValidator::new(config.distance_multiplier));
    runner.register(DuplicateStopsValidator::new(config.buffer_distance_meters));
    runner.register(StopShapeDistanceValidator::new(
        config.stop_shape_distance_meters,
    ));
    runner
}
