use tracing::{debug, warn};

use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::rules::{
    default_runner, trip_runner, DuplicateStopsValidator, RouteFieldValidator,
    ShapeDirectionValidator, StopShapeDistanceValidator,
};
use crate::{
    FeedIntegrityError, FeedStatistics, GeometryAdapter, GtfsFeed, Report, UtmProjection,
    ValidationConfig, ValidationContext, Validator, ValidatorRunner,
};

/// Entry points over one immutable feed snapshot.
pub struct ValidationEngine<'a> {
    feed: &'a GtfsFeed,
    geometry: Box<dyn GeometryAdapter + 'a>,
    config: ValidationConfig,
}

impl<'a> ValidationEngine<'a> {
    /// Projects with the UTM zone of the feed's mean stop longitude.
    pub fn new(feed: &'a GtfsFeed, config: ValidationConfig) -> Self {
        let projection =
            UtmProjection::fitted_to(feed.all_stops().iter().filter_map(|stop| stop.coordinates()));
        debug!(zone = projection.zone(), "selected UTM zone");
        Self::with_geometry(feed, projection, config)
    }

    pub fn with_geometry<G>(feed: &'a GtfsFeed, geometry: G, config: ValidationConfig) -> Self
    where
        G: GeometryAdapter + 'a,
    {
        Self {
            feed,
            geometry: Box::new(geometry),
            config,
        }
    }

    pub fn feed(&self) -> &'a GtfsFeed {
        self.feed
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    fn context(&self) -> ValidationContext<'_> {
        ValidationContext::new(self.feed, self.geometry.as_ref(), &self.config)
    }

    fn run_single(&self, validator: impl Validator + 'static) -> Report {
        let mut runner = ValidatorRunner::new();
        runner.register(validator);
        runner.run(&self.context())
    }

    /// Like `run_single`, for validators that read stop times through the
    /// feed index.
    fn run_checked(
        &self,
        validator: impl Validator + 'static,
    ) -> Result<Report, FeedIntegrityError> {
        let ctx = self.context();
        check_integrity(&ctx)?;
        let mut runner = ValidatorRunner::new();
        runner.register(validator);
        Ok(runner.run(&ctx))
    }

    pub fn validate_routes(&self) -> Report {
        self.run_single(RouteFieldValidator::from_config(&self.config))
    }

    /// Unused stops, stop-time ordering, duplicate trips, block overlaps and
    /// reversed shapes.
    pub fn validate_trips(&self) -> Result<Report, FeedIntegrityError> {
        let ctx = self.context();
        check_integrity(&ctx)?;
        Ok(trip_runner(&self.config).run(&ctx))
    }

    pub fn find_duplicate_stops(&self, buffer_distance: f64) -> Report {
        self.run_single(DuplicateStopsValidator::new(buffer_distance))
    }

    pub fn find_reversed_trip_shapes(
        &self,
        distance_multiplier: f64,
    ) -> Result<Report, FeedIntegrityError> {
        self.run_checked(ShapeDirectionValidator::new(distance_multiplier))
    }

    pub fn find_stops_away_from_shape(
        &self,
        max_distance: f64,
    ) -> Result<Report, FeedIntegrityError> {
        self.run_checked(StopShapeDistanceValidator::new(max_distance))
    }

    pub fn statistics(&self) -> FeedStatistics {
        FeedStatistics::from_feed(self.feed)
    }

    pub fn validate_all(&self) -> Result<Report, FeedIntegrityError> {
        self.validate_all_with_progress(&NoOpProgressHandler)
    }

    pub fn validate_all_with_progress(
        &self,
        progress: &dyn ProgressHandler,
    ) -> Result<Report, FeedIntegrityError> {
        let ctx = self.context();
        check_integrity(&ctx)?;
        let report = default_runner(&self.config).run_with_progress(&ctx, progress);
        debug!(findings = report.len(), "validation finished");
        Ok(report)
    }
}

fn check_integrity(ctx: &ValidationContext<'_>) -> Result<(), FeedIntegrityError> {
    ctx.index().map(|_| ()).map_err(|err| {
        warn!(error = %err, "feed failed integrity checks");
        err
    })
}
