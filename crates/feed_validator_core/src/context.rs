use std::sync::OnceLock;

use tracing::debug;

use crate::{
    ActiveDateSet, FeedIndex, FeedIntegrityError, GeometryAdapter, GtfsFeed, ValidationConfig,
};

/// Everything a validator may read during one run.
///
/// Derived state is built on first use and shared across worker threads.
pub struct ValidationContext<'a> {
    feed: &'a GtfsFeed,
    geometry: &'a dyn GeometryAdapter,
    config: &'a ValidationConfig,
    index: OnceLock<Result<FeedIndex<'a>, FeedIntegrityError>>,
    active_dates: OnceLock<ActiveDateSet>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        feed: &'a GtfsFeed,
        geometry: &'a dyn GeometryAdapter,
        config: &'a ValidationConfig,
    ) -> Self {
        Self {
            feed,
            geometry,
            config,
            index: OnceLock::new(),
            active_dates: OnceLock::new(),
        }
    }

    pub fn feed(&self) -> &'a GtfsFeed {
        self.feed
    }

    pub fn geometry(&self) -> &'a dyn GeometryAdapter {
        self.geometry
    }

    pub fn config(&self) -> &'a ValidationConfig {
        self.config
    }

    pub fn index(&self) -> Result<&FeedIndex<'a>, FeedIntegrityError> {
        self.index
            .get_or_init(|| FeedIndex::build(self.feed))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn active_dates(&self) -> &ActiveDateSet {
        self.active_dates.get_or_init(|| {
            let dates = ActiveDateSet::build(
                self.feed.all_calendars(),
                self.feed.all_calendar_dates(),
                self.config.service_date_policy,
            );
            debug!(services = dates.service_count(), "expanded service calendars");
            dates
        })
    }
}
