use rustc_hash::FxHashSet;

use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext, Validator};

#[derive(Debug, Default)]
pub struct UnusedStopValidator;

impl Validator for UnusedStopValidator {
    fn name(&self) -> &'static str {
        "unused_stop"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let feed = ctx.feed();
        let used: FxHashSet<&str> = feed
            .all_stop_times()
            .iter()
            .map(|stop_time| stop_time.stop_id.as_str())
            .collect();

        for (index, stop) in feed.stops.rows.iter().enumerate() {
            let stop_id = stop.stop_id.as_str();
            if used.contains(stop_id) {
                continue;
            }
            report.push(
                Finding::new(
                    RuleCode::UnusedStop,
                    EntityKind::Stop,
                    "stop_id",
                    stop_id,
                    format!("Stop Id {stop_id} is not used in any trips."),
                )
                .with_context_field("csvRowNumber", feed.stops.row_number(index)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{feed_with, run_validator, stop, stop_time, trip};

    #[test]
    fn reports_stops_without_stop_times_in_feed_order() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("B", 0.0, 0.0), stop("A", 0.0, 0.0), stop("C", 0.0, 0.0)];
            feed.trips.rows = vec![trip("T1", "S1", None, None)];
            feed.stop_times.rows = vec![stop_time("T1", "A", 1, "08:00:00", "08:00:00")];
        });
        let report = run_validator(&UnusedStopValidator, &feed);
        let ids: Vec<_> = report.iter().map(|finding| finding.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert!(report.iter().all(|finding| finding.code == RuleCode::UnusedStop));
    }

    #[test]
    fn no_findings_when_every_stop_is_served() {
        let feed = feed_with(|feed| {
            feed.stops.rows = vec![stop("A", 0.0, 0.0)];
            feed.stop_times.rows = vec![stop_time("T1", "A", 1, "08:00:00", "08:00:00")];
        });
        assert!(run_validator(&UnusedStopValidator, &feed).is_empty());
    }
}
