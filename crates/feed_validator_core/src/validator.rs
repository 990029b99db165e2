use std::panic::{catch_unwind, AssertUnwindSafe};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::{EntityKind, Finding, Report, RuleCode, ValidationContext};

pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report);
}

/// Runs registered validators against one context.
///
/// Each validator writes its own report; reports are merged in registration
/// order whether or not the `parallel` feature is enabled.
#[derive(Default)]
pub struct ValidatorRunner {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorRunner {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn register<V>(&mut self, validator: V)
    where
        V: Validator + 'static,
    {
        self.validators.push(Box::new(validator));
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn run(&self, ctx: &ValidationContext<'_>) -> Report {
        self.run_with_progress(ctx, &NoOpProgressHandler)
    }

    pub fn run_with_progress(
        &self,
        ctx: &ValidationContext<'_>,
        progress: &dyn ProgressHandler,
    ) -> Report {
        progress.set_total_validators(self.validators.len());

        #[cfg(feature = "parallel")]
        let reports: Vec<Report> = self
            .validators
            .par_iter()
            .map(|validator| run_one(validator.as_ref(), ctx, progress))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let reports: Vec<Report> = self
            .validators
            .iter()
            .map(|validator| run_one(validator.as_ref(), ctx, progress))
            .collect();

        let mut merged = Report::new();
        for report in reports {
            merged.merge(report);
        }
        merged
    }
}

fn run_one(
    validator: &dyn Validator,
    ctx: &ValidationContext<'_>,
    progress: &dyn ProgressHandler,
) -> Report {
    progress.on_start_validation(validator.name());
    let mut report = Report::new();
    let result = catch_unwind(AssertUnwindSafe(|| validator.validate(ctx, &mut report)));
    if let Err(panic) = result {
        report.push(runtime_exception_in_validator(
            validator.name(),
            panic_payload_message(&*panic),
        ));
    }
    debug!(
        validator = validator.name(),
        findings = report.len(),
        "validator finished"
    );
    progress.on_finish_validation(validator.name(), report.len());
    report
}

fn runtime_exception_in_validator(validator: &str, message: String) -> Finding {
    Finding::new(
        RuleCode::RuntimeExceptionInValidator,
        EntityKind::Feed,
        "",
        validator,
        format!("validator {validator} panicked: {message}"),
    )
    .with_context_field("exception", "panic")
    .with_context_field("message", message)
    .with_context_field("validator", validator)
}

fn panic_payload_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::{GtfsFeed, UtmProjection, ValidationConfig};

    struct NamedValidator(&'static str);

    impl Validator for NamedValidator {
        fn name(&self) -> &'static str {
            self.0
        }

        fn validate(&self, _ctx: &ValidationContext<'_>, report: &mut Report) {
            report.push(Finding::new(
                RuleCode::UnusedStop,
                EntityKind::Stop,
                "stop_id",
                self.0,
                "validator ran",
            ));
        }
    }

    struct PanickingValidator;

    impl Validator for PanickingValidator {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn validate(&self, _ctx: &ValidationContext<'_>, _report: &mut Report) {
            panic!("boom");
        }
    }

    #[test]
    fn merges_reports_in_registration_order() {
        let mut runner = ValidatorRunner::new();
        for name in ["first", "second", "third", "fourth"] {
            runner.register(NamedValidator(name));
        }
        let feed = GtfsFeed::default();
        let config = ValidationConfig::default();
        let projection = UtmProjection::default();
        let ctx = ValidationContext::new(&feed, &projection, &config);

        let ids: Vec<_> = runner
            .run(&ctx)
            .iter()
            .map(|finding| finding.entity_id.clone())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third", "fourth"]);
    }

    #[derive(Default)]
    struct RecordingProgress {
        total: Mutex<usize>,
        finished: Mutex<Vec<(String, usize)>>,
    }

    impl ProgressHandler for RecordingProgress {
        fn set_total_validators(&self, count: usize) {
            *self.total.lock().unwrap() = count;
        }

        fn on_finish_validation(&self, validator_name: &str, findings: usize) {
            self.finished
                .lock()
                .unwrap()
                .push((validator_name.to_string(), findings));
        }
    }

    #[test]
    fn reports_finding_counts_to_progress() {
        let mut runner = ValidatorRunner::new();
        runner.register(NamedValidator("named"));
        runner.register(PanickingValidator);
        let feed = GtfsFeed::default();
        let config = ValidationConfig::default();
        let projection = UtmProjection::default();
        let ctx = ValidationContext::new(&feed, &projection, &config);

        let progress = RecordingProgress::default();
        runner.run_with_progress(&ctx, &progress);
        assert_eq!(*progress.total.lock().unwrap(), 2);
        let mut finished = progress.finished.lock().unwrap().clone();
        finished.sort();
        assert_eq!(
            finished,
            vec![("named".to_string(), 1), ("panicking".to_string(), 1)]
        );
    }

    #[test]
    fn converts_panic_into_finding() {
        let mut runner = ValidatorRunner::new();
        runner.register(PanickingValidator);
        runner.register(NamedValidator("after"));
        let feed = GtfsFeed::default();
        let config = ValidationConfig::default();
        let projection = UtmProjection::default();
        let ctx = ValidationContext::new(&feed, &projection, &config);

        let report = runner.run(&ctx);
        assert_eq!(report.len(), 2);
        let panic = report
            .with_code(RuleCode::RuntimeExceptionInValidator)
            .next()
            .unwrap();
        assert_eq!(panic.context_str("message"), Some("boom"));
        assert_eq!(panic.context_str("validator"), Some("panicking"));
    }
}
