use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, SecondsFormat};
use rustc_hash::FxHashMap;
use serde::Serialize;

use feedlint_core::{
    FeedStatistics, Finding, FindingSeverity, Report, RuleCode, ValidationConfig,
};

mod html;

pub use html::{write_html_report, HtmlReportContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingCounts {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl FindingCounts {
    pub fn from_report(report: &Report) -> Self {
        let mut counts = Self::default();
        for finding in report.iter() {
            counts.total += 1;
            match finding.severity {
                FindingSeverity::Error => counts.errors += 1,
                FindingSeverity::Warning => counts.warnings += 1,
                FindingSeverity::Info => counts.infos += 1,
            }
        }
        counts
    }
}

/// Run metadata collected by the caller before the report is assembled.
#[derive(Debug, Clone, Default)]
pub struct ReportSummaryContext {
    feed_input: Option<PathBuf>,
    feed_input_uri: Option<String>,
    output_path: Option<PathBuf>,
    validated_at: Option<String>,
    validation_time_seconds: Option<f64>,
    validator_version: Option<String>,
    threads: Option<u32>,
    config: Option<ValidationConfig>,
    statistics: Option<FeedStatistics>,
}

impl ReportSummaryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed_input(mut self, path: impl AsRef<Path>) -> Self {
        self.feed_input = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_feed_input_uri(mut self, uri: impl Into<String>) -> Self {
        self.feed_input_uri = Some(uri.into());
        self
    }

    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_validated_at(mut self, validated_at: impl Into<String>) -> Self {
        self.validated_at = Some(validated_at.into());
        self
    }

    pub fn with_validation_time_seconds(mut self, seconds: f64) -> Self {
        self.validation_time_seconds = Some(seconds);
        self
    }

    pub fn with_validator_version(mut self, version: impl Into<String>) -> Self {
        self.validator_version = Some(version.into());
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_config(mut self, config: &ValidationConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn with_statistics(mut self, statistics: FeedStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_input_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ValidationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<FeedStatistics>,
    pub counts: FindingCounts,
}

impl ReportSummary {
    /// `validated_at` defaults to the current local time.
    pub fn from_context(context: ReportSummaryContext) -> Self {
        let validated_at = context
            .validated_at
            .unwrap_or_else(|| Local::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        Self {
            validator_version: context.validator_version,
            feed_input: context
                .feed_input
                .map(|path| path.display().to_string()),
            feed_input_uri: context.feed_input_uri,
            output_path: context
                .output_path
                .map(|path| path.display().to_string()),
            validated_at: Some(validated_at),
            validation_time_seconds: context.validation_time_seconds,
            threads: context.threads,
            config: context.config,
            statistics: context.statistics,
            counts: FindingCounts::default(),
        }
    }
}

/// All findings sharing one rule code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingGroup {
    pub code: RuleCode,
    pub severity: FindingSeverity,
    pub total_findings: usize,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub summary: ReportSummary,
    pub notices: Vec<FindingGroup>,
}

impl ValidationReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Groups are ordered errors first, then by rule code. Findings keep
    /// their report order inside a group.
    pub fn from_report_with_summary(report: &Report, mut summary: ReportSummary) -> Self {
        summary.counts = FindingCounts::from_report(report);
        Self {
            summary,
            notices: group_findings(report),
        }
    }

    pub fn to_json_string(&self, pretty: bool) -> anyhow::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
        .context("serialize validation report")
    }

    pub fn write_json_with_format<P: AsRef<Path>>(
        &self,
        path: P,
        pretty: bool,
    ) -> anyhow::Result<()> {
        let json = self.to_json_string(pretty)?;
        fs::write(&path, format!("{}\n", json))
            .with_context(|| format!("write report to {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub(crate) fn severity_rank(severity: FindingSeverity) -> u8 {
    match severity {
        FindingSeverity::Error => 0,
        FindingSeverity::Warning => 1,
        FindingSeverity::Info => 2,
    }
}

fn group_findings(report: &Report) -> Vec<FindingGroup> {
    let mut by_code: FxHashMap<RuleCode, Vec<Finding>> = FxHashMap::default();
    for finding in report.iter() {
        by_code.entry(finding.code).or_default().push(finding.clone());
    }
    let mut groups: Vec<FindingGroup> = by_code
        .into_iter()
        .map(|(code, findings)| FindingGroup {
            code,
            severity: code.severity(),
            total_findings: findings.len(),
            findings,
        })
        .collect();
    groups.sort_by_key(|group| (severity_rank(group.severity), group.code));
    groups
}
