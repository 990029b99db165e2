use std::collections::HashSet;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use feedlint_core::{FeedStatistics, Finding, FindingSeverity};

use crate::{severity_rank, FindingGroup, ValidationReport};

const FINDING_ROW_LIMIT: usize = 50;

pub struct HtmlReportContext {
    pub feed_source: String,
}

impl HtmlReportContext {
    pub fn new(feed_source: impl Into<String>) -> Self {
        Self {
            feed_source: feed_source.into(),
        }
    }
}

pub fn write_html_report<P: AsRef<Path>>(
    path: P,
    report: &ValidationReport,
    context: &HtmlReportContext,
) -> anyhow::Result<()> {
    let html = render_html(report, context);
    fs::write(&path, html)
        .with_context(|| format!("write html report to {}", path.as_ref().display()))?;
    Ok(())
}

fn render_html(report: &ValidationReport, context: &HtmlReportContext) -> String {
    let summary = &report.summary;
    let mut out = String::new();
    out.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Transit Feed Validation Report</title>
    <meta name="robots" content="noindex, nofollow">
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/>
    <style>
    body {
        font-family: Helvetica, Arial, sans-serif;
        font-size: 14px;
        min-width: 800px;
        padding: 1em 2em;
    }
    .error:before { content: "\1F534  "; }
    .warning:before { content: "\1F7E0  "; }
    .info:before { content: "\26AA  "; }
    table { width: 100%; }
    table th {
        text-align: left;
        border-bottom: 2px solid #000;
        padding: 0.5em;
        white-space: nowrap;
    }
    table td {
        border-bottom: 1px solid #ddd;
        padding: 0.5em;
    }
    .summary dt, .summary dd { display: inline-block; }
    .summary dd {
        font-weight: bold;
        margin-inline-start: 0;
    }
    details > summary { cursor: pointer; }
    .desc-content {
        padding: 0.5em;
        border-top: 5px solid #000;
        border-bottom: 5px solid #000;
    }
    </style>
</head>
<body>
    <h1>Transit Feed Validation Report</h1>
    <p>Generated by feedlint"#,
    );
    if let Some(version) = &summary.validator_version {
        out.push_str(" version ");
        push_escaped(&mut out, version);
    }
    if let Some(validated_at) = &summary.validated_at {
        out.push_str(" at ");
        push_escaped(&mut out, validated_at);
    }
    out.push_str(" for the dataset ");
    push_escaped(&mut out, &context.feed_source);
    out.push_str(".</p>\n\n    <h2>Summary</h2>\n");

    if let Some(statistics) = &summary.statistics {
        render_statistics(&mut out, statistics);
    }

    let counts = &summary.counts;
    write!(
        out,
        "    <h3><span>{}</span> findings reported (<span>{}</span> errors, <span>{}</span> warnings, <span>{}</span> infos)</h3>\n\n",
        counts.total, counts.errors, counts.warnings, counts.infos
    )
    .ok();

    out.push_str("    <table>\n        <thead>\n        <tr><th>Rule</th><th>Severity</th><th>Total</th></tr>\n        </thead>\n        <tbody>\n");
    let mut groups: Vec<&FindingGroup> = report.notices.iter().collect();
    groups.sort_by_key(|group| (severity_rank(group.severity), group.code));
    for group in groups {
        render_group(&mut out, group);
    }
    out.push_str("        </tbody>\n    </table>\n</body>\n</html>\n");
    out
}

fn render_statistics(out: &mut String, statistics: &FeedStatistics) {
    let entries = [
        ("Agencies", statistics.agency_count.to_string()),
        ("Routes", statistics.route_count.to_string()),
        ("Trips", statistics.trip_count.to_string()),
        ("Stops", statistics.stop_count.to_string()),
        ("Stop times", statistics.stop_time_count.to_string()),
        ("Shape points", statistics.shape_point_count.to_string()),
        ("Service window", service_window_display(statistics)),
    ];
    out.push_str("    <dl class=\"summary\">\n");
    for (label, value) in entries {
        out.push_str("        <div><dt>");
        push_escaped(out, label);
        out.push_str(":</dt> <dd>");
        push_escaped(out, &value);
        out.push_str("</dd></div>\n");
    }
    out.push_str("    </dl>\n");
}

fn service_window_display(statistics: &FeedStatistics) -> String {
    match (statistics.service_start, statistics.service_end) {
        (Some(start), Some(end)) => format!(
            "{} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        _ => "N/A".to_string(),
    }
}

fn severity_label(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Error => "ERROR",
        FindingSeverity::Warning => "WARNING",
        FindingSeverity::Info => "INFO",
    }
}

fn severity_class(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Error => "error",
        FindingSeverity::Warning => "warning",
        FindingSeverity::Info => "info",
    }
}

fn render_group(out: &mut String, group: &FindingGroup) {
    let code = group.code.as_str();
    out.push_str("            <tr>\n                <td>");
    push_escaped(out, code);
    out.push_str("</td>\n                <td class=\"");
    out.push_str(severity_class(group.severity));
    out.push_str("\">");
    out.push_str(severity_label(group.severity));
    out.push_str("</td>\n                <td>");
    write!(out, "{}", group.total_findings).ok();
    out.push_str("</td>\n            </tr>\n            <tr>\n                <td colspan=\"3\">\n                    <details class=\"desc-content\">\n                        <summary>");
    push_escaped(out, code);
    out.push_str("</summary>\n");
    if group.findings.len() > FINDING_ROW_LIMIT {
        write!(
            out,
            "                        <p>Only the first {} of {} affected records are displayed below.</p>\n",
            FINDING_ROW_LIMIT,
            group.findings.len()
        )
        .ok();
    }

    let fields = finding_fields(&group.findings);
    out.push_str("                        <table>\n                            <thead><tr><th>entityId</th><th>message</th>");
    for field in &fields {
        out.push_str("<th>");
        push_escaped(out, field);
        out.push_str("</th>");
    }
    out.push_str("</tr></thead>\n                            <tbody>\n");
    for finding in group.findings.iter().take(FINDING_ROW_LIMIT) {
        out.push_str("                                <tr><td>");
        push_escaped(out, &finding.entity_id);
        out.push_str("</td><td>");
        push_escaped(out, &finding.message);
        out.push_str("</td>");
        for field in &fields {
            out.push_str("<td>");
            match finding.context.get(field.as_str()) {
                Some(value) => render_json_value(out, value),
                None => out.push_str("N/A"),
            }
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("                            </tbody>\n                        </table>\n                    </details>\n                </td>\n            </tr>\n");
}

/// Context columns in the order the first finding declared them, followed by
/// any keys only later findings carry.
fn finding_fields(findings: &[Finding]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for finding in findings {
        let keys = finding
            .field_order
            .iter()
            .chain(finding.context.keys());
        for key in keys {
            if seen.insert(key.clone()) {
                ordered.push(key.clone());
            }
        }
    }
    ordered
}

fn render_json_value(out: &mut String, value: &Value) {
    match value {
        Value::String(text) => push_escaped(out, text),
        Value::Number(num) => {
            if let Some(value) = num.as_i64() {
                write!(out, "{}", value).ok();
            } else if let Some(value) = num.as_f64() {
                write!(out, "{:.2}", value).ok();
            } else {
                out.push_str("N/A");
            }
        }
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Null => out.push_str("N/A"),
        other => push_escaped(out, &other.to_string()),
    }
}

fn push_escaped(out: &mut String, value: &str) {
    out.push_str(&escape_html(value));
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
