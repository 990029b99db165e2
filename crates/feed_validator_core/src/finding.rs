use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Error,
    Warning,
    Info,
}

/// Kind of feed record a finding is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Route,
    Stop,
    StopTime,
    Trip,
    Shape,
    Feed,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Route => "route",
            EntityKind::Stop => "stop",
            EntityKind::StopTime => "stop_time",
            EntityKind::Trip => "trip",
            EntityKind::Shape => "shape",
            EntityKind::Feed => "feed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleCode {
    RouteShortAndLongNamesAreBlank,
    ValidateRouteShortNameIsTooLong,
    ValidateRouteLongNameContainShortName,
    ValidateRouteDescriptionSameAsRouteName,
    ValidateRouteTypeInvalidValid,
    UnusedStop,
    NoStopTimesForTrip,
    StopTimeDepartureBeforeArrival,
    StopTimesOutOfSequence,
    DuplicateTrip,
    OverlappingTripsInBlock,
    DuplicateStops,
    MissingShape,
    MissingCoordinates,
    ReversedTripShape,
    CoordinateOutOfRange,
    StopTooFarFromShape,
    RuntimeExceptionInValidator,
}

impl RuleCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleCode::RouteShortAndLongNamesAreBlank => "RouteShortAndLongNamesAreBlank",
            RuleCode::ValidateRouteShortNameIsTooLong => "ValidateRouteShortNameIsTooLong",
            RuleCode::ValidateRouteLongNameContainShortName => {
                "ValidateRouteLongNameContainShortName"
            }
            RuleCode::ValidateRouteDescriptionSameAsRouteName => {
                "ValidateRouteDescriptionSameAsRouteName"
            }
            RuleCode::ValidateRouteTypeInvalidValid => "ValidateRouteTypeInvalidValid",
            RuleCode::UnusedStop => "UnusedStop",
            RuleCode::NoStopTimesForTrip => "NoStopTimesForTrip",
            RuleCode::StopTimeDepartureBeforeArrival => "StopTimeDepartureBeforeArrival",
            RuleCode::StopTimesOutOfSequence => "StopTimesOutOfSequence",
            RuleCode::DuplicateTrip => "DuplicateTrip",
            RuleCode::OverlappingTripsInBlock => "OverlappingTripsInBlock",
            RuleCode::DuplicateStops => "DuplicateStops",
            RuleCode::MissingShape => "MissingShape",
            RuleCode::MissingCoordinates => "MissingCoordinates",
            RuleCode::ReversedTripShape => "ReversedTripShape",
            RuleCode::CoordinateOutOfRange => "CoordinateOutOfRange",
            RuleCode::StopTooFarFromShape => "StopTooFarFromShape",
            RuleCode::RuntimeExceptionInValidator => "RuntimeExceptionInValidator",
        }
    }

    pub fn severity(self) -> FindingSeverity {
        match self {
            RuleCode::RouteShortAndLongNamesAreBlank
            | RuleCode::ValidateRouteTypeInvalidValid
            | RuleCode::NoStopTimesForTrip
            | RuleCode::StopTimeDepartureBeforeArrival
            | RuleCode::StopTimesOutOfSequence
            | RuleCode::OverlappingTripsInBlock
            | RuleCode::RuntimeExceptionInValidator => FindingSeverity::Error,
            _ => FindingSeverity::Warning,
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported rule violation.
///
/// `fields` names the affected columns, `context` carries the structured
/// payload (for example both stop ids and the measured distance of a
/// duplicate-stop pair) in `field_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub code: RuleCode,
    pub severity: FindingSeverity,
    pub entity: EntityKind,
    pub fields: Vec<String>,
    pub entity_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_order: Vec<String>,
}

impl Finding {
    /// `fields` is a comma separated list of column names.
    pub fn new(
        code: RuleCode,
        entity: EntityKind,
        fields: &str,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity: code.severity(),
            entity,
            fields: fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect(),
            entity_id: entity_id.into(),
            message: message.into(),
            context: BTreeMap::new(),
            field_order: Vec::new(),
        }
    }

    pub fn insert_context_field<V: Serialize>(&mut self, name: impl Into<String>, value: V) {
        let key = name.into();
        let serialized = serde_json::to_value(value).unwrap_or(Value::Null);
        if !self.field_order.iter().any(|item| item == &key) {
            self.field_order.push(key.clone());
        }
        self.context.insert(key, serialized);
    }

    pub fn with_context_field<V: Serialize>(mut self, name: impl Into<String>, value: V) -> Self {
        self.insert_context_field(name, value);
        self
    }

    pub fn context_str(&self, name: &str) -> Option<&str> {
        self.context.get(name).and_then(Value::as_str)
    }

    pub fn context_f64(&self, name: &str) -> Option<f64> {
        self.context.get(name).and_then(Value::as_f64)
    }
}

/// Append-only, ordered sink of findings.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            findings: Vec::new(),
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn merge(&mut self, other: Report) {
        self.findings.extend(other.findings);
    }

    pub fn with_code(&self, code: RuleCode) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |finding| finding.code == code)
    }

    pub fn count(&self, code: RuleCode) -> usize {
        self.with_code(code).count()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

impl IntoIterator for Report {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.into_iter()
    }
}
