use std::ops::RangeInclusive;

use crate::{EntityKind, Finding, Report, RuleCode, ValidationConfig, ValidationContext, Validator};

/// Name, description and type checks on `routes.txt`.
#[derive(Debug, Clone)]
pub struct RouteFieldValidator {
    max_short_name_length: usize,
    route_types: RangeInclusive<i32>,
}

impl Default for RouteFieldValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl RouteFieldValidator {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            max_short_name_length: config.max_route_short_name_length,
            route_types: config.route_type_range(),
        }
    }
}

fn normalized(value: Option<&str>) -> String {
    value.map(|value| value.trim().to_lowercase()).unwrap_or_default()
}

impl Validator for RouteFieldValidator {
    fn name(&self) -> &'static str {
        "route_fields"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, report: &mut Report) {
        let routes = &ctx.feed().routes;
        for (index, route) in routes.rows.iter().enumerate() {
            let row_number = routes.row_number(index);
            let route_id = route.route_id.as_str();
            let short_name = normalized(route.route_short_name.as_deref());
            let long_name = normalized(route.route_long_name.as_deref());
            let desc = normalized(route.route_desc.as_deref());

            if short_name.is_empty() && long_name.is_empty() {
                report.push(
                    Finding::new(
                        RuleCode::RouteShortAndLongNamesAreBlank,
                        EntityKind::Route,
                        "route_short_name,route_long_name",
                        route_id,
                        "",
                    )
                    .with_context_field("csvRowNumber", row_number),
                );
            }

            let short_length = short_name.chars().count();
            if short_length > self.max_short_name_length {
                report.push(
                    Finding::new(
                        RuleCode::ValidateRouteShortNameIsTooLong,
                        EntityKind::Route,
                        "route_short_name",
                        route_id,
                        format!("route_short_name is {short_length} chars ('{short_name}')"),
                    )
                    .with_context_field("csvRowNumber", row_number)
                    .with_context_field("length", short_length),
                );
            }

            if !short_name.is_empty() && !long_name.is_empty() && long_name.contains(&short_name) {
                report.push(
                    Finding::new(
                        RuleCode::ValidateRouteLongNameContainShortName,
                        EntityKind::Route,
                        "route_short_name,route_long_name",
                        route_id,
                        format!("'{long_name}' contains '{short_name}'"),
                    )
                    .with_context_field("csvRowNumber", row_number),
                );
            }

            if !desc.is_empty() && (desc == short_name || desc == long_name) {
                report.push(
                    Finding::new(
                        RuleCode::ValidateRouteDescriptionSameAsRouteName,
                        EntityKind::Route,
                        "route_short_name,route_long_name,route_desc",
                        route_id,
                        "",
                    )
                    .with_context_field("csvRowNumber", row_number),
                );
            }

            let route_type = route.route_type.code();
            if !self.route_types.contains(&route_type) {
                report.push(
                    Finding::new(
                        RuleCode::ValidateRouteTypeInvalidValid,
                        EntityKind::Route,
                        "route_type",
                        route_id,
                        format!("route_type is {route_type}"),
                    )
                    .with_context_field("csvRowNumber", row_number)
                    .with_context_field("routeType", route_type),
                );
            }
        }
    }
}
