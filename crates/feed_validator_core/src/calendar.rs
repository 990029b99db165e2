use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use feedlint_model::{Calendar, CalendarDate, ExceptionType};

/// Weekday scan order used by [`ServiceDatePolicy::Legacy`].
const LEGACY_WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// How weekly calendars and exceptions turn into active dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceDatePolicy {
    /// Only the first flagged weekday (Sunday first) counts, a later calendar
    /// row for the same service replaces the earlier one, and exceptions are
    /// ignored for services without a calendar row.
    #[default]
    Legacy,
    /// Every flagged weekday counts, rows for the same service are merged,
    /// and exceptions may create a service on their own.
    Complete,
}

/// Service id to the ordered set of dates the service runs on.
#[derive(Debug, Clone, Default)]
pub struct ActiveDateSet {
    dates: FxHashMap<CompactString, BTreeSet<NaiveDate>>,
}

impl ActiveDateSet {
    pub fn build(
        calendars: &[Calendar],
        calendar_dates: &[CalendarDate],
        policy: ServiceDatePolicy,
    ) -> Self {
        let mut dates: FxHashMap<CompactString, BTreeSet<NaiveDate>> = FxHashMap::default();

        for calendar in calendars {
            let expanded = expand_calendar(calendar, policy);
            let service_id = CompactString::from(calendar.service_id.trim());
            match policy {
                ServiceDatePolicy::Legacy => {
                    dates.insert(service_id, expanded);
                }
                ServiceDatePolicy::Complete => {
                    dates.entry(service_id).or_default().extend(expanded);
                }
            }
        }

        for exception in calendar_dates {
            let Some(date) = exception.date.to_naive() else {
                continue;
            };
            let service_id = exception.service_id.trim();
            let entry = match policy {
                ServiceDatePolicy::Legacy => match dates.get_mut(service_id) {
                    Some(entry) => entry,
                    None => continue,
                },
                ServiceDatePolicy::Complete => {
                    dates.entry(CompactString::from(service_id)).or_default()
                }
            };
            match exception.exception_type {
                ExceptionType::Added => {
                    entry.insert(date);
                }
                ExceptionType::Removed => {
                    entry.remove(&date);
                }
                ExceptionType::Other => {}
            }
        }

        Self { dates }
    }

    pub fn dates_for(&self, service_id: &str) -> Option<&BTreeSet<NaiveDate>> {
        self.dates.get(service_id)
    }

    pub fn contains_service(&self, service_id: &str) -> bool {
        self.dates.contains_key(service_id)
    }

    /// True when both services run on at least one common date. Services
    /// without dates never share one.
    pub fn share_any_date(&self, left: &str, right: &str) -> bool {
        let (Some(left), Some(right)) = (self.dates.get(left), self.dates.get(right)) else {
            return false;
        };
        let (smaller, larger) = if left.len() <= right.len() {
            (left, right)
        } else {
            (right, left)
        };
        smaller.iter().any(|date| larger.contains(date))
    }

    pub fn service_count(&self) -> usize {
        self.dates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<NaiveDate>)> {
        self.dates
            .iter()
            .map(|(service_id, dates)| (service_id.as_str(), dates))
    }
}

fn expand_calendar(calendar: &Calendar, policy: ServiceDatePolicy) -> BTreeSet<NaiveDate> {
    let mut expanded = BTreeSet::new();
    let active_weekdays = active_weekdays(calendar, policy);
    if active_weekdays.is_empty() {
        return expanded;
    }
    let (Some(mut current), Some(end)) = (
        calendar.start_date.to_naive(),
        calendar.end_date.to_naive(),
    ) else {
        return expanded;
    };

    while current <= end {
        if active_weekdays.contains(&current.weekday()) {
            expanded.insert(current);
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    expanded
}

fn active_weekdays(calendar: &Calendar, policy: ServiceDatePolicy) -> Vec<Weekday> {
    let flagged = LEGACY_WEEKDAY_ORDER
        .into_iter()
        .filter(|weekday| calendar.availability(*weekday).is_available());
    match policy {
        ServiceDatePolicy::Legacy => flagged.take(1).collect(),
        ServiceDatePolicy::Complete => flagged.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlint_model::{GtfsDate, ServiceAvailability};

    fn calendar(service_id: &str, start: &str, end: &str, days: [bool; 7]) -> Calendar {
        let flag = |on: bool| {
            if on {
                ServiceAvailability::Available
            } else {
                ServiceAvailability::Unavailable
            }
        };
        Calendar {
            service_id: service_id.into(),
            monday: flag(days[0]),
            tuesday: flag(days[1]),
            wednesday: flag(days[2]),
            thursday: flag(days[3]),
            friday: flag(days[4]),
            saturday: flag(days[5]),
            sunday: flag(days[6]),
            start_date: GtfsDate::parse(start).unwrap(),
            end_date: GtfsDate::parse(end).unwrap(),
        }
    }

    fn exception(service_id: &str, date: &str, exception_type: ExceptionType) -> CalendarDate {
        CalendarDate {
            service_id: service_id.into(),
            date: GtfsDate::parse(date).unwrap(),
            exception_type,
        }
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    const WEEKDAYS: [bool; 7] = [true, true, true, true, true, false, false];

    #[test]
    fn legacy_policy_keeps_only_first_flagged_weekday() {
        // 2024-01-01 is a Monday.
        let set = ActiveDateSet::build(
            &[calendar("S1", "20240101", "20240114", WEEKDAYS)],
            &[],
            ServiceDatePolicy::Legacy,
        );
        let dates: Vec<_> = set.dates_for("S1").unwrap().iter().copied().collect();
        assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 8)]);
    }

    #[test]
    fn legacy_policy_prefers_sunday() {
        let mut days = WEEKDAYS;
        days[6] = true;
        let set = ActiveDateSet::build(
            &[calendar("S1", "20240101", "20240114", days)],
            &[],
            ServiceDatePolicy::Legacy,
        );
        assert!(set
            .dates_for("S1")
            .unwrap()
            .iter()
            .all(|date| date.weekday() == Weekday::Sun));
    }

    #[test]
    fn complete_policy_keeps_every_flagged_weekday() {
        let set = ActiveDateSet::build(
            &[calendar("S1", "20240101", "20240107", WEEKDAYS)],
            &[],
            ServiceDatePolicy::Complete,
        );
        assert_eq!(set.dates_for("S1").unwrap().len(), 5);
    }

    #[test]
    fn expanded_dates_stay_in_range_and_match_weekday() {
        let set = ActiveDateSet::build(
            &[calendar("S1", "20240105", "20240320", WEEKDAYS)],
            &[],
            ServiceDatePolicy::Complete,
        );
        for date in set.dates_for("S1").unwrap() {
            assert!(*date >= ymd(2024, 1, 5) && *date <= ymd(2024, 3, 20));
            assert!(!matches!(date.weekday(), Weekday::Sat | Weekday::Sun));
        }
    }

    #[test]
    fn applies_exceptions_in_order() {
        let set = ActiveDateSet::build(
            &[calendar("S1", "20240101", "20240114", WEEKDAYS)],
            &[
                exception("S1", "20240106", ExceptionType::Added),
                exception("S1", "20240108", ExceptionType::Removed),
                exception("S1", "20240110", ExceptionType::Added),
                exception("S1", "20240110", ExceptionType::Removed),
            ],
            ServiceDatePolicy::Legacy,
        );
        let dates: Vec<_> = set.dates_for("S1").unwrap().iter().copied().collect();
        assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 6)]);
    }

    #[test]
    fn removing_absent_date_is_a_no_op() {
        let calendars = [calendar("S1", "20240101", "20240114", WEEKDAYS)];
        let before = ActiveDateSet::build(&calendars, &[], ServiceDatePolicy::Legacy);
        let after = ActiveDateSet::build(
            &calendars,
            &[exception("S1", "20240102", ExceptionType::Removed)],
            ServiceDatePolicy::Legacy,
        );
        assert_eq!(before.dates_for("S1"), after.dates_for("S1"));
    }

    #[test]
    fn legacy_policy_ignores_exceptions_without_calendar() {
        let dates = [exception("S2", "20240101", ExceptionType::Added)];
        let legacy = ActiveDateSet::build(&[], &dates, ServiceDatePolicy::Legacy);
        assert!(!legacy.contains_service("S2"));

        let complete = ActiveDateSet::build(&[], &dates, ServiceDatePolicy::Complete);
        assert_eq!(complete.dates_for("S2").unwrap().len(), 1);
    }

    #[test]
    fn shares_dates_only_when_sets_intersect() {
        let set = ActiveDateSet::build(
            &[
                calendar("MON", "20240101", "20240131", WEEKDAYS),
                calendar("MON2", "20240108", "20240108", WEEKDAYS),
                calendar("LATER", "20240201", "20240229", WEEKDAYS),
            ],
            &[],
            ServiceDatePolicy::Complete,
        );
        assert!(set.share_any_date("MON", "MON2"));
        assert!(!set.share_any_date("MON", "LATER"));
        assert!(!set.share_any_date("MON", "UNKNOWN"));
    }
}
