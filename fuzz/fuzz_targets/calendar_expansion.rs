#![no_main]
use arbitrary::Arbitrary;
use chrono::{Datelike, Days, NaiveDate};
use feedlint_core::{ActiveDateSet, ServiceDatePolicy};
use feedlint_model::{Calendar, CalendarDate, ExceptionType, GtfsDate, ServiceAvailability};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzData {
    calendars: Vec<CalendarData>,
    calendar_dates: Vec<CalendarDateData>,
}

#[derive(Debug, Arbitrary)]
struct CalendarData {
    service: u8,
    weekdays: u8,
    start_offset: u16,
    length: u16,
}

#[derive(Debug, Arbitrary)]
struct CalendarDateData {
    service: u8,
    offset: u16,
    added: bool,
}

fn day(offset: u16) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
    epoch
        .checked_add_days(Days::new(u64::from(offset % 4000)))
        .unwrap_or(epoch)
}

fn flag(bits: u8, bit: u8) -> ServiceAvailability {
    if bits & (1 << bit) != 0 {
        ServiceAvailability::Available
    } else {
        ServiceAvailability::Unavailable
    }
}

fuzz_target!(|data: FuzzData| {
    let calendars: Vec<Calendar> = data
        .calendars
        .iter()
        .map(|c| {
            let start = day(c.start_offset);
            let end = start
                .checked_add_days(Days::new(u64::from(c.length % 800)))
                .unwrap_or(start);
            Calendar {
                service_id: format!("S{}", c.service % 8),
                monday: flag(c.weekdays, 0),
                tuesday: flag(c.weekdays, 1),
                wednesday: flag(c.weekdays, 2),
                thursday: flag(c.weekdays, 3),
                friday: flag(c.weekdays, 4),
                saturday: flag(c.weekdays, 5),
                sunday: flag(c.weekdays, 6),
                start_date: GtfsDate::from_naive(start),
                end_date: GtfsDate::from_naive(end),
            }
        })
        .collect();
    let calendar_dates: Vec<CalendarDate> = data
        .calendar_dates
        .iter()
        .map(|d| CalendarDate {
            service_id: format!("S{}", d.service % 8),
            date: GtfsDate::from_naive(day(d.offset)),
            exception_type: if d.added {
                ExceptionType::Added
            } else {
                ExceptionType::Removed
            },
        })
        .collect();

    for policy in [ServiceDatePolicy::Legacy, ServiceDatePolicy::Complete] {
        let set = ActiveDateSet::build(&calendars, &calendar_dates, policy);
        for (service_id, dates) in set.iter() {
            for date in dates {
                let added = calendar_dates.iter().any(|d| {
                    d.service_id == service_id
                        && d.exception_type == ExceptionType::Added
                        && d.date.to_naive() == Some(*date)
                });
                let scheduled = calendars.iter().any(|c| {
                    c.service_id == service_id
                        && c.start_date.to_naive().is_some_and(|start| start <= *date)
                        && c.end_date.to_naive().is_some_and(|end| *date <= end)
                        && c.availability(date.weekday()).is_available()
                });
                assert!(added || scheduled, "{service_id} runs on unexpected {date}");
            }
        }
    }
});
