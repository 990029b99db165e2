use feedlint_model::{Agency, Calendar, CalendarDate, Route, ShapePoint, Stop, StopTime, Trip};
use tracing::debug;

use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::{CsvTable, GtfsInput, GtfsInputError};

pub const AGENCY_FILE: &str = "agency.txt";
pub const STOPS_FILE: &str = "stops.txt";
pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const CALENDAR_FILE: &str = "calendar.txt";
pub const CALENDAR_DATES_FILE: &str = "calendar_dates.txt";
pub const SHAPES_FILE: &str = "shapes.txt";

pub const FEED_FILE_NAMES: &[&str] = &[
    AGENCY_FILE,
    STOPS_FILE,
    ROUTES_FILE,
    TRIPS_FILE,
    STOP_TIMES_FILE,
    CALENDAR_FILE,
    CALENDAR_DATES_FILE,
    SHAPES_FILE,
];

/// Immutable snapshot of the tables the validators read.
#[derive(Debug, Clone, Default)]
pub struct GtfsFeed {
    pub agency: CsvTable<Agency>,
    pub stops: CsvTable<Stop>,
    pub routes: CsvTable<Route>,
    pub trips: CsvTable<Trip>,
    pub stop_times: CsvTable<StopTime>,
    pub calendar: Option<CsvTable<Calendar>>,
    pub calendar_dates: Option<CsvTable<CalendarDate>>,
    pub shapes: Option<CsvTable<ShapePoint>>,
}

impl GtfsFeed {
    pub fn from_input(input: &GtfsInput) -> Result<Self, GtfsInputError> {
        Self::from_input_with_progress(input, &NoOpProgressHandler)
    }

    pub fn from_input_with_progress(
        input: &GtfsInput,
        progress: &dyn ProgressHandler,
    ) -> Result<Self, GtfsInputError> {
        progress.set_total_files(FEED_FILE_NAMES.len());

        let agency = load(progress, AGENCY_FILE, || input.read_required_csv(AGENCY_FILE))?;
        let stops = load(progress, STOPS_FILE, || input.read_required_csv(STOPS_FILE))?;
        let routes = load(progress, ROUTES_FILE, || input.read_required_csv(ROUTES_FILE))?;
        let trips = load(progress, TRIPS_FILE, || input.read_required_csv(TRIPS_FILE))?;
        let stop_times = load(progress, STOP_TIMES_FILE, || {
            input.read_required_csv(STOP_TIMES_FILE)
        })?;
        let calendar = load(progress, CALENDAR_FILE, || input.read_optional_csv(CALENDAR_FILE))?;
        let calendar_dates = load(progress, CALENDAR_DATES_FILE, || {
            input.read_optional_csv(CALENDAR_DATES_FILE)
        })?;
        let shapes = load(progress, SHAPES_FILE, || input.read_optional_csv(SHAPES_FILE))?;

        let feed = Self {
            agency,
            stops,
            routes,
            trips,
            stop_times,
            calendar,
            calendar_dates,
            shapes,
        };
        debug!(
            stops = feed.stops.len(),
            trips = feed.trips.len(),
            stop_times = feed.stop_times.len(),
            "loaded feed from {}",
            input.path().display()
        );
        Ok(feed)
    }

    pub fn all_agencies(&self) -> &[Agency] {
        &self.agency.rows
    }

    pub fn all_routes(&self) -> &[Route] {
        &self.routes.rows
    }

    pub fn all_stops(&self) -> &[Stop] {
        &self.stops.rows
    }

    pub fn all_trips(&self) -> &[Trip] {
        &self.trips.rows
    }

    pub fn all_stop_times(&self) -> &[StopTime] {
        &self.stop_times.rows
    }

    pub fn all_shape_points(&self) -> &[ShapePoint] {
        self.shapes
            .as_ref()
            .map(|table| table.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn all_calendars(&self) -> &[Calendar] {
        self.calendar
            .as_ref()
            .map(|table| table.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn all_calendar_dates(&self) -> &[CalendarDate] {
        self.calendar_dates
            .as_ref()
            .map(|table| table.rows.as_slice())
            .unwrap_or_default()
    }

    /// Id of the first agency, used to qualify stop identities. Empty when
    /// the feed has no agency or the column is blank.
    pub fn default_agency_id(&self) -> &str {
        self.agency
            .rows
            .first()
            .and_then(|agency| agency.agency_id.as_deref())
            .map(str::trim)
            .unwrap_or("")
    }
}

fn load<T>(
    progress: &dyn ProgressHandler,
    file_name: &str,
    read: impl FnOnce() -> Result<T, GtfsInputError>,
) -> Result<T, GtfsInputError> {
    progress.on_start_file_load(file_name);
    let result = read();
    progress.on_finish_file_load(file_name, result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), nanos))
    }

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write file");
    }

    fn write_required_files(dir: &std::path::Path) {
        write_file(
            dir,
            AGENCY_FILE,
            "agency_id,agency_name,agency_url,agency_timezone\nA1,Test Agency,https://example.com,UTC\n",
        );
        write_file(dir, STOPS_FILE, "stop_id,stop_lat,stop_lon\nSTOP1,45.0,-122.0\n");
        write_file(dir, ROUTES_FILE, "route_id,route_short_name,route_type\nR1,10,3\n");
        write_file(dir, TRIPS_FILE, "route_id,service_id,trip_id\nR1,SVC1,T1\n");
        write_file(
            dir,
            STOP_TIMES_FILE,
            "trip_id,stop_id,stop_sequence,arrival_time,departure_time\nT1,STOP1,1,08:00:00,08:00:00\n",
        );
    }

    #[test]
    fn loads_required_tables_from_directory() {
        let dir = temp_dir("feedlint_feed");
        fs::create_dir_all(&dir).expect("create dir");
        write_required_files(&dir);

        let input = GtfsInput::from_path(&dir).expect("input");
        let feed = GtfsFeed::from_input(&input).expect("load feed");
        assert_eq!(feed.all_agencies().len(), 1);
        assert_eq!(feed.all_stops().len(), 1);
        assert_eq!(feed.all_routes().len(), 1);
        assert_eq!(feed.all_trips().len(), 1);
        assert_eq!(feed.all_stop_times().len(), 1);
        assert!(feed.calendar.is_none());
        assert!(feed.all_shape_points().is_empty());
        assert_eq!(feed.default_agency_id(), "A1");
        assert_eq!(feed.all_stops()[0].coordinates(), Some((45.0, -122.0)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = temp_dir("feedlint_missing");
        fs::create_dir_all(&dir).expect("create dir");
        write_required_files(&dir);
        fs::remove_file(dir.join(TRIPS_FILE)).expect("remove trips");

        let input = GtfsInput::from_path(&dir).expect("input");
        let err = GtfsFeed::from_input(&input).unwrap_err();
        assert!(matches!(err, GtfsInputError::MissingFile(ref name) if name == TRIPS_FILE));

        fs::remove_dir_all(&dir).ok();
    }

    #[derive(Default)]
    struct LoadLog(Mutex<Vec<(String, bool)>>);

    impl ProgressHandler for LoadLog {
        fn on_finish_file_load(&self, file: &str, loaded: bool) {
            self.0.lock().expect("lock").push((file.to_string(), loaded));
        }
    }

    #[test]
    fn progress_sees_the_failing_file_last() {
        let dir = temp_dir("feedlint_progress");
        fs::create_dir_all(&dir).expect("create dir");
        write_required_files(&dir);
        write_file(&dir, STOPS_FILE, "stop_id,stop_lat,stop_lon
STOP1,north,-122.0
");

        let input = GtfsInput::from_path(&dir).expect("input");
        let log = LoadLog::default();
        assert!(GtfsFeed::from_input_with_progress(&input, &log).is_err());
        let events = log.0.lock().expect("lock").clone();
        assert_eq!(
            events,
            vec![(AGENCY_FILE.to_string(), true), (STOPS_FILE.to_string(), false)]
        );

        fs::remove_dir_all(&dir).ok();
    }
}
