//! Planar geometry used by the spatial validators.
//!
//! Validators never project coordinates themselves: they receive a
//! [`GeometryAdapter`] and work on the [`PlanarPoint`]s it returns, so a test
//! can swap in a trivial projection and a caller can pick the zone.

use serde::Serialize;

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_SCALE_FACTOR: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_MIN_LAT: f64 = -80.0;
const UTM_MAX_LAT: f64 = 84.0;
/// Beyond this offset from the central meridian the series expansion drifts
/// by more than a few percent.
const MAX_CENTRAL_MERIDIAN_OFFSET: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn euclidean_distance(self, other: PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box in planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn of_point(point: PlanarPoint) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    pub fn around(point: PlanarPoint, radius: f64) -> Self {
        let radius = radius.abs();
        Self {
            min_x: point.x - radius,
            min_y: point.y - radius,
            max_x: point.x + radius,
            max_y: point.y + radius,
        }
    }

    pub fn contains(&self, point: PlanarPoint) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("coordinate ({lat}, {lon}) cannot be projected to planar coordinates")]
    CoordinateOutOfRange { lat: f64, lon: f64 },
}

/// Projection and distance primitives consumed by the validators.
pub trait GeometryAdapter: Send + Sync {
    fn project_to_planar(&self, lat: f64, lon: f64) -> Result<PlanarPoint, GeometryError>;

    fn distance(&self, a: PlanarPoint, b: PlanarPoint) -> f64 {
        a.euclidean_distance(b)
    }

    fn buffer(&self, point: PlanarPoint, radius: f64) -> Envelope {
        Envelope::around(point, radius)
    }

    /// Distance from `point` to the polyline through `line`.
    fn distance_to_line(&self, point: PlanarPoint, line: &[PlanarPoint]) -> f64 {
        match line {
            [] => f64::INFINITY,
            [single] => self.distance(point, *single),
            _ => line
                .windows(2)
                .map(|segment| distance_to_segment(point, segment[0], segment[1]))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

fn distance_to_segment(point: PlanarPoint, start: PlanarPoint, end: PlanarPoint) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.euclidean_distance(start);
    }
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.euclidean_distance(PlanarPoint::new(start.x + t * dx, start.y + t * dy))
}

/// Universal Transverse Mercator on the WGS84 ellipsoid.
///
/// All points of a run share one zone so distances stay comparable across a
/// feed. Northing is not offset in the southern hemisphere, which keeps feeds
/// that straddle the equator continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmProjection {
    zone: u8,
    central_meridian: f64,
}

impl UtmProjection {
    /// `zone` is clamped to 1..=60.
    pub fn new(zone: u8) -> Self {
        let zone = zone.clamp(1, 60);
        Self {
            zone,
            central_meridian: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
        }
    }

    pub fn for_longitude(lon: f64) -> Self {
        if !lon.is_finite() {
            return Self::new(31);
        }
        let zone = (((lon.clamp(-180.0, 180.0) + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60);
        Self::new(zone as u8)
    }

    /// Zone of the mean longitude of `coordinates` (`(lat, lon)` pairs).
    pub fn fitted_to<I>(coordinates: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (sum, count) = coordinates
            .into_iter()
            .filter(|(lat, lon)| lat.is_finite() && lon.is_finite())
            .fold((0.0, 0usize), |(sum, count), (_, lon)| (sum + lon, count + 1));
        if count == 0 {
            return Self::new(31);
        }
        Self::for_longitude(sum / count as f64)
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }
}

impl Default for UtmProjection {
    fn default() -> Self {
        Self::new(31)
    }
}

impl GeometryAdapter for UtmProjection {
    fn project_to_planar(&self, lat: f64, lon: f64) -> Result<PlanarPoint, GeometryError> {
        let out_of_range = GeometryError::CoordinateOutOfRange { lat, lon };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(out_of_range);
        }
        if !(UTM_MIN_LAT..=UTM_MAX_LAT).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(out_of_range);
        }
        let delta_lon = lon - self.central_meridian;
        if delta_lon.abs() > MAX_CENTRAL_MERIDIAN_OFFSET {
            return Err(out_of_range);
        }

        let e2 = WGS84_F * (2.0 - WGS84_F);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * delta_lon.to_radians();

        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let easting = UTM_SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + UTM_FALSE_EASTING;
        let northing = UTM_SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

        Ok(PlanarPoint::new(easting, northing))
    }
}
