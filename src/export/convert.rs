//! Field mapping from local records to fixeau payloads.

use chrono::{NaiveDateTime, Timelike};

use crate::fixeau::models::{
    GeoPoint, MeasurementMeta, NewMeasurement, NewSeries, NewSource, PARAMETER_EC, Photo,
    SOURCE_TYPE_AKVO, SeriesMeta, UNIT_MS_CM,
};
use crate::local::{MeasuringPoint, Observation};

/// Readings above this are taken to be in µS/cm
pub const MICRO_SIEMENS_THRESHOLD: f64 = 50.0;

/// EC series exported per measuring point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Shallow,
    Deep,
    Unspecified,
}

impl Category {
    /// Export order
    pub const ALL: [Self; 3] = [Self::Shallow, Self::Deep, Self::Unspecified];

    /// Name of the local observations in this category
    #[must_use]
    pub fn observation_name(self) -> &'static str {
        match self {
            Self::Shallow => "ec_ondiep",
            Self::Deep => "ec_diep",
            Self::Unspecified => "ec",
        }
    }

    /// Remote category, `None` for unspecified
    #[must_use]
    pub fn label(self) -> Option<&'static str> {
        match self {
            Self::Shallow => Some("Shallow"),
            Self::Deep => Some("Deep"),
            Self::Unspecified => None,
        }
    }

    /// Observations of `point` in this category, in time order
    #[must_use]
    pub fn observations(self, point: &MeasuringPoint) -> Vec<&Observation> {
        let mut selected: Vec<&Observation> = point
            .observations
            .iter()
            .filter(|o| o.category.eq_ignore_ascii_case(self.observation_name()))
            .collect();
        selected.sort_by_key(|o| o.time);
        selected
    }
}

/// Convert a local EC value to mS/cm.
///
/// Values above 50 are assumed to be in µS/cm and divided by 1000, anything
/// else is already in mS/cm.
#[must_use]
pub fn to_millisiemens(value: f64) -> f64 {
    if value > MICRO_SIEMENS_THRESHOLD {
        value / 1000.0
    } else {
        value
    }
}

/// ISO 8601 timestamp, with microseconds only when the time has a fraction
#[must_use]
pub fn format_time(time: &NaiveDateTime) -> String {
    if time.nanosecond() == 0 {
        time.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

#[must_use]
pub fn location(point: &MeasuringPoint) -> GeoPoint {
    GeoPoint::new(point.latitude, point.longitude)
}

/// Series name, unique per category since the API cannot filter on category
#[must_use]
pub fn series_name(point: &MeasuringPoint, category: Category) -> String {
    match category.label() {
        Some(label) => format!("{} ({label})", point.name),
        None => point.name.clone(),
    }
}

#[must_use]
pub fn new_series(
    point: &MeasuringPoint,
    category: Category,
    folder: Option<i64>,
    photo: Option<Photo>,
) -> NewSeries {
    NewSeries {
        name: series_name(point, category),
        description: point.display_name.clone(),
        location: location(point),
        meta: SeriesMeta {
            identifier: point.identifier.clone(),
            photo,
        },
        folder,
        source: point.device.clone(),
        parameter: PARAMETER_EC.to_string(),
        category: category.label().map(str::to_string),
        unit: UNIT_MS_CM.to_string(),
    }
}

#[must_use]
pub fn new_measurement(
    point: &MeasuringPoint,
    observation: &Observation,
    series_id: i64,
    photo: Option<Photo>,
) -> NewMeasurement {
    NewMeasurement {
        time: format_time(&observation.time),
        value: to_millisiemens(observation.value),
        location: location(point),
        meta: photo.map(|photo| MeasurementMeta { photo }),
        source: point.device.clone(),
        parameter: PARAMETER_EC.to_string(),
        unit: UNIT_MS_CM.to_string(),
        series: series_id,
    }
}

#[must_use]
pub fn new_source(
    device: &str,
    usernames: Vec<String>,
    group: i64,
    folder: Option<i64>,
) -> NewSource {
    NewSource {
        id: device.to_string(),
        name: device.to_string(),
        description: format!("Akvo phone {device}"),
        source_type: SOURCE_TYPE_AKVO.to_string(),
        folder,
        group,
        users: usernames,
    }
}
