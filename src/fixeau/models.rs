use serde::{Deserialize, Serialize};

/// Parameter code of every exported series and measurement
pub const PARAMETER_EC: &str = "EC";

/// Unit of every exported series and measurement
pub const UNIT_MS_CM: &str = "mS/cm";

/// Source type of the phones that collected the observations
pub const SOURCE_TYPE_AKVO: &str = "AkvoMobile";

/// One page of a list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Response from `/token/`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// GeoJSON point, coordinates are `[lng, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub geometry_type: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            geometry_type: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub groups: Vec<i64>,
    pub is_active: bool,
    pub details: UserDetails,
}

/// Data source; the id is the device identifier
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSource {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source_type: String,
    pub folder: Option<i64>,
    pub group: i64,
    pub users: Vec<String>,
}

/// Remote photo descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub url: String,
    /// Path relative to the media root the photo was uploaded from
    #[serde(default, skip_serializing)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMeta {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<Photo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSeries {
    pub name: String,
    pub description: String,
    pub location: GeoPoint,
    pub meta: SeriesMeta,
    pub folder: Option<i64>,
    pub source: String,
    pub parameter: String,
    pub category: Option<String>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementMeta {
    pub photo: Photo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMeasurement {
    pub time: String,
    pub value: f64,
    pub location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MeasurementMeta>,
    pub source: String,
    pub parameter: String,
    pub unit: String,
    pub series: i64,
}

/// Body sent to relocate a source or series to another folder
#[derive(Debug, Clone, Serialize)]
pub struct FolderPatch {
    pub folder: i64,
}
