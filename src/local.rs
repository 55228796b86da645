//! Typed snapshot of the local monitoring data.
//!
//! The monitoring database is owned by another application; this module only
//! reads it and turns the rows into the records the exporter walks over.

use chrono::NaiveDateTime;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::entity::{measuring_points, observations, observers, projects};
use crate::error::{AppError, AppResult};

/// Person that collected observations (`waarnemer`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observer {
    pub id: i32,
    pub initials: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Observer {
    /// First name, falling back to the initials
    #[must_use]
    pub fn given_name(&self) -> String {
        non_empty(self.first_name.as_deref())
            .or_else(|| non_empty(self.initials.as_deref()))
            .unwrap_or_default()
            .to_string()
    }

    /// Last name including the middle name (`van der Berg`)
    #[must_use]
    pub fn family_name(&self) -> String {
        match non_empty(self.middle_name.as_deref()) {
            Some(middle) => format!("{middle} {}", self.last_name),
            None => self.last_name.clone(),
        }
    }

    /// Remote username: display name lowercased with spaces removed
    #[must_use]
    pub fn username(&self) -> String {
        self.to_string().to_lowercase().replace(' ', "")
    }
}

impl fmt::Display for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let given = self.given_name();
        let parts: Vec<&str> = [
            given.as_str(),
            self.middle_name.as_deref().unwrap_or_default(),
            self.last_name.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

        f.write_str(&parts.join(" "))
    }
}

/// A single EC reading (`waarneming`)
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: i32,
    /// `ec_ondiep`, `ec_diep` or `ec`
    pub category: String,
    pub observer_id: Option<i32>,
    pub device: String,
    pub time: NaiveDateTime,
    pub value: f64,
    pub photo: Option<String>,
}

/// Location where observations are taken (`meetpunt`)
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuringPoint {
    pub id: i32,
    pub name: String,
    pub display_name: String,
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    pub device: String,
    pub photo: Option<String>,
    /// Sorted by ascending time
    pub observations: Vec<Observation>,
}

impl fmt::Display for MeasuringPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Everything the exporter needs from the local database
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Name of the project, used as the remote group name
    pub project_name: String,
    pub observers: Vec<Observer>,
    pub points: Vec<MeasuringPoint>,
}

impl Snapshot {
    /// Devices used in any observation, with the observers that used them.
    #[must_use]
    pub fn devices(&self) -> BTreeMap<String, BTreeSet<i32>> {
        let mut devices: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();
        for observation in self.points.iter().flat_map(|p| &p.observations) {
            let users = devices.entry(observation.device.clone()).or_default();
            if let Some(observer_id) = observation.observer_id {
                users.insert(observer_id);
            }
        }
        devices
    }
}

/// Load the first project, all observers and all measuring points with their
/// observations.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the database holds no project, or
/// `AppError::Database` if a query fails.
pub async fn load_snapshot(db: &DatabaseConnection) -> AppResult<Snapshot> {
    let project = projects::Entity::find()
        .order_by_asc(projects::Column::Id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("No project in the monitoring database".to_string()))?;

    let observers: Vec<Observer> = observers::Entity::find()
        .order_by_asc(observers::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|w| Observer {
            id: w.id,
            initials: w.initialen,
            first_name: w.voornaam,
            middle_name: w.tussenvoegsel,
            last_name: w.achternaam,
            email: w.email,
            phone: w.telefoon,
        })
        .collect();

    let mut observations_by_point: HashMap<i32, Vec<Observation>> = HashMap::new();
    for w in observations::Entity::find()
        .order_by_asc(observations::Column::Datum)
        .order_by_asc(observations::Column::Id)
        .all(db)
        .await?
    {
        observations_by_point
            .entry(w.locatie_id)
            .or_default()
            .push(Observation {
                id: w.id,
                category: w.naam,
                observer_id: w.waarnemer_id,
                device: w.device,
                time: w.datum,
                value: w.waarde,
                photo: w.foto_url,
            });
    }

    let points: Vec<MeasuringPoint> = measuring_points::Entity::find()
        .order_by_asc(measuring_points::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|m| MeasuringPoint {
            observations: observations_by_point.remove(&m.id).unwrap_or_default(),
            id: m.id,
            display_name: m.displayname.unwrap_or_else(|| m.name.clone()),
            identifier: m.identifier.unwrap_or_default(),
            name: m.name,
            latitude: m.latitude,
            longitude: m.longitude,
            device: m.device,
            photo: m.photo_url,
        })
        .collect();

    tracing::info!(
        project = %project.name,
        observers = observers.len(),
        points = points.len(),
        "Loaded monitoring data"
    );

    Ok(Snapshot {
        project_name: project.name,
        observers,
        points,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
