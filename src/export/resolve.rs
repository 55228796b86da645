//! Find-or-create of remote entities by natural key.
//!
//! Every resolver first queries the API for an existing entity and only
//! creates one when the lookup comes back empty, so repeated runs reuse
//! what earlier runs created.

use rand::Rng;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::export::convert::{self, Category};
use crate::fixeau::FixeauClient;
use crate::fixeau::models::{
    Group, NewGroup, NewUser, PARAMETER_EC, Photo, Series, Source, User, UserDetails,
};
use crate::local::{MeasuringPoint, Observer};

/// Validation message returned for a taken username
pub const USERNAME_EXISTS: &str = "A user with that username already exists.";

/// Highest numeric suffix tried after a username collision
pub const MAX_USERNAME_SUFFIX: u32 = 9;

pub const PASSWORD_LENGTH: usize = 8;

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%&*+=-?.:";

/// Entity returned by a resolver and whether this call created it
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub entity: T,
    pub created: bool,
}

impl<T> Resolved<T> {
    fn found(entity: T) -> Self {
        Self {
            entity,
            created: false,
        }
    }

    fn created(entity: T) -> Self {
        Self {
            entity,
            created: true,
        }
    }
}

/// Resolved user; `password` is set only for newly created accounts
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: User,
    pub password: Option<String>,
}

/// Random password of `length` characters
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())]))
        .collect()
}

/// Find a group by name or create it.
///
/// # Errors
///
/// Returns `AppError::FixeauApi` if the lookup or creation fails.
pub async fn group(client: &FixeauClient, name: &str) -> AppResult<Resolved<Group>> {
    if let Some(group) = client.find_first("/group/", &[("name", name)]).await? {
        return Ok(Resolved::found(group));
    }

    tracing::info!(name, "Creating group");
    let group = client
        .create(
            "/group/",
            &NewGroup {
                name: name.to_string(),
            },
        )
        .await?;
    Ok(Resolved::created(group))
}

/// Find the user for `observer` or create an inactive account in `group`.
///
/// When the username is taken, suffixes 1 to 9 are tried in turn.
///
/// # Errors
///
/// Returns the API error of the last attempt once all suffixes are taken,
/// or any other API error straight away.
pub async fn user(
    client: &FixeauClient,
    observer: &Observer,
    group: i64,
) -> AppResult<ResolvedUser> {
    let basename = observer.username();

    if let Some(user) = client
        .find_first::<User>("/user/", &[("username", basename.as_str())])
        .await?
    {
        return Ok(ResolvedUser {
            user,
            password: None,
        });
    }

    let password = generate_password(PASSWORD_LENGTH);
    let mut username = basename.clone();
    let mut suffix = 0;

    loop {
        let payload = NewUser {
            username: username.clone(),
            password: password.clone(),
            first_name: observer.given_name(),
            last_name: observer.family_name(),
            email: observer.email.clone().filter(|e| !e.trim().is_empty()),
            groups: vec![group],
            is_active: false,
            details: UserDetails {
                phone_number: observer.phone.clone(),
            },
        };

        match client.create::<_, User>("/user/", &payload).await {
            Ok(user) => {
                return Ok(ResolvedUser {
                    user,
                    password: Some(password),
                });
            }
            Err(e) if is_username_conflict(&e) && suffix < MAX_USERNAME_SUFFIX => {
                suffix += 1;
                tracing::debug!(taken = %username, suffix, "Username exists, retrying");
                username = format!("{basename}{suffix}");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether `error` is the API rejecting a duplicate username
#[must_use]
pub fn is_username_conflict(error: &AppError) -> bool {
    let Some(body) = error.body_json() else {
        return false;
    };

    match body.get("username") {
        Some(Value::Array(problems)) => problems
            .iter()
            .any(|p| p.as_str() == Some(USERNAME_EXISTS)),
        Some(Value::String(problem)) => problem == USERNAME_EXISTS,
        _ => false,
    }
}

/// Find the data source of `device` by primary key or create it.
///
/// # Errors
///
/// Returns `AppError::FixeauApi` if the lookup or creation fails.
pub async fn source(
    client: &FixeauClient,
    device: &str,
    usernames: Vec<String>,
    group: i64,
    folder: Option<i64>,
) -> AppResult<Resolved<Source>> {
    if let Some(source) = client.get_object("/source/", device).await? {
        return Ok(Resolved::found(source));
    }

    let source = client
        .create("/source/", &convert::new_source(device, usernames, group, folder))
        .await?;
    Ok(Resolved::created(source))
}

/// Find the EC series of `point` in `category`.
///
/// # Errors
///
/// Returns `AppError::FixeauApi` if the lookup fails.
pub async fn find_series(
    client: &FixeauClient,
    point: &MeasuringPoint,
    category: Category,
) -> AppResult<Option<Series>> {
    let name = convert::series_name(point, category);
    let mut query = vec![
        ("name", name.as_str()),
        ("source", point.device.as_str()),
        ("parameter", PARAMETER_EC),
    ];
    if let Some(label) = category.label() {
        query.push(("category", label));
    }

    client.find_first("/series/", &query).await
}

/// Find the EC series of `point` in `category` or create it.
///
/// # Errors
///
/// Returns `AppError::FixeauApi` if the lookup or creation fails.
pub async fn series(
    client: &FixeauClient,
    point: &MeasuringPoint,
    category: Category,
    folder: Option<i64>,
    photo: Option<Photo>,
) -> AppResult<Resolved<Series>> {
    if let Some(series) = find_series(client, point, category).await? {
        return Ok(Resolved::found(series));
    }

    let series = client
        .create(
            "/series/",
            &convert::new_series(point, category, folder, photo),
        )
        .await?;
    Ok(Resolved::created(series))
}
