//! Read-only models of the monitoring database tables.

pub mod measuring_points;
pub mod observations;
pub mod observers;
pub mod projects;
