//! Client and typed records for the fixeau.com REST API

pub mod client;
pub mod models;

pub use client::FixeauClient;
