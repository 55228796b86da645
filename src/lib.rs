//! fixeau-export - Export EC measurements from NZG Meet to fixeau.com
//!
//! This library exposes the core modules for testing and reuse.

pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod fixeau;
pub mod local;
