//! edu_crm: CRM data layer for a veterinary education business.
//!
//! Contacts, subscriptions, products, purchases and email campaigns live as
//! JSON collections in a Sled-backed store. Derived views (filters,
//! segments, analytics, report export) are pure functions over those
//! collections, and an Axum REST API exposes the lot on port 11111.

pub mod error;
pub mod timestamp;
pub mod models;
pub mod storage;
pub mod collection;
pub mod fixtures;

pub mod contacts;
pub mod products;
pub mod subscriptions;
pub mod purchases;
pub mod campaigns;
pub mod settings;

// Derived views over the collections
pub mod segments;
pub mod analytics;
pub mod reports;

pub mod crm;
pub mod config;
pub mod logging;
// REST API module: Axum HTTP handlers on port 11111
pub mod rest;

pub use crm::Crm;
pub use error::{CrmError, Result};
