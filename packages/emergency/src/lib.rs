#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Emergency response support.
//!
//! [`radius`] bounds how far a missing subject could plausibly have gone;
//! [`lifecycle`] manages the emergency record and its timeline from
//! activation to resolution.

pub mod lifecycle;
pub mod radius;

pub use lifecycle::{activate, resolve, update_search_radius};
pub use radius::{estimate_search_radius, estimate_search_radius_named};

use safe_wander_emergency_models::EmergencyStatus;
use uuid::Uuid;

/// Errors from emergency record changes.
#[derive(Debug, thiserror::Error)]
pub enum EmergencyError {
    /// The record is resolved or a false alarm and accepts no changes.
    #[error("Emergency {id} is already {status}")]
    AlreadyClosed {
        /// Record ID.
        id: Uuid,
        /// Terminal status the record is in.
        status: EmergencyStatus,
    },

    /// `active` is not a resolution.
    #[error("Emergency {id} cannot be resolved as {status}")]
    InvalidResolution {
        /// Record ID.
        id: Uuid,
        /// The rejected status.
        status: EmergencyStatus,
    },

    /// Radius must be a finite positive number of meters.
    #[error("Invalid search radius: {0}")]
    InvalidRadius(f64),
}
