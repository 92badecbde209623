//! # fieldcam
//!
//! Offline-first synchronization engine for field photo documentation.
//!
//! User actions land in the [`database::LocalStore`] and a durable sync queue
//! right away. The [`services::SyncManager`] drains that queue against the
//! remote API whenever it is allowed to: on request, when connectivity
//! returns, and periodically. Large captures go through the
//! [`transport`] strategies; list screens combine remote and local state with
//! the [`services::merge_service`].

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod transport;

pub use error::{AppError, AppResult};
