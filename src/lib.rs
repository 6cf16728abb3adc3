//! settings-migrate - Legacy settings to env-file migration
//!
//! Moves the handful of settings that still matter out of a legacy Python
//! settings module (`settings.py`) and into the files read by an
//! environment-variable based deployment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │ settings.py  │──▶│    Sanitizer     │──▶│   settings_tmp.py    │
//! └──────────────┘   │ base import ──▶  │   └──────────┬───────────┘
//!                    │ empty bindings   │              │
//!                    └──────────────────┘              ▼
//!                                          ┌──────────────────────┐
//!                                          │  Namespace loader    │
//!                                          │  (literals only, no  │
//!                                          │   code execution)    │
//!                                          └──────────┬───────────┘
//!                                                     ▼
//!                                          ┌──────────────────────┐
//!                                          │  Recognized variables│
//!                                          └───────┬──────┬───────┘
//!                                     SECRET_KEY   │      │  everything else
//!                                                  ▼      ▼
//!                              secrets/django.env (overwrite)   .env (append)
//! ```
//!
//! ## Modules
//!
//! - [`legacy`]: statement splitting, import neutralization, literal evaluation
//! - [`variables`]: the recognized variable set and extraction
//! - [`output`]: secrets file and environment file writers
//! - [`migrate`]: the end-to-end procedure
//! - [`config`]: file layout configuration
//! - [`secrets`]: in-memory handling of the secret key

pub mod config;
pub mod error;
pub mod legacy;
pub mod migrate;
pub mod output;
pub mod secrets;
pub mod variables;

pub use config::MigrateConfig;
pub use error::{Error, Result};
pub use migrate::{MigrationReport, Migrator};
