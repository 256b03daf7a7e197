//! Car raffle registration server.
//!
//! Serves the registration form, gates sign-ups by the caller's city,
//! stores participants in a JSON file and gives an administrator a
//! password-protected list with delete and spreadsheet export.

pub mod admin;
pub mod allow_list;
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod registration;

pub use admin::AdminAuth;
pub use allow_list::AllowList;
pub use config::Config;
pub use error::AppError;
pub use registration::{Registrar, RegistrationForm};
