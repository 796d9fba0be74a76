//! polinpin: a tree-test study server.
//!
//! Studies and accounts live in memory. [`api::create_router`] wires the HTTP
//! surface onto [`studies::StudyService`] and [`auth::AuthService`].

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod studies;

pub use error::{Error, Result};
