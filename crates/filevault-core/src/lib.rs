//! # filevault-core
//!
//! Core crate for FileVault. Contains configuration schemas, typed
//! identifiers, pagination types, the collaborator traits consumed by
//! background task handlers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other FileVault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
