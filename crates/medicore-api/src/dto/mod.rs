//! Data Transfer Objects
//!
//! Request and response structures for the API. Field names are camelCase on
//! the wire; roles and departments use their PascalCase names.

pub mod account;
pub mod auth;
pub mod common;
pub mod meta;

pub use account::*;
pub use auth::*;
pub use common::*;
pub use meta::*;
