//! MediCore Types - Canonical domain types for the clinic platform
//!
//! This crate holds the closed enumerations every other MediCore crate agrees
//! on, with zero dependencies on other medicore crates:
//!
//! - [`Role`]: the staff/patient role attached to every account
//! - [`Department`]: the hospital department an account belongs to
//! - [`Capability`]: named permissions granted to roles by the permission table
//!
//! Values outside these enumerations are rejected on parse, so a role or
//! department string that does not belong to the set never reaches storage.

pub mod capability;
pub mod department;
pub mod error;
pub mod role;

pub use capability::*;
pub use department::*;
pub use error::*;
pub use role::*;
