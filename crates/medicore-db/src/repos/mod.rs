//! PostgreSQL repositories

mod account;

pub use account::AccountRepo;
