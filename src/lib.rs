//! Harvests Reddit comment chains and teaches them to a small statement-store
//! chat bot.

pub mod config;
pub mod credentials;
pub mod harvest;
pub mod reddit;
pub mod store;
pub mod trainer;
