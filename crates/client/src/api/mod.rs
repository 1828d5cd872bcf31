//! Typed task service endpoints

pub mod auth;
pub mod dashboard;
pub mod projects;
pub mod tasks;
pub mod users;

pub use dashboard::Dashboard;
