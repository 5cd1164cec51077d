pub mod config;
pub mod detection;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod persistence;
pub mod sqlite;
