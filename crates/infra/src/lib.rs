//! Infrastructure layer: configuration, Postgres, broker transport and jobs.

pub mod config;
pub mod db;
pub mod event_bus;
pub mod jobs;
