// Library for the binary and integration tests

pub mod aggregation;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod source;
