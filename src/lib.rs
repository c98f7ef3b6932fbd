//! Library exports for rigauth, shared between the binary and tests.

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;
