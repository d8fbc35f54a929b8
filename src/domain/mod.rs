//! Domain layer: the normalized issue model, errors and ports.

pub mod errors;
pub mod models;
pub mod ports;
