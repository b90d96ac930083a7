pub mod datasets;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod infra;
pub mod model;
pub mod output;
pub mod routes;
pub mod services;
