// Library exports for Agora
// Integration tests and the API client build on these modules

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
