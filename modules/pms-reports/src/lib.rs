pub mod config;
pub mod db;
pub mod definitions;
pub mod health;
pub mod metrics;
pub mod models;
pub mod repos;
pub mod routes;
pub mod services;
pub mod store;
pub mod validation;
