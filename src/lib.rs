pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod query;
pub mod retention;
pub mod tasks;
pub mod users;
