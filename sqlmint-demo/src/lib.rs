pub mod app;
pub mod db;
pub mod models;
pub mod schema;
