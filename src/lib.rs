pub mod api;
pub mod config;
pub mod db;
pub mod registry;
pub mod retention;
pub mod sensors;
pub mod store;
