pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod iri;
pub mod models;
pub mod tree;
pub mod version;
