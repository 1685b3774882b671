pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod init;
pub mod metadata;
pub mod models;
pub mod repository;
pub mod tools;
pub mod utils;

pub use error::CatalogError;
