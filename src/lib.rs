//! Headlines - A NewsAPI client service
//!
//! This crate searches articles from NewsAPI page by page, filters them by
//! source, and keeps bookmarked articles in a local SQLite database.

pub mod client;
pub mod config;
pub mod db;
pub mod feed;
pub mod models;
pub mod routes;
