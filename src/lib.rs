pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod models;
pub mod poster;
pub mod query;
pub mod storage;
pub mod view;
