pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod recommend;
pub mod search;
pub mod stores;
pub mod trends;
