pub mod cache_key;
pub mod config;
