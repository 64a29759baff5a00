mod error;
pub use error::{Error, Result};

pub mod config;
pub mod context;
pub mod utils;

pub mod backend;
pub mod credential;
pub mod credential_cache;
pub mod token_poller;

pub mod identity;

pub mod cmd;
