pub mod config;
pub mod logging;

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod locator;
pub mod manager;
pub mod reactor;
pub mod record;
pub mod registry;
pub mod service;
pub mod stats;
