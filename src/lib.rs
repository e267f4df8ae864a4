//! Remsync: reMarkable Tablet File Synchronization
//!
//! A synchronization engine that mirrors a reMarkable tablet's document
//! store, template catalog, and splashscreens into local directories over
//! SSH, and pushes local edits back.

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod session;
pub mod types;
