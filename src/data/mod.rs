//! Data fetching and storage
//!
//! Handles:
//! - Yahoo Finance chart API for daily closes and the VIX (free)
//! - Local CSV inputs and outputs
//! - Local caching of fetched series

pub mod cache;
pub mod csv_store;
pub mod yahoo;

pub use cache::*;
pub use csv_store::*;
pub use yahoo::*;
