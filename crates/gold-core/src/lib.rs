//! Core types for the silver-to-gold warehouse loader.
//!
//! Holds the star-schema rows, the identity unifier, the dimension and fact
//! transforms and the stage orchestrator. This crate is deliberately free of
//! database and file-format dependencies: storage backends implement
//! [`store::WarehouseStore`] and readers implement [`source::SilverSource`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod dimension;
pub mod error;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod source;
pub mod store;
pub mod transform;
pub mod unify;
pub mod wide;

pub use error::{Error, Result};
pub use loader::{LoadOptions, LoadReport, Loader};
pub use model::Table;
pub use pipeline::{Plan, Stage};
