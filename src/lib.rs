//! Reuters KNN - place classification of news articles
//!
//! Articles arrive with ground-truth places and a vector of lexical features.
//! The crate splits them into master and test sets, normalizes features,
//! classifies test articles by majority vote of their nearest master
//! neighbours and scores the result.

pub mod config;
pub mod error;
pub mod models;
pub mod preprocessing;
pub mod types;

pub use config::KnnConfig;
pub use error::{ErrorKind, KnnError, Result};
pub use models::*;
pub use preprocessing::*;
pub use types::*;
