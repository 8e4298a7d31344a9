//! Data ingestion module - fetch, parse and reshape source data into vectors

pub mod classify;
pub mod derive;
pub mod extract;
pub mod fetch;
pub mod html;
pub mod table;
pub mod types;
pub mod urls;
pub mod utils;
pub mod workbook;

pub use types::*;
