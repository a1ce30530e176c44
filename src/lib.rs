#![allow(async_fn_in_trait)]
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod document;
pub mod error;
pub mod index;
pub mod indexer;
pub mod parser;
pub mod transform;
pub mod walker;
