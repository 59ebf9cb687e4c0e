// FBref adapter: page fetching, HTML table extraction and column mapping.

pub mod cache;
pub mod client;
pub mod extract;
pub mod html;
pub mod mapping;
pub mod urls;

pub use client::{CacheOptions, FbrefError, FbrefOptions, FbrefSource};
