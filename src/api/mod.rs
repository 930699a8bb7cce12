use futures::future::BoxFuture;

pub use client::HttpFetcher;
pub use trentino::adapt;

use crate::error::Result;

mod client;
mod trentino;

/// Raw station object as returned by an upstream endpoint.
pub type RawStation = serde_json::Value;

pub trait Fetcher: Sync + Send {
    /// Downloads the station list published at `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<RawStation>>>;
}
