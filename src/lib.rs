//! Rust client for The Movie Database (TMDB) API.
//!
//! A thin, read-mostly client: requests return raw `serde_json::Value`
//! documents, successful GET responses are cached with a TTL, and HTTP
//! failures are mapped to a typed [`Error`] taxonomy.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tmdb_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tmdb_client::Error> {
//!     let client = Client::builder()
//!         .access_token("your-read-access-token")
//!         .language("en-US")
//!         .build()?;
//!
//!     // Served from cache on repeat calls within the TTL window.
//!     let movie = client.get("movie/550", &[]).await?;
//!     println!("{} ({})", movie["title"], movie["release_date"]);
//!
//!     // Per-call overrides apply to exactly one request.
//!     let spanish = client.language("es-ES").get("movie/550", &[]).await?;
//!     println!("{}", spanish["title"]);
//!
//!     Ok(())
//! }
//! ```

mod cache;
mod client;
mod error;

pub use cache::{cache_key, CacheStore, MemoryCache};
pub use client::{Client, ClientBuilder, RequestBuilder};
pub use error::{Error, Result};
