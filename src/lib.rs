//! cloudinary-fs: a filesystem adapter over the Cloudinary media asset APIs
//!
//! This library lets path-based filesystem code read, write, copy, move,
//! delete, list and stat assets stored in a Cloudinary account.
//!
//! # Architecture
//!
//! - **Asset API**: the `AssetApi` trait models the remote service. The HTTP
//!   client talks to Cloudinary; the in-memory implementation backs tests.
//! - **Normalizer**: maps raw asset records onto uniform `FileAttributes`.
//! - **Lister**: pages through assets under a prefix and yields normalized
//!   records lazily as a stream.
//! - **Adapter**: the `FilesystemAdapter` trait and its Cloudinary
//!   implementation, translating each operation into API calls.
//!
//! # Example
//!
//! ```no_run
//! use cloudinary_fs::adapter::{CloudinaryAdapter, FilesystemAdapter};
//! use cloudinary_fs::config::Config;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file(&"config.yaml".into())?;
//! let adapter = CloudinaryAdapter::from_config(config.cloud)?;
//!
//! let mut listing = adapter.list_contents("photos/", false);
//! while let Some(attrs) = listing.next().await {
//!     let attrs = attrs?;
//!     println!("{} {} {}", attrs.path, attrs.size, attrs.mime_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod api;
pub mod config;
pub mod env;
pub mod error;
pub mod listing;
pub mod metadata;

pub use adapter::{CloudinaryAdapter, FilesystemAdapter, WriteOptions};
pub use error::{AdapterError, Result};
pub use metadata::{FileAttributes, Visibility};
