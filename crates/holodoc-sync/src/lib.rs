//! # holodoc-sync
//!
//! Server side of a HoloDoc session.
//!
//! This crate provides:
//! - [`ServerConfig`] loaded from TOML or `HOLODOC_*` environment variables
//! - [`HttpDocumentService`], the reqwest client for the matching server
//! - [`Dispatcher`] for fire-and-continue remote calls
//! - [`Session`], which ties the registry and link graph to the server
//! - [`mock::MockDocumentService`] for deterministic tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use holodoc_core::CameraFrame;
//! use holodoc_sync::{HttpDocumentService, ServerConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> holodoc_core::Result<()> {
//!     let service = HttpDocumentService::new(ServerConfig::load()?)?;
//!     let mut session = Session::new(Arc::new(service));
//!     let entity = session.capture(CameraFrame::solid(64, 48, [255, 255, 255, 255])?);
//!     session.settle().await;
//!     println!("{}", session.record(entity).unwrap());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod http;
pub mod session;

// Scripted service used by this crate's tests and by downstream tests
pub mod mock;

pub use config::{ConfigError, ServerConfig};
pub use dispatch::Dispatcher;
pub use http::HttpDocumentService;
pub use session::{Completion, EditDispatch, Session};
