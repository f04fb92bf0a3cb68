//! # apikit
//!
//! Blocking JSON REST client for Foreman/Katello servers.
//!
//! This crate provides:
//! - One authenticated [`Session`] per invocation (basic auth, optional
//!   TLS verification bypass, global timeout)
//! - The [`Client`] trait with generic `list`/`show`/`create`/`update`/
//!   `delete`/`action` operations keyed by resource type and id
//! - [`SearchQuery`], the server's `field="value"` search DSL
//! - Task polling for slow server-side actions ([`tasks::wait_for_task`])
//!
//! ## Example
//!
//! ```no_run
//! use apikit::{Client, Scope, Session, SessionConfig};
//! use std::time::Duration;
//!
//! let session = Session::new(&SessionConfig {
//!     base_url: "https://foreman.example.com".to_string(),
//!     username: "admin".to_string(),
//!     password: "changeme".to_string(),
//!     verify_ssl: true,
//!     timeout: Duration::from_secs(300),
//! })?;
//!
//! let domains = session.list("domains", Some(r#"name="example.com""#), &Scope::new())?;
//! println!("found {} domains", domains.len());
//! # Ok::<(), apikit::Error>(())
//! ```
//!
//! ## Testing
//!
//! [`MockClient`] is an in-memory server implementing [`Client`]; crates
//! building on this one use it to test reconciliation logic without
//! network access.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod inflect;
pub mod search;
pub mod session;
pub mod tasks;

mod routes;

pub use client::{Call, Client, Method, MockClient, Scope, Verb};
pub use error::{Error, Result};
pub use search::SearchQuery;
pub use session::{DEFAULT_TIMEOUT, ServerStatus, Session, SessionConfig};
pub use tasks::TaskOptions;
