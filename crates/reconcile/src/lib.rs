//! # Reconcile
//!
//! Declarative convergence of Foreman/Katello entities.
//!
//! A command states what an entity should look like; this crate looks
//! up what the server actually has, computes the minimal set of writes
//! that closes the gap, and performs them. Running the same desired
//! state twice changes nothing the second time, and check mode reports
//! the same changes without writing at all.
//!
//! ## Core Concepts
//!
//! - **EntitySpec**: Field rules of one entity type (kinds, aliases,
//!   defaults, wire names, references)
//! - **Resolver**: Turns natural keys like names and titles into
//!   server records
//! - **Reconciler**: Creates, updates or deletes one entity, recording
//!   diffs and honoring check mode
//! - **Engine**: Drives a full run for an [`EntityPlan`]: validate,
//!   resolve, look up, converge, report
//!
//! ## Example
//!
//! ```
//! use apikit::MockClient;
//! use reconcile::{Engine, EntityPlan, EntitySpec, Field, State};
//! use serde_json::{json, Map, Value};
//!
//! let spec = EntitySpec::builder()
//!     .field("name", Field::string().required())
//!     .field("description", Field::string())
//!     .build();
//! let plan = EntityPlan::new("organizations", spec);
//!
//! let client = MockClient::new();
//! let engine = Engine::new(&client);
//! let params: Map<String, Value> =
//!     json!({"name": "ACME", "description": "umbrella org"})
//!         .as_object()
//!         .cloned()
//!         .unwrap();
//!
//! let report = engine.run(&plan, params, State::Present)?;
//! assert!(report.changed);
//! # Ok::<(), reconcile::Error>(())
//! ```

pub mod diff;
pub mod engine;
pub mod ensure;
pub mod error;
pub mod params;
pub mod resolver;
pub mod spec;
pub mod titles;
pub mod types;

// Re-export main types at crate root
pub use engine::{Engine, EntityPlan};
pub use ensure::Reconciler;
pub use error::{Error, Result};
pub use resolver::{Detail, Resolver};
pub use spec::{DesiredState, EntityRef, EntitySpec, Field, FieldKind, FieldSpec};
pub use types::{DiffEntry, Outcome, RunReport, State};
