//! # envsync Core
//!
//! Environment-agnostic logic for envsync: the entity model and its
//! one-hop reference model, the [`Store`](store::Store) abstraction, the
//! dependency resolver, the sync orchestrator, and the game lookup.
//!
//! This crate performs no filesystem or database I/O of its own. The
//! application crate supplies a concrete store (SQLite) and the tool
//! invocation surface; tests use [`store::memory::InMemoryStore`].
//!
//! ## Data Flow
//!
//! ```text
//!  root id + source env
//!          │
//!          ▼
//!   ┌──────────────┐   Closure   ┌──────────────┐
//!   │   resolver   │────────────▶│ orchestrator │──▶ SyncReport
//!   └──────┬───────┘             └──────┬───────┘
//!          │ find_one                   │ find_one / upsert
//!          ▼                            ▼
//!   ┌─────────────────────────────────────────┐
//!   │                  Store                  │
//!   └─────────────────────────────────────────┘
//! ```

pub mod cancel;
pub mod closure;
pub mod error;
pub mod locks;
pub mod lookup;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod store;

pub use cancel::CancelFlag;
pub use closure::Closure;
pub use error::{StoreError, SyncError};
pub use locks::KeyLocks;
pub use models::{Document, EntityKind, Reference, SyncMetadata};
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use report::{SyncMode, SyncReport};
