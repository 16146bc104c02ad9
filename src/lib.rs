//! # envsync
//!
//! Dependency-aware copying of sports data between environments.
//!
//! Given a game in a source environment (e.g. `Production`), envsync
//! copies the game together with the teams, competition, season, and
//! league it references into a target environment (e.g. `Local`),
//! stamping each copied record with provenance. A preview reports what a
//! copy would write without writing anything.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐     ┌──────────────┐
//!  │   CLI    │     │ HTTP + MCP   │
//!  │(envsync) │     │ tool server  │
//!  └────┬─────┘     └──────┬───────┘
//!       │   ToolRegistry   │
//!       └────────┬─────────┘
//!                ▼
//!      envsync-core (resolver, orchestrator, lookup)
//!                │ Store
//!                ▼
//!        SQLite (one table, partitioned by environment)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! envsync init
//! envsync import Production fixtures/production.json
//! envsync find-games "arsenal"
//! envsync preview g1
//! envsync commit g1 --target Local
//! envsync serve mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`Store`](envsync_core::store::Store) backend |
//! | [`traits`] | Tool trait, context, and built-in tools |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP protocol bridge |
//! | [`fixtures`] | `import`, `envs`, `clear` commands |
//! | [`get`] | `get` command |
//! | [`games`] | `find-games` command |
//! | [`sync_cmd`] | `preview` and `commit` commands |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod fixtures;
pub mod games;
pub mod get;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod sync_cmd;
pub mod traits;
