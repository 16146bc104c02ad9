//! Tool trait, invocation context, and the built-in sync tools.
//!
//! Every operation an agent can call goes through a [`Tool`] registered in
//! a [`ToolRegistry`]. The HTTP server (`POST /tools/{name}`) and the MCP
//! bridge (`tools/call`) dispatch through the same registry, so both
//! surfaces see identical tools, schemas, and results.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  preview_sync  sync_game  find_games     │
//! │  list_environments      + custom tools   │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!   ToolContext ──▶ SyncOrchestrator / lookup ──▶ Store
//! ```
//!
//! Each built-in tool returns a JSON object holding the structured result
//! plus a `text` field with a human-readable rendering.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use envsync_core::lookup::{find_games_by_team, GameQuery};
use envsync_core::models::{EntityKind, Game};
use envsync_core::store::Store;
use envsync_core::{KeyLocks, SyncOrchestrator, SyncReport};

use crate::config::Config;
use crate::games::render_games;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) are read for
///    `GET /tools/list` and MCP `tools/list`.
/// 3. [`execute`](Tool::execute) runs with parameters already checked by
///    [`validate_params`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`); lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with envsync. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// Whether calling the tool writes to a store. Defaults to `false`.
    fn mutates(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. The result is wrapped in `{ "result": ... }` by
    /// the HTTP server.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared state handed to every tool call.
///
/// The store and lock table are shared across calls so that concurrent
/// commits into the same target serialize per record.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    locks: Arc<KeyLocks>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, store: Arc<dyn Store>) -> Self {
        Self::with_locks(config, store, Arc::new(KeyLocks::new()))
    }

    pub fn with_locks(config: Arc<Config>, store: Arc<dyn Store>, locks: Arc<KeyLocks>) -> Self {
        Self {
            config,
            store,
            locks,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn orchestrator(&self) -> SyncOrchestrator<dyn Store> {
        SyncOrchestrator::with_locks(
            self.store.clone(),
            self.locks.clone(),
            self.config.sync.options(),
        )
    }

    /// Preview syncing the game `game_id` out of `source`.
    pub async fn preview(&self, game_id: &str, source: &str) -> Result<SyncReport> {
        Ok(self
            .orchestrator()
            .preview(EntityKind::Game, game_id, source)
            .await?)
    }

    /// Copy the game `game_id` and its dependencies from `source` to `target`.
    pub async fn commit(&self, game_id: &str, source: &str, target: &str) -> Result<SyncReport> {
        Ok(self
            .orchestrator()
            .commit(EntityKind::Game, game_id, source, target)
            .await?)
    }

    /// Games involving `team_name`, newest first, capped by `[lookup].max_results`.
    pub async fn find_games(
        &self,
        environment: &str,
        team_name: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<Game>> {
        let query = GameQuery {
            team_name,
            start_date,
            end_date,
        };
        Ok(find_games_by_team(
            self.store.as_ref(),
            environment,
            &query,
            self.config.lookup.max_results,
        )
        .await?)
    }

    pub async fn environments(&self) -> Result<Vec<String>> {
        Ok(self.store.list_environments().await?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter Handling
// ═══════════════════════════════════════════════════════════════════════

/// A caller-supplied parameter was missing, mistyped, or blank.
///
/// Tools return this (wrapped in `anyhow::Error`) so the HTTP server can
/// answer `400 bad_request` without inspecting message text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParamError(pub String);

macro_rules! param_bail {
    ($($arg:tt)*) => {
        return Err(ParamError(format!($($arg)*)).into())
    };
}

/// Check `params` against a tool's schema and fill in declared defaults.
///
/// Enforces `required` keys, primitive `type`s, and `enum` membership.
/// Unknown keys pass through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => param_bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            param_bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) => {
                if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        param_bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
                if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                    if !allowed.contains(value) {
                        param_bail!("parameter '{}' has invalid value {}", prop_name, value);
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A required, non-blank string parameter.
fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    match params[key].as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => param_bail!("{} must not be empty", key),
    }
}

/// An optional string parameter; blank counts as absent.
fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn report_value(report: &SyncReport) -> Result<Value> {
    let mut value = serde_json::to_value(report)?;
    if let Value::Object(map) = &mut value {
        map.insert("text".to_string(), Value::String(report.to_string()));
    }
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Counts what syncing a game would copy. Read-only.
pub struct PreviewSyncTool;

#[async_trait]
impl Tool for PreviewSyncTool {
    fn name(&self) -> &str {
        "preview_sync"
    }

    fn description(&self) -> &str {
        "Preview which records syncing a game would copy, per collection"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gameId": { "type": "string", "description": "Id of the game to sync" },
                "sourceEnvironment": { "type": "string", "description": "Environment to read from" }
            },
            "required": ["gameId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let game_id = required_str(&params, "gameId")?;
        let source = optional_str(&params, "sourceEnvironment")
            .unwrap_or(ctx.config.sync.default_source.as_str());

        let report = ctx.preview(game_id, source).await?;
        report_value(&report)
    }
}

/// Copies a game and everything it references into another environment.
pub struct SyncGameTool;

#[async_trait]
impl Tool for SyncGameTool {
    fn name(&self) -> &str {
        "sync_game"
    }

    fn description(&self) -> &str {
        "Copy a game and the teams, competition, season and league it references between environments"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn mutates(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gameId": { "type": "string", "description": "Id of the game to sync" },
                "sourceEnvironment": { "type": "string", "description": "Environment to read from" },
                "targetEnvironment": { "type": "string", "description": "Environment to write to" }
            },
            "required": ["gameId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let game_id = required_str(&params, "gameId")?;
        let source = optional_str(&params, "sourceEnvironment")
            .unwrap_or(ctx.config.sync.default_source.as_str());
        let target = optional_str(&params, "targetEnvironment")
            .unwrap_or(ctx.config.sync.default_target.as_str());

        let report = ctx.commit(game_id, source, target).await?;
        report_value(&report)
    }
}

/// Looks up games by team name and optional date range.
pub struct FindGamesTool;

#[async_trait]
impl Tool for FindGamesTool {
    fn name(&self) -> &str {
        "find_games"
    }

    fn description(&self) -> &str {
        "Find games by team name and optional date range, newest first"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "teamName": { "type": "string", "description": "Part of either team's name (case-insensitive)" },
                "startDate": { "type": "string", "description": "Earliest game day, YYYY-MM-DD (inclusive)" },
                "endDate": { "type": "string", "description": "Latest game day, YYYY-MM-DD (inclusive)" },
                "environment": { "type": "string", "description": "Environment to search" }
            },
            "required": ["teamName"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let team_name = required_str(&params, "teamName")?;
        let environment =
            optional_str(&params, "environment").unwrap_or(ctx.config.sync.default_source.as_str());
        let start = optional_str(&params, "startDate");
        let end = optional_str(&params, "endDate");

        let games = ctx.find_games(environment, team_name, start, end).await?;
        Ok(json!({
            "environment": environment,
            "count": games.len(),
            "text": render_games(environment, team_name, &games),
            "games": games,
        }))
    }
}

/// Lists environments that hold data.
pub struct ListEnvironmentsTool;

#[async_trait]
impl Tool for ListEnvironmentsTool {
    fn name(&self) -> &str {
        "list_environments"
    }

    fn description(&self) -> &str {
        "List environments that currently hold data"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let environments = ctx.environments().await?;
        let text = if environments.is_empty() {
            "No environments hold data.".to_string()
        } else {
            format!("Environments: {}", environments.join(", "))
        };
        Ok(json!({ "environments": environments, "text": text }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for built-in and custom tools.
///
/// ```rust
/// use envsync::traits::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("sync_game").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `preview_sync`, `sync_game`, `find_games`, and
    /// `list_environments`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PreviewSyncTool));
        registry.register(Box::new(SyncGameTool));
        registry.register(Box::new(FindGamesTool));
        registry.register(Box::new(ListEnvironmentsTool));
        registry
    }

    /// Register a tool. Lookups return the first tool registered under a name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
