//! Game lookup by team name (`envsync find-games`).
//!
//! Shares [`render_games`] with the `find_games` tool so the CLI and the
//! tool server print the same listing.

use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;

use envsync_core::models::Game;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::traits::ToolContext;

/// Human-readable listing of lookup results, one game per line.
pub fn render_games(environment: &str, team_name: &str, games: &[Game]) -> String {
    if games.is_empty() {
        return format!(
            "No games involving '{}' found in environment '{}'.",
            team_name, environment
        );
    }

    let mut out = format!(
        "{} game(s) involving '{}' in '{}':",
        games.len(),
        team_name,
        environment
    );
    for game in games {
        let side = |r: &Option<envsync_core::Reference>| {
            r.as_ref()
                .map(|r| r.name.clone().unwrap_or_else(|| r.id.clone()))
                .unwrap_or_else(|| "?".to_string())
        };
        let score = match (game.home_score, game.away_score) {
            (Some(h), Some(a)) => format!(" {}-{}", h, a),
            _ => String::new(),
        };
        let _ = write!(
            out,
            "\n  {}  {}  {} vs {}{}",
            game.date.format("%Y-%m-%d"),
            game.id,
            side(&game.home_team),
            side(&game.away_team),
            score
        );
    }
    out
}

/// CLI entry point for `envsync find-games`.
pub async fn run_find_games(
    config: &Config,
    team_name: &str,
    start: Option<&str>,
    end: Option<&str>,
    environment: Option<&str>,
) -> Result<()> {
    let environment = environment.unwrap_or(config.sync.default_source.as_str());
    let store = Arc::new(SqliteStore::open(config).await?);
    let ctx = ToolContext::new(Arc::new(config.clone()), store);

    let games = ctx.find_games(environment, team_name, start, end).await?;
    println!("{}", render_games(environment, team_name, &games));
    Ok(())
}
