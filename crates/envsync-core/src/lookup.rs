//! Game lookup by team name and date range.
//!
//! Used to find a root game before previewing or committing a sync.
//! Matching is a case-insensitive substring test against the team names
//! snapshotted on either side of the game. Date bounds are inclusive
//! `YYYY-MM-DD` days; a bound that does not parse is ignored rather than
//! rejected.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::SyncError;
use crate::models::{EntityKind, Game};
use crate::store::Store;

/// Maximum number of games returned by [`find_games_by_team`].
pub const DEFAULT_LOOKUP_LIMIT: usize = 10;

/// Parameters for one lookup.
#[derive(Debug, Clone, Default)]
pub struct GameQuery<'a> {
    pub team_name: &'a str,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

/// Parse an optional `YYYY-MM-DD` bound, treating garbage as absent.
pub fn parse_bound(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(bound = raw, "ignoring unparseable date bound");
            None
        }
    }
}

/// Games in `environment` involving a team whose name contains
/// `query.team_name`, newest first, at most `limit`.
pub async fn find_games_by_team<S: Store + ?Sized>(
    store: &S,
    environment: &str,
    query: &GameQuery<'_>,
    limit: usize,
) -> Result<Vec<Game>, SyncError> {
    let needle = query.team_name.trim().to_lowercase();
    let start = parse_bound(query.start_date);
    let end = parse_bound(query.end_date);

    let candidates = store
        .find_by_text(EntityKind::Game, &needle, environment)
        .await?;

    let mut games: Vec<Game> = candidates
        .into_iter()
        .filter_map(|doc| doc.as_game().cloned())
        .filter(|game| {
            game.team_names()
                .any(|name| name.to_lowercase().contains(&needle))
        })
        .filter(|game| {
            let day = game.date.date_naive();
            start.map_or(true, |s| day >= s) && end.map_or(true, |e| day <= e)
        })
        .collect();

    games.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    games.truncate(limit);
    Ok(games)
}
