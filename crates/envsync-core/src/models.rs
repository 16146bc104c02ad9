//! Entity model and the one-hop reference model.
//!
//! Every syncable record is a [`Document`], a closed sum type over the
//! entity kinds envsync understands. Each kind declares, in
//! [`EntityKind::reference_fields`], exactly which of its fields are edges
//! to other documents; [`Document::edges`] extracts the ids behind those
//! same declarations. Both are exhaustive matches, so a new kind cannot be
//! added without deciding its edges.
//!
//! # Reference Model
//!
//! | Kind | Field | Target |
//! |------|-------|--------|
//! | `game` | `homeTeam`, `awayTeam` | `team` |
//! | `game` | `competition` | `competition` |
//! | `game` | `season` | `season` |
//! | `game` | `league` | `league` |
//! | `team` | `players[]` | `player` |
//! | `team` | `competitions[]` | `competition` |
//! | `competition` | `seasons[]` | `season` |
//! | `competition` | `participatingTeams[]` | `team` |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of entity that can live in a collection.
///
/// The declaration order doubles as the deterministic copy order for
/// non-root collections during a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Game,
    Team,
    Player,
    Competition,
    Season,
    League,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Game,
        EntityKind::Team,
        EntityKind::Player,
        EntityKind::Competition,
        EntityKind::Season,
        EntityKind::League,
    ];

    /// Singular kind name, as used in messages about one record.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Game => "game",
            EntityKind::Team => "team",
            EntityKind::Player => "player",
            EntityKind::Competition => "competition",
            EntityKind::Season => "season",
            EntityKind::League => "league",
        }
    }

    /// Collection name used by every store backend.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Game => "games",
            EntityKind::Team => "teams",
            EntityKind::Player => "players",
            EntityKind::Competition => "competitions",
            EntityKind::Season => "seasons",
            EntityKind::League => "leagues",
        }
    }

    /// Reference fields declared for this kind.
    pub fn reference_fields(self) -> &'static [ReferenceField] {
        match self {
            EntityKind::Game => &[
                GAME_HOME_TEAM,
                GAME_AWAY_TEAM,
                GAME_COMPETITION,
                GAME_SEASON,
                GAME_LEAGUE,
            ],
            EntityKind::Team => &[TEAM_PLAYERS, TEAM_COMPETITIONS],
            EntityKind::Competition => &[COMPETITION_SEASONS, COMPETITION_TEAMS],
            EntityKind::Player | EntityKind::Season | EntityKind::League => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Accepts either the collection name (`games`) or the singular kind (`game`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|k| {
                lower == k.collection() || lower == k.name()
            })
            .ok_or_else(|| {
                format!(
                    "unknown collection '{}'. Expected one of: games, teams, players, competitions, seasons, leagues",
                    s
                )
            })
    }
}

/// A declared edge from one kind to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    /// Field name as it appears in the serialized document.
    pub name: &'static str,
    /// Kind of the referenced document.
    pub target: EntityKind,
    /// Whether the field holds a sequence of references.
    pub many: bool,
}

const GAME_HOME_TEAM: ReferenceField = ReferenceField {
    name: "homeTeam",
    target: EntityKind::Team,
    many: false,
};
const GAME_AWAY_TEAM: ReferenceField = ReferenceField {
    name: "awayTeam",
    target: EntityKind::Team,
    many: false,
};
const GAME_COMPETITION: ReferenceField = ReferenceField {
    name: "competition",
    target: EntityKind::Competition,
    many: false,
};
const GAME_SEASON: ReferenceField = ReferenceField {
    name: "season",
    target: EntityKind::Season,
    many: false,
};
const GAME_LEAGUE: ReferenceField = ReferenceField {
    name: "league",
    target: EntityKind::League,
    many: false,
};
const TEAM_PLAYERS: ReferenceField = ReferenceField {
    name: "players",
    target: EntityKind::Player,
    many: true,
};
const TEAM_COMPETITIONS: ReferenceField = ReferenceField {
    name: "competitions",
    target: EntityKind::Competition,
    many: true,
};
const COMPETITION_SEASONS: ReferenceField = ReferenceField {
    name: "seasons",
    target: EntityKind::Season,
    many: true,
};
const COMPETITION_TEAMS: ReferenceField = ReferenceField {
    name: "participatingTeams",
    target: EntityKind::Team,
    many: true,
};

/// One extracted edge: the declaring field plus the referenced id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a> {
    pub field: &'static ReferenceField,
    pub id: &'a str,
}

/// Pointer to a document in another collection.
///
/// `name` and `code` are display snapshots taken when the reference was
/// created; they are never refreshed and never imply ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            code: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            code: None,
        }
    }
}

/// Provenance stamped onto a document when it is copied between environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub synced_at: DateTime<Utc>,
    pub source_environment: String,
    pub synced_by: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub home_team: Option<Reference>,
    #[serde(default)]
    pub away_team: Option<Reference>,
    #[serde(default)]
    pub competition: Option<Reference>,
    #[serde(default)]
    pub season: Option<Reference>,
    #[serde(default)]
    pub league: Option<Reference>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

impl Game {
    /// Display names of both sides, as snapshotted on the references.
    pub fn team_names(&self) -> impl Iterator<Item = &str> {
        [&self.home_team, &self.away_team]
            .into_iter()
            .filter_map(|r| r.as_ref().and_then(|r| r.name.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub founded: Option<i32>,
    #[serde(default)]
    pub players: Vec<Reference>,
    #[serde(default)]
    pub competitions: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub shirt_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub seasons: Vec<Reference>,
    #[serde(default)]
    pub participating_teams: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_info: Option<SyncMetadata>,
}

/// Any syncable entity.
///
/// Serializes as the bare inner record; the kind is carried by the
/// collection it lives in. Use [`Document::from_json`] to decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Game(Game),
    Team(Team),
    Player(Player),
    Competition(Competition),
    Season(Season),
    League(League),
}

impl Document {
    /// Decode a document of the given kind from JSON.
    pub fn from_json(kind: EntityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Game => Document::Game(serde_json::from_value(value)?),
            EntityKind::Team => Document::Team(serde_json::from_value(value)?),
            EntityKind::Player => Document::Player(serde_json::from_value(value)?),
            EntityKind::Competition => Document::Competition(serde_json::from_value(value)?),
            EntityKind::Season => Document::Season(serde_json::from_value(value)?),
            EntityKind::League => Document::League(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Document::Game(_) => EntityKind::Game,
            Document::Team(_) => EntityKind::Team,
            Document::Player(_) => EntityKind::Player,
            Document::Competition(_) => EntityKind::Competition,
            Document::Season(_) => EntityKind::Season,
            Document::League(_) => EntityKind::League,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Document::Game(d) => &d.id,
            Document::Team(d) => &d.id,
            Document::Player(d) => &d.id,
            Document::Competition(d) => &d.id,
            Document::Season(d) => &d.id,
            Document::League(d) => &d.id,
        }
    }

    pub fn sync_info(&self) -> Option<&SyncMetadata> {
        match self {
            Document::Game(d) => d.sync_info.as_ref(),
            Document::Team(d) => d.sync_info.as_ref(),
            Document::Player(d) => d.sync_info.as_ref(),
            Document::Competition(d) => d.sync_info.as_ref(),
            Document::Season(d) => d.sync_info.as_ref(),
            Document::League(d) => d.sync_info.as_ref(),
        }
    }

    /// Replace any existing provenance with `meta`.
    pub fn set_sync_info(&mut self, meta: SyncMetadata) {
        let slot = match self {
            Document::Game(d) => &mut d.sync_info,
            Document::Team(d) => &mut d.sync_info,
            Document::Player(d) => &mut d.sync_info,
            Document::Competition(d) => &mut d.sync_info,
            Document::Season(d) => &mut d.sync_info,
            Document::League(d) => &mut d.sync_info,
        };
        *slot = Some(meta);
    }

    pub fn as_game(&self) -> Option<&Game> {
        match self {
            Document::Game(g) => Some(g),
            _ => None,
        }
    }

    /// One-hop edges out of this document.
    ///
    /// Null references and references with a blank id are skipped.
    pub fn edges(&self) -> Vec<Edge<'_>> {
        let mut out = Vec::new();
        match self {
            Document::Game(g) => {
                push_one(&mut out, &GAME_HOME_TEAM, &g.home_team);
                push_one(&mut out, &GAME_AWAY_TEAM, &g.away_team);
                push_one(&mut out, &GAME_COMPETITION, &g.competition);
                push_one(&mut out, &GAME_SEASON, &g.season);
                push_one(&mut out, &GAME_LEAGUE, &g.league);
            }
            Document::Team(t) => {
                push_many(&mut out, &TEAM_PLAYERS, &t.players);
                push_many(&mut out, &TEAM_COMPETITIONS, &t.competitions);
            }
            Document::Competition(c) => {
                push_many(&mut out, &COMPETITION_SEASONS, &c.seasons);
                push_many(&mut out, &COMPETITION_TEAMS, &c.participating_teams);
            }
            Document::Player(_) | Document::Season(_) | Document::League(_) => {}
        }
        out
    }

    /// Lowercased text the `find_by_text` predicate matches against.
    pub fn search_text(&self) -> String {
        let parts: Vec<&str> = match self {
            Document::Game(g) => {
                let mut parts: Vec<&str> = g.team_names().collect();
                parts.extend(
                    [&g.competition, &g.season, &g.league]
                        .into_iter()
                        .filter_map(|r| r.as_ref().and_then(|r| r.name.as_deref())),
                );
                parts.extend(g.venue.as_deref());
                parts
            }
            Document::Team(t) => {
                let mut parts = vec![t.name.as_str()];
                parts.extend(t.short_name.as_deref());
                parts.extend(t.country.as_deref());
                parts
            }
            Document::Player(p) => {
                let mut parts = vec![p.name.as_str()];
                parts.extend(p.position.as_deref());
                parts.extend(p.nationality.as_deref());
                parts
            }
            Document::Competition(c) => {
                let mut parts = vec![c.name.as_str()];
                parts.extend(c.code.as_deref());
                parts.extend(c.country.as_deref());
                parts
            }
            Document::Season(s) => vec![s.name.as_str()],
            Document::League(l) => {
                let mut parts = vec![l.name.as_str()];
                parts.extend(l.country.as_deref());
                parts
            }
        };
        parts.join("\n").to_lowercase()
    }

    /// Case-insensitive substring match over [`search_text`](Self::search_text).
    pub fn matches_text(&self, needle: &str) -> bool {
        self.search_text().contains(&needle.trim().to_lowercase())
    }
}

fn push_one<'a>(out: &mut Vec<Edge<'a>>, field: &'static ReferenceField, r: &'a Option<Reference>) {
    if let Some(r) = r {
        push_ref(out, field, r);
    }
}

fn push_many<'a>(out: &mut Vec<Edge<'a>>, field: &'static ReferenceField, refs: &'a [Reference]) {
    for r in refs {
        push_ref(out, field, r);
    }
}

fn push_ref<'a>(out: &mut Vec<Edge<'a>>, field: &'static ReferenceField, r: &'a Reference) {
    if !r.id.trim().is_empty() {
        out.push(Edge {
            field,
            id: r.id.as_str(),
        });
    }
}
