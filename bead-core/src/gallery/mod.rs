//! Published games.
//!
//! A finished session is published as flat text: trajectory lines joined by
//! newlines, commentary as `<n>. <text>` lines, plus the player's
//! reflection. Stores implement [`GalleryStore`].

mod connection;
mod json_dir;

pub use connection::SharedConnection;
pub use json_dir::JsonDirGallery;

use crate::trajectory::TrajectoryState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_PSEUDONYM: usize = 50;
pub const MAX_TITLE: usize = 200;
pub const MAX_TRAJECTORY: usize = 5000;
pub const MAX_CONCEPT_COMMENTARY: usize = 3000;
pub const MAX_REFLECTION: usize = 2000;

/// Page size when a query names none.
pub const DEFAULT_PAGE_SIZE: usize = 12;
/// Largest page a query may ask for.
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{0}")]
    Invalid(String),

    #[error("Game not found")]
    NotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gallery unavailable: {0}")]
    Unavailable(String),
}

/// A game ready to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub pseudonym: String,
    pub title: String,
    pub trajectory: String,
    pub concept_commentary: String,
    /// The player's closing reflection.
    pub commentary: String,
}

impl NewGame {
    /// Serialize a session's final state for publishing.
    pub fn from_state(
        pseudonym: impl Into<String>,
        title: impl Into<String>,
        state: &TrajectoryState,
        reflection: impl Into<String>,
    ) -> Self {
        Self {
            pseudonym: pseudonym.into(),
            title: title.into(),
            trajectory: state.trajectory_text(),
            concept_commentary: state.commentary_text(),
            commentary: reflection.into(),
        }
    }

    /// Trim every field and check it is present and within its limit.
    pub fn validate(self) -> Result<Self, GalleryError> {
        Ok(Self {
            pseudonym: checked("Pseudonym", self.pseudonym, MAX_PSEUDONYM)?,
            title: checked("Title", self.title, MAX_TITLE)?,
            trajectory: checked("Trajectory", self.trajectory, MAX_TRAJECTORY)?,
            concept_commentary: checked(
                "Concept commentary",
                self.concept_commentary,
                MAX_CONCEPT_COMMENTARY,
            )?,
            commentary: checked("Commentary", self.commentary, MAX_REFLECTION)?,
        })
    }
}

fn checked(field: &str, value: String, max: usize) -> Result<String, GalleryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GalleryError::Invalid(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(GalleryError::Invalid(format!(
            "{field} cannot be more than {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// A stored game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedGame {
    pub id: Uuid,
    #[serde(flatten)]
    pub game: NewGame,
    pub created_at: DateTime<Utc>,
}

impl PublishedGame {
    /// Validate `game` and stamp it with a fresh id and the current time.
    pub fn publish(game: NewGame) -> Result<Self, GalleryError> {
        Ok(Self {
            id: Uuid::new_v4(),
            game: game.validate()?,
            created_at: Utc::now(),
        })
    }

    fn matches(&self, needle: &str) -> bool {
        [
            &self.game.title,
            &self.game.pseudonym,
            &self.game.commentary,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryQuery {
    /// 1-based.
    pub page: usize,
    pub limit: usize,
    pub search: Option<String>,
}

impl Default for GalleryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
        }
    }
}

impl GalleryQuery {
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    fn page(&self) -> usize {
        self.page.max(1)
    }

    fn limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Filter, order newest first and cut one page from `games`.
    pub fn apply(&self, mut games: Vec<PublishedGame>) -> GalleryPage {
        if let Some(needle) = self.needle() {
            games.retain(|g| g.matches(&needle));
        }
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = self.page();
        let limit = self.limit();
        let total = games.len();
        let total_pages = total.div_ceil(limit);
        let games = games
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        GalleryPage {
            games,
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPage {
    pub games: Vec<PublishedGame>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn create(&self, game: NewGame) -> Result<PublishedGame, GalleryError>;
    async fn list(&self, query: &GalleryQuery) -> Result<GalleryPage, GalleryError>;
    async fn get(&self, id: Uuid) -> Result<PublishedGame, GalleryError>;
}

#[async_trait]
impl<T: GalleryStore + ?Sized> GalleryStore for Arc<T> {
    async fn create(&self, game: NewGame) -> Result<PublishedGame, GalleryError> {
        (**self).create(game).await
    }

    async fn list(&self, query: &GalleryQuery) -> Result<GalleryPage, GalleryError> {
        (**self).list(query).await
    }

    async fn get(&self, id: Uuid) -> Result<PublishedGame, GalleryError> {
        (**self).get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::TrajectoryLine;
    use chrono::Duration;

    fn game(title: &str) -> NewGame {
        NewGame {
            pseudonym: "Knecht".to_string(),
            title: title.to_string(),
            trajectory: "[Time]1 ~~~ [Memory]2".to_string(),
            concept_commentary: "1. Time".to_string(),
            commentary: "A quiet game.".to_string(),
        }
    }

    #[test]
    fn test_from_state_serializes_flat_text() {
        let mut state = TrajectoryState::default();
        state.trajectory.push(TrajectoryLine::new("[Time]1 ~~~ [Memory]2"));
        state.trajectory.push(TrajectoryLine::new("[Memory]2 ★"));
        state.commentary.insert(2, "Memory");
        state.commentary.insert(1, "Time");

        let new_game = NewGame::from_state("Knecht", "Rivers", &state, "Done.");
        assert_eq!(new_game.trajectory, "[Time]1 ~~~ [Memory]2\n[Memory]2 ★");
        assert_eq!(new_game.concept_commentary, "1. Time\n2. Memory");
        assert_eq!(new_game.commentary, "Done.");
    }

    #[test]
    fn test_validation_trims_and_limits() {
        let trimmed = NewGame {
            pseudonym: "  Knecht ".to_string(),
            ..game("Rivers")
        }
        .validate()
        .unwrap();
        assert_eq!(trimmed.pseudonym, "Knecht");

        let blank = NewGame {
            title: "   ".to_string(),
            ..game("x")
        };
        assert!(matches!(blank.validate(), Err(GalleryError::Invalid(_))));

        let long = NewGame {
            pseudonym: "x".repeat(MAX_PSEUDONYM + 1),
            ..game("x")
        };
        assert!(matches!(long.validate(), Err(GalleryError::Invalid(_))));

        let at_limit = NewGame {
            title: "é".repeat(MAX_TITLE),
            ..game("x")
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_published_game_json_shape() {
        let published = PublishedGame::publish(game("Rivers")).unwrap();
        let json = serde_json::to_value(&published).unwrap();
        assert!(json.get("conceptCommentary").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("id").is_some());
        assert!(json.get("game").is_none());
    }

    #[test]
    fn test_query_orders_searches_and_pages() {
        let base = Utc::now();
        let games: Vec<_> = (0..5)
            .map(|i| {
                let mut g = PublishedGame::publish(game(&format!("Game {i}"))).unwrap();
                g.created_at = base + Duration::seconds(i);
                g
            })
            .collect();

        let page = GalleryQuery::default().with_limit(2).apply(games.clone());
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.games[0].game.title, "Game 4");
        assert_eq!(page.games[1].game.title, "Game 3");

        let last = GalleryQuery::default()
            .with_limit(2)
            .with_page(3)
            .apply(games.clone());
        assert_eq!(last.games.len(), 1);
        assert_eq!(last.games[0].game.title, "Game 0");

        let found = GalleryQuery::default()
            .with_search("GAME 2")
            .apply(games.clone());
        assert_eq!(found.total, 1);

        let clamped = GalleryQuery::default().with_limit(500).apply(games);
        assert_eq!(clamped.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_huge_page_is_empty() {
        let games = vec![PublishedGame::publish(game("Only")).unwrap()];
        let page = GalleryQuery::default()
            .with_limit(MAX_PAGE_SIZE)
            .with_page(usize::MAX)
            .apply(games);

        assert!(page.games.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }
}
