use super::{GalleryError, GalleryPage, GalleryQuery, GalleryStore, NewGame, PublishedGame};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Gallery kept as one `<id>.json` document per game in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirGallery {
    dir: PathBuf,
}

impl JsonDirGallery {
    /// Open the gallery, creating its directory if needed.
    pub async fn connect(dir: impl Into<PathBuf>) -> Result<Self, GalleryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::info!(dir = %dir.display(), "gallery connected");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn game_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn load_all(&self) -> Result<Vec<PublishedGame>, GalleryError> {
        let mut games = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path).await?;
                match serde_json::from_str::<PublishedGame>(&content) {
                    Ok(game) => games.push(game),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable game")
                    }
                }
            }
        }

        Ok(games)
    }
}

#[async_trait]
impl GalleryStore for JsonDirGallery {
    async fn create(&self, game: NewGame) -> Result<PublishedGame, GalleryError> {
        let published = PublishedGame::publish(game)?;
        let path = self.game_path(published.id);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_string_pretty(&published)?).await?;
        fs::rename(&tmp, &path).await?;

        tracing::info!(id = %published.id, title = %published.game.title, "game published");
        Ok(published)
    }

    async fn list(&self, query: &GalleryQuery) -> Result<GalleryPage, GalleryError> {
        Ok(query.apply(self.load_all().await?))
    }

    async fn get(&self, id: Uuid) -> Result<PublishedGame, GalleryError> {
        match fs::read_to_string(self.game_path(id)).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GalleryError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(title: &str) -> NewGame {
        NewGame {
            pseudonym: "Designori".to_string(),
            title: title.to_string(),
            trajectory: "[Order]1 ═══ [Chaos]2 ★".to_string(),
            concept_commentary: "1. Order\n2. Chaos".to_string(),
            commentary: "Balanced.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = JsonDirGallery::connect(dir.path().join("games")).await.unwrap();

        let first = gallery.create(game("First")).await.unwrap();
        let second = gallery.create(game("  Second  ")).await.unwrap();
        assert_eq!(second.game.title, "Second");

        assert_eq!(gallery.get(first.id).await.unwrap(), first);

        let page = gallery.list(&GalleryQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.games[0].id, second.id);
    }

    #[tokio::test]
    async fn test_missing_game_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = JsonDirGallery::connect(dir.path()).await.unwrap();
        assert!(matches!(
            gallery.get(Uuid::new_v4()).await,
            Err(GalleryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_invalid_game_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = JsonDirGallery::connect(dir.path()).await.unwrap();

        let err = gallery
            .create(NewGame {
                commentary: String::new(),
                ..game("Empty")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Invalid(_)));
        assert_eq!(gallery.list(&GalleryQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unreadable_documents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = JsonDirGallery::connect(dir.path()).await.unwrap();
        gallery.create(game("Kept")).await.unwrap();
        fs::write(dir.path().join("junk.json"), "{").await.unwrap();

        assert_eq!(gallery.list(&GalleryQuery::default()).await.unwrap().total, 1);
    }
}
