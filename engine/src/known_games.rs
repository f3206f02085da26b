use std::sync::Arc;

use tokio::sync::OnceCell;

use bgchat_client::Backend;
use bgchat_types::{ChatError, GameId};

/// The backend's game list, fetched at most once per session.
///
/// Concurrent loaders share one request. A failed load is not remembered, so
/// the next call tries again.
#[derive(Debug, Clone, Default)]
pub struct KnownGames {
    cell: Arc<OnceCell<Vec<GameId>>>,
}

impl KnownGames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, backend: &dyn Backend) -> Result<&[GameId], ChatError> {
        let games = self
            .cell
            .get_or_try_init(|| async {
                let games = backend.known_games().await?;
                tracing::debug!(count = games.len(), "Loaded known games");
                Ok::<_, ChatError>(games)
            })
            .await?;
        Ok(games)
    }

    /// The list, if it has been loaded.
    #[must_use]
    pub fn get(&self) -> Option<&[GameId]> {
        self.cell.get().map(Vec::as_slice)
    }

    /// Look up a game by its exact name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<GameId> {
        self.get()?
            .iter()
            .find(|game| game.as_str() == name)
            .cloned()
    }
}
