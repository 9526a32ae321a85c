use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Lazily established, process-wide handle to a store.
///
/// The first caller connects. Callers arriving while that attempt runs wait
/// for it. A failed attempt leaves the cell empty, so a later call connects
/// afresh.
#[derive(Debug)]
pub struct SharedConnection<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> Default for SharedConnection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedConnection<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The established handle, connecting with `connect` if there is none.
    pub async fn get_or_connect<F, Fut, E>(&self, connect: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_try_init(move || async move { connect().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
