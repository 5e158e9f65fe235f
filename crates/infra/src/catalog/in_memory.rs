use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use labops_catalogs::CatalogEntry;

use super::r#trait::{Catalog, CatalogError};

/// In-memory catalog.
///
/// Intended for tests/dev. Entries can be added or removed at any time, which
/// lets tests delete a referenced record between a read and a write.
#[derive(Debug)]
pub struct InMemoryCatalog<E: CatalogEntry> {
    entries: RwLock<HashMap<E::Id, E>>,
}

impl<E: CatalogEntry> Default for InMemoryCatalog<E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: CatalogEntry> InMemoryCatalog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = E>) -> Self {
        let catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    pub fn insert(&self, entry: E) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(entry.id(), entry);
        }
    }

    pub fn remove(&self, id: E::Id) -> Option<E> {
        self.entries.write().ok()?.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: CatalogEntry> Catalog<E> for InMemoryCatalog<E> {
    async fn find_by_id(&self, id: E::Id) -> Result<Option<E>, CatalogError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        Ok(entries.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labops_catalogs::Exam;
    use labops_core::ExamId;

    #[tokio::test]
    async fn finds_inserted_entries_and_forgets_removed_ones() {
        let exam = Exam::new(ExamId::new(), "HMG", "Hemogram");
        let catalog = InMemoryCatalog::with_entries([exam.clone()]);

        assert_eq!(catalog.find_by_id(exam.id).await.unwrap(), Some(exam.clone()));
        assert_eq!(catalog.find_by_id(ExamId::new()).await.unwrap(), None);

        assert_eq!(catalog.remove(exam.id), Some(exam.clone()));
        assert_eq!(catalog.find_by_id(exam.id).await.unwrap(), None);
        assert!(catalog.is_empty());
    }
}
