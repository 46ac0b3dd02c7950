//! In-process letter store

use super::LetterStore;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use dispatch_types::{Letter, LetterStatus, LetterUpdate};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryLetterStore {
    letters: RwLock<HashMap<Uuid, Letter>>,
}

impl InMemoryLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.letters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.letters.read().await.is_empty()
    }
}

#[async_trait]
impl LetterStore for InMemoryLetterStore {
    async fn insert(&self, letter: Letter) -> Result<()> {
        let mut letters = self.letters.write().await;
        if letters.contains_key(&letter.id) {
            return Err(DispatchError::Storage(format!("Letter {} already exists", letter.id)));
        }
        letters.insert(letter.id, letter);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Letter>> {
        Ok(self.letters.read().await.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: LetterStatus,
        next: LetterStatus,
        update: LetterUpdate,
    ) -> Result<bool> {
        let mut letters = self.letters.write().await;
        match letters.get_mut(&id) {
            Some(letter) if letter.status == expected => {
                update.apply_to(letter);
                letter.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_status(&self, status: LetterStatus) -> Result<Vec<Letter>> {
        let letters = self.letters.read().await;
        let mut found: Vec<Letter> = letters.values().filter(|l| l.status == status).cloned().collect();
        found.sort_by_key(|l| l.created_at);
        Ok(found)
    }

    async fn find_by_checksum(&self, service: &str, checksum: &str) -> Result<Vec<Letter>> {
        let letters = self.letters.read().await;
        Ok(letters
            .values()
            .filter(|l| l.service == service && l.checksum == checksum)
            .cloned()
            .collect())
    }
}
