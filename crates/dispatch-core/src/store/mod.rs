//! Letter storage port and its adapters

pub mod file;
pub mod memory;

pub use file::FileLetterStore;
pub use memory::InMemoryLetterStore;

use crate::error::Result;
use async_trait::async_trait;
use dispatch_types::{Letter, LetterStatus, LetterUpdate};
use uuid::Uuid;

/// Keyed store for letters.
///
/// Every status change goes through `compare_and_set_status`, a single
/// conditional update keyed by id and expected prior status. Implementations
/// must apply it atomically relative to concurrent readers.
#[async_trait]
pub trait LetterStore: Send + Sync {
    async fn insert(&self, letter: Letter) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Letter>>;

    /// Move `id` from `expected` to `next`, applying `update`.
    /// Returns false without touching the letter when it is missing or not in `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: LetterStatus,
        next: LetterStatus,
        update: LetterUpdate,
    ) -> Result<bool>;

    /// Letters in `status`, oldest first
    async fn find_by_status(&self, status: LetterStatus) -> Result<Vec<Letter>>;

    async fn find_by_checksum(&self, service: &str, checksum: &str) -> Result<Vec<Letter>>;
}
