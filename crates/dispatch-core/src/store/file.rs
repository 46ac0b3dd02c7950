//! File-based letter store
//! One JSON file per letter, in a directory per status. A status change is a
//! write into the new state directory followed by removal from the old one.

use super::LetterStore;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use dispatch_types::{Letter, LetterStatus, LetterUpdate};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

const TEMP_SUFFIX: &str = ".json.tmp";

pub struct FileLetterStore {
    root_path: PathBuf,
    // Shared by readers, exclusive for inserts and status changes, so a
    // letter is never observed in two state directories
    lock: RwLock<()>,
}

impl FileLetterStore {
    /// Create store rooted at `root_path`, creating the state directories and
    /// finishing any status change interrupted by a crash
    pub fn new<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        for status in LetterStatus::ALL {
            std::fs::create_dir_all(root_path.join(status.directory_name()))?;
        }

        let repaired = repair_interrupted_moves(&root_path)?;
        if repaired > 0 {
            log::warn!("Repaired {} letter(s) found in two state directories", repaired);
        }

        Ok(Self {
            root_path,
            lock: RwLock::new(()),
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn letter_path(&self, status: LetterStatus, id: Uuid) -> PathBuf {
        self.root_path
            .join(status.directory_name())
            .join(format!("letter_{}.json", id))
    }

    /// Find letter in any state, latest state first
    async fn find_letter_path(&self, id: Uuid) -> Result<Option<(PathBuf, LetterStatus)>> {
        for status in LetterStatus::ALL.iter().rev() {
            let path = self.letter_path(*status, id);
            if fs::try_exists(&path).await? {
                return Ok(Some((path, *status)));
            }
        }
        Ok(None)
    }

    async fn write_letter(&self, path: &Path, letter: &Letter) -> Result<()> {
        let json = serde_json::to_string_pretty(letter)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, path).await?;

        Ok(())
    }

    async fn read_letter(&self, path: &Path) -> Result<Letter> {
        let json = fs::read_to_string(path).await?;

        serde_json::from_str(&json)
            .map_err(|e| DispatchError::Storage(format!("Failed to deserialize {}: {}", path.display(), e)))
    }

    async fn list_letters(&self, status: LetterStatus) -> Result<Vec<Letter>> {
        let state_dir = self.root_path.join(status.directory_name());

        if !fs::try_exists(&state_dir).await? {
            return Ok(Vec::new());
        }

        let mut letters = Vec::new();
        let mut entries = fs::read_dir(&state_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                match self.read_letter(&path).await {
                    Ok(letter) => letters.push(letter),
                    Err(e) => log::warn!("Skipping unreadable letter file {}: {}", path.display(), e),
                }
            }
        }

        Ok(letters)
    }
}

/// Finish status changes interrupted between writing the new state file and
/// removing the old one, and drop half-written temp files. `LetterStatus::ALL`
/// is in lifecycle order, so the copy in the later state wins.
fn repair_interrupted_moves(root_path: &Path) -> Result<usize> {
    let mut seen: HashMap<OsString, PathBuf> = HashMap::new();
    let mut repaired = 0;

    for status in LetterStatus::ALL {
        for entry in std::fs::read_dir(root_path.join(status.directory_name()))? {
            let path = entry?.path();
            let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
                continue;
            };

            if name.to_string_lossy().ends_with(TEMP_SUFFIX) {
                log::warn!("Removing incomplete letter file {}", path.display());
                std::fs::remove_file(&path)?;
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            if let Some(earlier) = seen.insert(name, path.clone()) {
                log::warn!("Letter file {} superseded by {}", earlier.display(), path.display());
                std::fs::remove_file(&earlier)?;
                repaired += 1;
            }
        }
    }

    Ok(repaired)
}

#[async_trait]
impl LetterStore for FileLetterStore {
    async fn insert(&self, letter: Letter) -> Result<()> {
        let _guard = self.lock.write().await;

        if self.find_letter_path(letter.id).await?.is_some() {
            return Err(DispatchError::Storage(format!("Letter {} already exists", letter.id)));
        }

        let path = self.letter_path(letter.status, letter.id);
        self.write_letter(&path, &letter).await?;

        log::debug!("Stored letter {} as {}", letter.id, letter.status);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Letter>> {
        let _guard = self.lock.read().await;

        match self.find_letter_path(id).await? {
            Some((path, _)) => Ok(Some(self.read_letter(&path).await?)),
            None => Ok(None),
        }
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: LetterStatus,
        next: LetterStatus,
        update: LetterUpdate,
    ) -> Result<bool> {
        let _guard = self.lock.write().await;

        let current_path = self.letter_path(expected, id);
        if !fs::try_exists(&current_path).await? {
            return Ok(false);
        }

        let mut letter = self.read_letter(&current_path).await?;
        update.apply_to(&mut letter);
        letter.status = next;

        let new_path = self.letter_path(next, id);
        self.write_letter(&new_path, &letter).await?;
        if new_path != current_path {
            fs::remove_file(&current_path).await?;
        }

        log::debug!("Letter {} moved from {} to {}", id, expected, next);
        Ok(true)
    }

    async fn find_by_status(&self, status: LetterStatus) -> Result<Vec<Letter>> {
        let _guard = self.lock.read().await;

        let mut letters = self.list_letters(status).await?;
        letters.sort_by_key(|l| l.created_at);
        Ok(letters)
    }

    async fn find_by_checksum(&self, service: &str, checksum: &str) -> Result<Vec<Letter>> {
        let _guard = self.lock.read().await;

        let mut found = Vec::new();
        for status in LetterStatus::ALL {
            found.extend(
                self.list_letters(status)
                    .await?
                    .into_iter()
                    .filter(|l| l.service == service && l.checksum == checksum),
            );
        }
        Ok(found)
    }
}
