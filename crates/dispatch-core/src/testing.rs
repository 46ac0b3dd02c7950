//! Test doubles shared by the unit tests

use crate::error::{DispatchError, Result};
use crate::transfer::{TransferChannel, TransferSession};
use async_trait::async_trait;
use dispatch_types::{Letter, LetterStatus};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn validated_letter(service: &str) -> Letter {
    let mut letter = Letter::new("claim_form", service, "checksum", b"%PDF-1.4 letter".to_vec());
    letter.status = LetterStatus::Validated;
    letter
}

pub(crate) fn awaiting_letter(service: &str) -> Letter {
    let mut letter = Letter::new("claim_form", service, "checksum", Vec::new());
    letter.status = LetterStatus::AwaitingConfirmation;
    letter.file_content = None;
    letter.sent_to_print_at = Some(chrono::Utc::now());
    letter
}

#[derive(Default)]
struct MockState {
    reachable: AtomicBool,
    connect_fails: AtomicBool,
    upload_hangs: AtomicBool,
    failing_uploads: AtomicU32,
    failing_downloads: AtomicU32,
    download_attempts: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_released: AtomicUsize,
    uploaded: Mutex<Vec<(String, Vec<u8>)>>,
    reports: Mutex<BTreeMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
}

/// In-memory transfer channel with switchable failures
#[derive(Clone)]
pub(crate) struct MockChannel {
    state: Arc<MockState>,
}

impl MockChannel {
    pub(crate) fn new() -> Self {
        let state = MockState::default();
        state.reachable.store(true, Ordering::SeqCst);
        Self { state: Arc::new(state) }
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn set_connect_fails(&self, fails: bool) {
        self.state.connect_fails.store(fails, Ordering::SeqCst);
    }

    pub(crate) fn set_upload_hangs(&self, hangs: bool) {
        self.state.upload_hangs.store(hangs, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_uploads(&self, count: u32) {
        self.state.failing_uploads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_downloads(&self, count: u32) {
        self.state.failing_downloads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn download_attempts(&self) -> usize {
        self.state.download_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn add_report(&self, path: &str, content: &str) {
        self.state
            .reports
            .lock()
            .unwrap()
            .insert(path.to_string(), content.as_bytes().to_vec());
    }

    pub(crate) fn uploaded(&self) -> Vec<(String, Vec<u8>)> {
        self.state.uploaded.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub(crate) fn sessions_released(&self) -> usize {
        self.state.sessions_released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferChannel for MockChannel {
    async fn connect(&self) -> Result<Box<dyn TransferSession>> {
        if self.state.connect_fails.load(Ordering::SeqCst) {
            return Err(DispatchError::Unavailable("connection refused".to_string()));
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.sessions_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransferSession for MockSession {
    async fn is_reachable(&mut self) -> Result<bool> {
        Ok(self.state.reachable.load(Ordering::SeqCst))
    }

    async fn upload(&mut self, file_name: &str, content: &[u8]) -> Result<()> {
        if self.state.upload_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let remaining = self.state.failing_uploads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.failing_uploads.store(remaining - 1, Ordering::SeqCst);
            return Err(DispatchError::Transfer("connection reset".to_string()));
        }

        self.state
            .uploaded
            .lock()
            .unwrap()
            .push((file_name.to_string(), content.to_vec()));
        Ok(())
    }

    async fn list_reports(&mut self) -> Result<Vec<String>> {
        Ok(self.state.reports.lock().unwrap().keys().cloned().collect())
    }

    async fn download(&mut self, path: &str) -> Result<Vec<u8>> {
        self.state.download_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.state.failing_downloads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.failing_downloads.store(remaining - 1, Ordering::SeqCst);
            return Err(DispatchError::Transfer("connection reset".to_string()));
        }

        self.state
            .reports
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(path.to_string()))
    }

    async fn delete_report(&mut self, path: &str) -> Result<()> {
        self.state.reports.lock().unwrap().remove(path);
        self.state.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }
}
