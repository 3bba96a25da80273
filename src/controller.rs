//! Orchestrates generate and upscale operations over the history store.
//!
//! Each operation category has its own single-flight state machine:
//!
//! ```text
//! generate: Idle -> InFlight -> Idle
//! upscale:  Idle -> AwaitingCredential -> InFlight -> Idle
//!                                      \-> Idle (cancelled)
//! ```
//!
//! A request for a category that is not `Idle` is rejected immediately
//! with [`PixelGenError::Busy`]; nothing is queued. The two categories are
//! independent of each other.

use crate::credential::{AlwaysSelected, CredentialSelector};
use crate::error::{Operation, PixelGenError, Result};
use crate::history::HistoryStore;
use crate::image::{AspectRatio, GeneratedImageRecord, ImageRequestClient};
use std::sync::{Arc, Mutex, MutexGuard};

/// Longest prompt accepted, in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// State of one operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightState {
    /// Nothing running.
    #[default]
    Idle,
    /// Waiting on the interactive credential picker (upscale only).
    AwaitingCredential,
    /// A remote request is outstanding.
    InFlight,
}

/// Marks a category busy until dropped.
struct FlightGuard<'a> {
    slot: &'a Mutex<FlightState>,
}

impl<'a> FlightGuard<'a> {
    fn begin(
        slot: &'a Mutex<FlightState>,
        operation: Operation,
        initial: FlightState,
    ) -> Result<Self> {
        let mut state = lock(slot);
        if *state != FlightState::Idle {
            tracing::debug!(operation = operation.as_str(), state = ?*state, "rejected while busy");
            return Err(PixelGenError::Busy(operation));
        }
        *state = initial;
        Ok(Self { slot })
    }

    fn dispatch(&self) {
        *lock(self.slot) = FlightState::InFlight;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = FlightState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drives generation requests and applies their results to the history.
///
/// All methods take `&self`; share the controller behind an `Arc` to run
/// operations from spawned tasks.
pub struct GenerationController {
    client: ImageRequestClient,
    history: Mutex<HistoryStore>,
    selector: Arc<dyn CredentialSelector>,
    generate_state: Mutex<FlightState>,
    upscale_state: Mutex<FlightState>,
    prompt: Mutex<String>,
    error: Mutex<Option<String>>,
}

impl GenerationController {
    /// Creates a controller with no interactive credential picker.
    pub fn new(client: ImageRequestClient, history: HistoryStore) -> Self {
        Self {
            client,
            history: Mutex::new(history),
            selector: Arc::new(AlwaysSelected),
            generate_state: Mutex::new(FlightState::Idle),
            upscale_state: Mutex::new(FlightState::Idle),
            prompt: Mutex::new(String::new()),
            error: Mutex::new(None),
        }
    }

    /// Installs the credential picker consulted before each upscale.
    pub fn with_selector(mut self, selector: Arc<dyn CredentialSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Returns the state of an operation category.
    pub fn state(&self, operation: Operation) -> FlightState {
        *lock(self.state_slot(operation))
    }

    /// Returns the message currently shown to the user, if any.
    pub fn error_message(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    /// Replaces the prompt draft.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        *lock(&self.prompt) = prompt.into();
    }

    /// Returns the prompt draft. Cleared after a successful generate.
    pub fn prompt(&self) -> String {
        lock(&self.prompt).clone()
    }

    /// Snapshot of the history, newest first.
    pub fn records(&self) -> Vec<GeneratedImageRecord> {
        lock(&self.history).all().to_vec()
    }

    /// Looks up a record by id.
    pub fn find(&self, id: &str) -> Option<GeneratedImageRecord> {
        lock(&self.history).get(id).cloned()
    }

    /// Deletes a record. Always allowed, even while operations run; an
    /// in-flight upscale of the deleted record still completes.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = lock(&self.history).remove(id)?;
        if removed {
            tracing::info!(id, "image deleted");
        }
        Ok(removed)
    }

    /// Deletes every record.
    pub fn clear_history(&self) -> Result<()> {
        lock(&self.history).clear()?;
        tracing::info!("history cleared");
        Ok(())
    }

    /// Generates an image and prepends it to the history.
    pub async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImageRecord> {
        validate_prompt(prompt)?;
        let _flight = FlightGuard::begin(
            &self.generate_state,
            Operation::Generate,
            FlightState::InFlight,
        )?;
        self.set_error(None);

        let result = self
            .client
            .generate(prompt, aspect_ratio)
            .await
            .and_then(|record| self.store(record));

        if result.is_ok() {
            lock(&self.prompt).clear();
        }
        self.finish(Operation::Generate, result)
    }

    /// Upscales the record with `id` and prepends the result. The source
    /// record stays in the history unchanged.
    pub async fn upscale(&self, id: &str) -> Result<GeneratedImageRecord> {
        let flight = FlightGuard::begin(
            &self.upscale_state,
            Operation::Upscale,
            FlightState::AwaitingCredential,
        )?;

        let Some(source) = self.find(id) else {
            return self.finish(
                Operation::Upscale,
                Err(PixelGenError::RecordNotFound(id.to_string())),
            );
        };

        if let Err(e) = self.ensure_credential_selected().await {
            return self.finish(Operation::Upscale, Err(e));
        }

        flight.dispatch();
        self.set_error(None);

        let result = self
            .client
            .upscale(&source)
            .await
            .and_then(|record| self.store(record));
        self.finish(Operation::Upscale, result)
    }

    async fn pick_credential(&self) -> Result<bool> {
        if !self.selector.has_selected_credential().await? {
            self.selector.open_credential_picker().await?;
        }
        self.selector.has_selected_credential().await
    }

    async fn ensure_credential_selected(&self) -> Result<()> {
        match self.pick_credential().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PixelGenError::CredentialSelectionCancelled),
            Err(e) => {
                tracing::info!("credential selection cancelled or failed: {e}");
                Err(PixelGenError::CredentialSelectionCancelled)
            }
        }
    }

    fn store(&self, record: GeneratedImageRecord) -> Result<GeneratedImageRecord> {
        lock(&self.history).prepend(record.clone())?;
        Ok(record)
    }

    fn finish(
        &self,
        operation: Operation,
        result: Result<GeneratedImageRecord>,
    ) -> Result<GeneratedImageRecord> {
        match &result {
            Ok(record) => {
                self.set_error(None);
                tracing::info!(
                    operation = operation.as_str(),
                    id = %record.id,
                    resolution = %record.resolution_tier,
                    "image added to history"
                );
            }
            Err(e) if e.is_silent() => {
                tracing::debug!(operation = operation.as_str(), "operation aborted: {e}");
            }
            Err(e) => {
                tracing::warn!(operation = operation.as_str(), "operation failed: {e}");
                self.set_error(Some(e.to_string()));
            }
        }
        result
    }

    fn set_error(&self, message: Option<String>) {
        *lock(&self.error) = message;
    }

    fn state_slot(&self, operation: Operation) -> &Mutex<FlightState> {
        match operation {
            Operation::Generate => &self.generate_state,
            Operation::Upscale => &self.upscale_state,
        }
    }
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(PixelGenError::InvalidPrompt("prompt must not be empty".into()));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(PixelGenError::InvalidPrompt(format!(
            "prompt is {chars} characters, the limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(())
}
