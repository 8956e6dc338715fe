//! vpurse Notifier - Gap-free, append-only update notifiers
//!
//! A notifier kit is a single-producer, multi-consumer log of versioned
//! states. The [`Updater`] appends; every [`Notifier`] reads by update
//! counter and suspends until the counter advances.
//!
//! # Read contract
//!
//! - `get_update_since(None)` returns the current state
//! - `get_update_since(Some(c))` returns exactly update `c + 1`
//!
//! A reader that follows the returned counters therefore sees every update
//! exactly once, in production order. After `finish` the final record has
//! no counter; after `fail` every read returns the failure.
//!
//! A kit keeps a bounded window of recent updates. A reader that falls
//! behind the window gets the oldest retained update instead of `c + 1`;
//! the returned counter shows how far it jumped.

use futures::stream::BoxStream;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors observed by notifier readers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifierError {
    /// The producer failed; terminal
    #[error("Notifier failed: {0}")]
    Failed(String),

    /// The producer went away without finishing
    #[error("Notifier closed without a final state")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NotifierError>;

/// One published state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord<T> {
    pub value: T,
    /// Position of this update, starting at 1. `None` marks the final state.
    pub update_count: Option<u64>,
}

impl<T> UpdateRecord<T> {
    pub fn is_final(&self) -> bool {
        self.update_count.is_none()
    }
}

#[derive(Debug, Clone)]
enum Terminal {
    Finished,
    Failed(String),
}

/// Updates a kit retains by default
pub const DEFAULT_HISTORY: usize = 1024;

#[derive(Debug)]
struct Log<T> {
    /// Number of updates dropped from the front of the window
    base: u64,
    updates: VecDeque<T>,
    history: usize,
    terminal: Option<Terminal>,
}

impl<T: Clone> Log<T> {
    /// Updates produced so far, retained or not
    fn len(&self) -> u64 {
        self.base + self.updates.len() as u64
    }

    fn can_answer(&self, since: Option<u64>) -> bool {
        if self.terminal.is_some() {
            return true;
        }
        match since {
            None => !self.updates.is_empty(),
            Some(count) => self.len() > count,
        }
    }

    fn answer(&self, since: Option<u64>) -> Result<UpdateRecord<T>> {
        if let Some(Terminal::Failed(reason)) = &self.terminal {
            return Err(NotifierError::Failed(reason.clone()));
        }
        if self.updates.is_empty() {
            return Err(NotifierError::Closed);
        }
        let finished = matches!(self.terminal, Some(Terminal::Finished));

        // Readers behind the window resume at its oldest update
        let index = match since {
            Some(count) if count < self.len() => count.max(self.base),
            _ => self.len() - 1,
        };
        let is_last = index + 1 == self.len();

        Ok(UpdateRecord {
            value: self.updates[(index - self.base) as usize].clone(),
            update_count: if finished && is_last {
                None
            } else {
                Some(index + 1)
            },
        })
    }

    fn push(&mut self, value: T) {
        self.updates.push_back(value);
        while self.updates.len() > self.history {
            self.updates.pop_front();
            self.base += 1;
        }
    }
}

/// Create a connected notifier/updater pair retaining [`DEFAULT_HISTORY`] updates
pub fn make_notifier_kit<T>() -> (Notifier<T>, Updater<T>)
where
    T: Clone + Send + Sync + 'static,
{
    make_notifier_kit_with_history(DEFAULT_HISTORY)
}

/// Create a connected notifier/updater pair retaining the last `history`
/// updates (at least one)
pub fn make_notifier_kit_with_history<T>(history: usize) -> (Notifier<T>, Updater<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(Log {
        base: 0,
        updates: VecDeque::new(),
        history: history.max(1),
        terminal: None,
    });
    (Notifier { rx }, Updater { tx: Arc::new(tx) })
}

/// Read side of a notifier kit
#[derive(Debug, Clone)]
pub struct Notifier<T> {
    rx: watch::Receiver<Log<T>>,
}

impl<T> Notifier<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wait for the state after `since` (or the current state for `None`)
    pub async fn get_update_since(&self, since: Option<u64>) -> Result<UpdateRecord<T>> {
        let mut rx = self.rx.clone();
        let log = rx
            .wait_for(|log| log.can_answer(since))
            .await
            .map_err(|_| NotifierError::Closed)?;
        log.answer(since)
    }

    /// Latest value, waiting for the first one if none exists yet
    pub async fn get_current(&self) -> Result<T> {
        self.get_update_since(None).await.map(|record| record.value)
    }

    /// Number of updates published so far
    pub fn update_count(&self) -> u64 {
        self.rx.borrow().len()
    }

    pub fn is_terminal(&self) -> bool {
        self.rx.borrow().terminal.is_some()
    }

    /// Every update from the current state onward, ending after the final
    /// record or the first error.
    pub fn updates(&self) -> BoxStream<'static, Result<UpdateRecord<T>>> {
        let notifier = self.clone();
        Box::pin(async_stream::stream! {
            let mut since = None;
            loop {
                match notifier.get_update_since(since).await {
                    Ok(record) => {
                        since = record.update_count;
                        let done = record.is_final();
                        yield Ok(record);
                        if done {
                            break;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }
}

/// Write side of a notifier kit
#[derive(Debug, Clone)]
pub struct Updater<T> {
    tx: Arc<watch::Sender<Log<T>>>,
}

impl<T> Updater<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Append a state. Returns false if the kit is already terminal.
    pub fn update_state(&self, value: T) -> bool {
        self.append(Some(value), None)
    }

    /// Append the final state
    pub fn finish(&self, value: T) -> bool {
        self.append(Some(value), Some(Terminal::Finished))
    }

    /// Enter the terminal failure state
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.append(None, Some(Terminal::Failed(reason.into())))
    }

    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().terminal.is_some()
    }

    pub fn notifier(&self) -> Notifier<T> {
        Notifier {
            rx: self.tx.subscribe(),
        }
    }

    fn append(&self, value: Option<T>, terminal: Option<Terminal>) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|log| {
            if log.terminal.is_some() {
                return false;
            }
            if let Some(value) = value {
                log.push(value);
            }
            log.terminal = terminal;
            accepted = true;
            true
        });
        if !accepted {
            tracing::debug!("Ignoring update to terminal notifier");
        }
        accepted
    }
}
