// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-user print dialog state.
//
// A user without a session is idle. A session owns exactly one canonical PDF
// and walks mode -> range -> dispatch. Dispatch and cancel consume the
// session; dropping it deletes the PDF.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{OwnedArtifact, PageRanges, PrintMode, SourceKind, UserId};
use tokio::sync::OwnedMutexGuard;

/// Text that leaves custom range entry without printing.
pub const RANGE_CANCEL_TOKEN: &str = "/cancel";

/// Where a live session is in the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Converted and waiting for a print mode.
    ArtifactReady,
    /// Mode chosen; waiting for "all pages" or "custom range".
    ModeSelected(PrintMode),
    /// Waiting for free-form range text.
    CustomRangePending(PrintMode),
}

/// User input that drives the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ChooseMode(PrintMode),
    PrintAll,
    CustomRange,
    RangeText(String),
    Back,
    Cancel,
}

/// Options presented to the user after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Mode(PrintMode),
    PrintAll,
    CustomRange,
    Back,
    Cancel,
}

/// What the caller must do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    ShowModes,
    ShowRangeChoice(PrintMode),
    AskRange(PrintMode),
    /// Print now; the caller takes the session out of its slot.
    Dispatch {
        mode: PrintMode,
        range: Option<PageRanges>,
    },
    /// The caller drops the session.
    Cancelled,
    /// Not allowed here; the state is unchanged.
    Rejected(String),
    /// Nothing to do (range text while no range was asked for).
    Ignored,
}

/// One user's active document.
#[derive(Debug)]
pub struct Session {
    artifact: OwnedArtifact,
    pub original_name: String,
    pub page_count: u32,
    pub kind: SourceKind,
    pub mode: PrintMode,
    pub state: SessionState,
    /// Grayscale conversion failed and the PDF keeps its original colours.
    pub degraded: bool,
    /// SHA-256 of the canonical PDF, hex.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        artifact: OwnedArtifact,
        original_name: impl Into<String>,
        page_count: u32,
        kind: SourceKind,
        degraded: bool,
        fingerprint: String,
    ) -> Self {
        Self {
            artifact,
            original_name: original_name.into(),
            page_count,
            kind,
            mode: PrintMode::Normal,
            state: SessionState::ArtifactReady,
            degraded,
            fingerprint,
            created_at: Utc::now(),
        }
    }

    pub fn artifact(&self) -> &OwnedArtifact {
        &self.artifact
    }

    /// Advance the dialog. Never touches the artifact itself.
    pub fn apply(&mut self, event: SessionEvent) -> Transition {
        match (self.state, event) {
            (_, SessionEvent::Cancel) => Transition::Cancelled,
            (_, SessionEvent::ChooseMode(mode)) => self.choose_mode(mode),
            (_, SessionEvent::Back) => {
                self.state = SessionState::ArtifactReady;
                Transition::ShowModes
            }

            (SessionState::ArtifactReady, SessionEvent::PrintAll | SessionEvent::CustomRange) => {
                Transition::Rejected("Choose a print mode first.".into())
            }
            (SessionState::ArtifactReady | SessionState::ModeSelected(_), SessionEvent::RangeText(_)) => {
                Transition::Ignored
            }

            (
                SessionState::ModeSelected(mode) | SessionState::CustomRangePending(mode),
                SessionEvent::PrintAll,
            ) => Transition::Dispatch { mode, range: None },
            (
                SessionState::ModeSelected(mode) | SessionState::CustomRangePending(mode),
                SessionEvent::CustomRange,
            ) => {
                self.state = SessionState::CustomRangePending(mode);
                Transition::AskRange(mode)
            }

            (SessionState::CustomRangePending(mode), SessionEvent::RangeText(text)) => {
                if text.trim().eq_ignore_ascii_case(RANGE_CANCEL_TOKEN) {
                    self.state = SessionState::ModeSelected(mode);
                    return Transition::ShowRangeChoice(mode);
                }
                match PageRanges::parse(&text) {
                    Ok(range) => Transition::Dispatch {
                        mode,
                        range: Some(range),
                    },
                    Err(_) => Transition::Rejected(format!(
                        "Invalid page range. Example: 1-3,5,7-9 (or {RANGE_CANCEL_TOKEN})"
                    )),
                }
            }
        }
    }

    fn choose_mode(&mut self, mode: PrintMode) -> Transition {
        if !self.kind.supports_layout_modes() {
            if mode != PrintMode::Normal {
                return Transition::Rejected("Images can only be printed one-sided.".into());
            }
            self.mode = mode;
            return Transition::Dispatch { mode, range: None };
        }

        if mode == PrintMode::Booklet {
            if self.page_count < 2 {
                self.state = SessionState::ArtifactReady;
                return Transition::Rejected("A booklet needs at least 2 pages.".into());
            }
            self.mode = mode;
            return Transition::Dispatch { mode, range: None };
        }

        self.mode = mode;
        if self.page_count <= 1 {
            return Transition::Dispatch { mode, range: None };
        }
        self.state = SessionState::ModeSelected(mode);
        Transition::ShowRangeChoice(mode)
    }

    /// Options valid in the current state.
    pub fn choices(&self) -> Vec<Choice> {
        match self.state {
            SessionState::ArtifactReady => mode_choices(self.kind),
            SessionState::ModeSelected(_) => {
                vec![Choice::PrintAll, Choice::CustomRange, Choice::Back]
            }
            SessionState::CustomRangePending(_) => vec![Choice::Back, Choice::Cancel],
        }
    }
}

/// The mode menu for a document of `kind`.
pub fn mode_choices(kind: SourceKind) -> Vec<Choice> {
    if kind.supports_layout_modes() {
        vec![
            Choice::Mode(PrintMode::Normal),
            Choice::Mode(PrintMode::Duplex),
            Choice::Mode(PrintMode::Booklet),
            Choice::Cancel,
        ]
    } else {
        vec![Choice::Mode(PrintMode::Normal), Choice::Cancel]
    }
}

/// Exclusive access to one user's slot for the length of an interaction.
pub type SessionSlot = OwnedMutexGuard<Option<Session>>;

/// All users' sessions. Each user has an independent slot; interactions for
/// different users never wait on each other.
#[derive(Default, Clone)]
pub struct SessionTable {
    slots: Arc<Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<Option<Session>>>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the user's slot, or fail with `SessionBusy` if another
    /// interaction for the same user is still running.
    ///
    /// Slots that are neither held nor holding a session are dropped on the
    /// way, so the table only keeps users with something in flight.
    pub fn acquire(&self, user: UserId) -> Result<SessionSlot> {
        let slot = {
            let mut slots = lock(&self.slots);
            // Clones are only made under the table lock, so a count of one
            // means no guard exists.
            slots.retain(|_, slot| {
                Arc::strong_count(slot) > 1 || slot.try_lock().map_or(true, |s| s.is_some())
            });
            Arc::clone(slots.entry(user).or_default())
        };
        slot.try_lock_owned().map_err(|_| PrintdeskError::SessionBusy)
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
