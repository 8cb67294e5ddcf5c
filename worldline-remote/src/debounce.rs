//! Config patch debouncing.
//!
//! Local config edits are merged into one pending patch; the patch is
//! flushed to the remote authority only after `quiet_ms` without further
//! edits, so a burst of changes becomes a single `PATCH /api/config`.

use worldline_core::types::ConfigPatch;

/// Coalesces [`ConfigPatch`]es until a quiet period has passed.
#[derive(Debug, Clone, Default)]
pub struct PatchDebouncer {
    quiet_ms: u64,
    pending: Option<ConfigPatch>,
    due_ms: Option<u64>,
}

impl PatchDebouncer {
    /// A debouncer that waits `quiet_ms` after the last edit.
    #[must_use]
    pub fn new(quiet_ms: u64) -> Self {
        Self { quiet_ms, pending: None, due_ms: None }
    }

    /// Merge `patch` into the pending one and restart the quiet period.
    ///
    /// Returns the clock reading at which the flush is now due.
    pub fn absorb(&mut self, patch: ConfigPatch, now_ms: u64) -> u64 {
        match &mut self.pending {
            Some(pending) => pending.absorb(patch),
            None => self.pending = Some(patch),
        }
        let due = now_ms.saturating_add(self.quiet_ms);
        self.due_ms = Some(due);
        due
    }

    /// When the pending patch is due, if any.
    #[must_use]
    pub fn due_ms(&self) -> Option<u64> {
        self.due_ms
    }

    /// Whether a patch is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending patch if its quiet period has elapsed.
    pub fn take_due(&mut self, now_ms: u64) -> Option<ConfigPatch> {
        match self.due_ms {
            Some(due) if due <= now_ms => {
                self.due_ms = None;
                self.pending.take().filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }

    /// Put back a patch whose flush failed, underneath any newer edits.
    pub fn restore(&mut self, failed: ConfigPatch, now_ms: u64) -> u64 {
        let mut merged = failed;
        if let Some(newer) = self.pending.take() {
            merged.absorb(newer);
        }
        self.pending = Some(merged);
        let due = now_ms.saturating_add(self.quiet_ms);
        self.due_ms = Some(due);
        due
    }
}
