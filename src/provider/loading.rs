//! Reload guard
//!
//! A provider is either idle or running exactly one reload. Requests that
//! arrive while a reload is in flight are dropped.

/// Per-provider load state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
}

/// Proof that the caller owns the current reload
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct ReloadTicket {
    generation: u64,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct ReloadScheduler {
    state: LoadState,
    generation: u64,
    completed: u64,
}

impl ReloadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Loading`, or None when a reload is already running
    pub fn try_begin(&mut self) -> Option<ReloadTicket> {
        if self.state == LoadState::Loading {
            return None;
        }
        self.state = LoadState::Loading;
        self.generation += 1;
        Some(ReloadTicket {
            generation: self.generation,
        })
    }

    /// Return to `Idle`. Outcome does not matter: a failed reload never
    /// blocks the next one.
    pub fn finish(&mut self, ticket: ReloadTicket) {
        if ticket.generation != self.generation {
            tracing::warn!(
                "Ignoring stale reload ticket {} (current {})",
                ticket.generation,
                self.generation
            );
            return;
        }
        self.state = LoadState::Idle;
        self.completed += 1;
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Whether any reload has run to completion
    pub fn has_loaded(&self) -> bool {
        self.completed > 0
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_rejected() {
        let mut scheduler = ReloadScheduler::new();
        let ticket = scheduler.try_begin().unwrap();
        assert!(scheduler.is_loading());
        assert!(scheduler.try_begin().is_none());

        scheduler.finish(ticket);
        assert_eq!(scheduler.state(), LoadState::Idle);
        assert!(scheduler.has_loaded());
        assert!(scheduler.try_begin().is_some());
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut scheduler = ReloadScheduler::new();
        let first = scheduler.try_begin().unwrap();
        let stale = ReloadTicket {
            generation: first.generation() - 1,
        };
        scheduler.finish(stale);
        assert!(scheduler.is_loading());
        assert_eq!(scheduler.completed(), 0);

        scheduler.finish(first);
        assert_eq!(scheduler.completed(), 1);
    }
}
