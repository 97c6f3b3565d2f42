//! Seekable cursor over a finished match log.

use crate::events::reducer::Reducer;
use crate::events::MatchEvent;

/// Cursor that rebuilds state by folding `[0..=k]` from empty on every move,
/// so arbitrary scrubbing can never drift from a straight replay.
pub struct Playback<R: Reducer> {
    reducer: R,
    events: Vec<MatchEvent>,
    cursor: Option<usize>,
    state: Option<R::State>,
}

impl<R: Reducer> Playback<R> {
    pub fn new(reducer: R, events: Vec<MatchEvent>) -> Self {
        Self {
            reducer,
            events,
            cursor: None,
            state: None,
        }
    }

    /// Index of the last applied event, `None` before the first.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn state(&self) -> Option<&R::State> {
        self.state.as_ref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn current_event(&self) -> Option<&MatchEvent> {
        self.cursor.and_then(|i| self.events.get(i))
    }

    /// Jump to index `k`, clamped to the last event.
    pub fn seek(&mut self, k: usize) -> Option<&R::State> {
        if self.events.is_empty() {
            return self.restart();
        }
        let k = k.min(self.events.len() - 1);
        self.state = self.reducer.fold(&self.events[..=k]);
        self.cursor = Some(k);
        self.state.as_ref()
    }

    pub fn step_forward(&mut self) -> Option<&R::State> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.seek(next)
    }

    pub fn step_back(&mut self) -> Option<&R::State> {
        match self.cursor {
            None | Some(0) => self.restart(),
            Some(c) => self.seek(c - 1),
        }
    }

    /// Back to before the first event.
    pub fn restart(&mut self) -> Option<&R::State> {
        self.cursor = None;
        self.state = None;
        None
    }

    pub fn is_finished(&self) -> bool {
        !self.events.is_empty() && self.cursor == Some(self.events.len() - 1)
    }
}
