use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::model::{DecorationId, EndOfLine, Range, TextModel};

/// Payload of the per-operation content change notification.
///
/// A batch yields one of these per applied operation, after all of the
/// batch's line events. They come in application order: the operation
/// furthest down the document first. Their version ids count up to the
/// model's version after the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentChangedEvent {
    /// Replaced range, in coordinates before the batch was applied
    pub range: Range,
    /// UTF-16 length of the replaced text (line breaks counted with the model EOL)
    pub range_length: usize,
    /// Replacement text joined with the model EOL
    pub text: String,
    pub eol: EndOfLine,
    pub version_id: u64,
    pub is_undoing: bool,
    pub is_redoing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecorationsChangedEvent {
    pub added: Vec<DecorationId>,
    pub changed: Vec<DecorationId>,
    pub removed: Vec<DecorationId>,
}

impl DecorationsChangedEvent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelEvent {
    LineChanged {
        line_number: usize,
        text: String,
        version_id: u64,
    },
    LinesInserted {
        from_line: usize,
        to_line: usize,
        /// Inserted lines joined with `\n`
        text: String,
        version_id: u64,
    },
    LinesDeleted {
        from_line: usize,
        to_line: usize,
        version_id: u64,
    },
    ContentChanged(ContentChangedEvent),
    DecorationsChanged(DecorationsChangedEvent),
    /// The whole content was replaced (`set_value`, `set_eol`).
    Flushed { version_id: u64 },
}

/// Consolidates decoration changes of one deferred-event scope.
///
/// An id added then removed within the scope is not reported at all; an id
/// added then changed is reported as added only.
#[derive(Debug, Default)]
pub(crate) struct DecorationsChangeAccumulator {
    added: Vec<DecorationId>,
    changed: Vec<DecorationId>,
    removed: Vec<DecorationId>,
    added_set: HashSet<DecorationId>,
    changed_set: HashSet<DecorationId>,
}

impl DecorationsChangeAccumulator {
    pub(crate) fn added(&mut self, id: &DecorationId) {
        if self.added_set.insert(id.clone()) {
            self.added.push(id.clone());
        }
    }

    pub(crate) fn changed(&mut self, id: &DecorationId) {
        if !self.added_set.contains(id) && self.changed_set.insert(id.clone()) {
            self.changed.push(id.clone());
        }
    }

    pub(crate) fn removed(&mut self, id: &DecorationId) {
        if self.added_set.remove(id) {
            self.added.retain(|added| added != id);
            return;
        }
        if self.changed_set.remove(id) {
            self.changed.retain(|changed| changed != id);
        }
        self.removed.push(id.clone());
    }

    fn take(&mut self) -> DecorationsChangedEvent {
        self.added_set.clear();
        self.changed_set.clear();
        DecorationsChangedEvent {
            added: std::mem::take(&mut self.added),
            changed: std::mem::take(&mut self.changed),
            removed: std::mem::take(&mut self.removed),
        }
    }
}

/// Events buffered while a mutation is in progress.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    depth: usize,
    pending: Vec<ModelEvent>,
    pub(crate) decorations: DecorationsChangeAccumulator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A change listener. It may mutate the model; those changes are delivered
/// after the event currently being dispatched and its batch.
pub type Listener = Box<dyn FnMut(&mut TextModel, &ModelEvent)>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
    /// Removals requested while `entries` is lent out for delivery
    removed_while_delivering: Vec<ListenerId>,
    delivering: bool,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl TextModel {
    /// Subscribe to change notifications. Listeners run synchronously when
    /// the outermost mutation scope ends.
    pub fn on_did_change(
        &mut self,
        listener: impl FnMut(&mut TextModel, &ModelEvent) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.listeners.next_id);
        self.listeners.next_id += 1;
        self.listeners.entries.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.entries.len();
        self.listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        if self.listeners.entries.len() != before {
            return true;
        }
        if self.listeners.delivering && id.0 < self.listeners.next_id {
            self.listeners.removed_while_delivering.push(id);
            return true;
        }
        false
    }

    /// Run `f` with event delivery deferred.
    ///
    /// Scopes nest; only the outermost one delivers the queued events,
    /// followed by a single consolidated `DecorationsChanged` event.
    pub fn with_deferred_events<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.events.depth += 1;
        let result = f(self);
        self.events.depth -= 1;
        if self.events.depth == 0 {
            self.flush_events();
        }
        result
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        self.events.pending.push(event);
        if self.events.depth == 0 {
            self.flush_events();
        }
    }

    /// Deliver queued events until listeners stop producing new ones.
    ///
    /// Listeners run inside an open deferral scope, so whatever they change
    /// is queued and delivered as the next round, after the current one.
    fn flush_events(&mut self) {
        if self.listeners.delivering {
            return;
        }
        loop {
            let mut events = std::mem::take(&mut self.events.pending);
            let decorations = self.events.decorations.take();
            if !decorations.is_empty() {
                events.push(ModelEvent::DecorationsChanged(decorations));
            }
            if events.is_empty() {
                return;
            }
            log::trace!(
                "delivering {} events to {} listeners",
                events.len(),
                self.listeners.entries.len()
            );

            let mut entries = std::mem::take(&mut self.listeners.entries);
            self.listeners.delivering = true;
            self.events.depth += 1;
            for event in &events {
                for (id, listener) in entries.iter_mut() {
                    if !self.listeners.removed_while_delivering.contains(id) {
                        listener(self, event);
                    }
                }
            }
            self.events.depth -= 1;
            self.listeners.delivering = false;

            // listeners registered during delivery were pushed to the empty list
            entries.append(&mut self.listeners.entries);
            let removed = std::mem::take(&mut self.listeners.removed_while_delivering);
            entries.retain(|(id, _)| !removed.contains(id));
            self.listeners.entries = entries;
        }
    }
}
