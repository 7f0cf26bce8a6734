//! Subscription tables and the field-diff merge applied to update lines.
//!
//! A [`Subscription`] owns the last known values of each of its items. Every
//! update payload is decoded against those values, merged, recorded in the
//! event history, and handed to the registered listeners in order.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::stream::proto::{decode_field, split_payload, DecodeError, SubscriptionMode};

/// Current values of one item, keyed by field name. `None` is an explicitly
/// absent value.
pub type ItemValues = BTreeMap<String, Option<String>>;

/// Callback invoked for every decoded update.
pub type Listener = Arc<dyn Fn(&UpdateEvent) + Send + Sync + 'static>;

/// Snapshot of an item after one update line was merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// 1-based item position within the subscription.
    pub position: usize,
    /// Item name resolved from the position.
    pub name: String,
    /// Full merged state of the item, not only the fields in the diff.
    pub values: ItemValues,
}

impl UpdateEvent {
    /// Returns the value of `field`, flattening "absent" and "unknown".
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|value| value.as_deref())
    }
}

#[derive(Debug, Default)]
struct SubscriptionState {
    items: HashMap<usize, ItemValues>,
    history: Vec<UpdateEvent>,
}

/// A table of items and fields registered for push updates.
pub struct Subscription {
    mode: SubscriptionMode,
    item_names: Vec<String>,
    field_names: Vec<String>,
    adapter: Option<String>,
    snapshot: Option<bool>,
    state: Mutex<SubscriptionState>,
    listeners: RwLock<Vec<Listener>>,
}

impl Subscription {
    pub fn new<I, F>(mode: SubscriptionMode, items: I, fields: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            mode,
            item_names: items.into_iter().map(Into::into).collect(),
            field_names: fields.into_iter().map(Into::into).collect(),
            adapter: None,
            snapshot: None,
            state: Mutex::new(SubscriptionState::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Routes the table to a specific data adapter.
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Requests (or declines) the initial snapshot explicitly.
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    pub fn item_names(&self) -> &[String] {
        &self.item_names
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }

    pub fn snapshot(&self) -> Option<bool> {
        self.snapshot
    }

    /// Appends a listener. Listeners are never de-duplicated.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Decodes an update payload (`<position>|<field>|...`), merges it into
    /// the item's stored values and notifies every listener.
    ///
    /// Tokens beyond the schema are ignored and fields missing from the
    /// payload keep their stored value. Listeners run on the calling task and
    /// outside the state lock; a panicking listener is logged and skipped.
    pub fn notify_update(&self, payload: &str) -> Result<UpdateEvent, DecodeError> {
        let (position, tokens) = split_payload(payload)?;
        let name = position
            .checked_sub(1)
            .and_then(|index| self.item_names.get(index))
            .ok_or(DecodeError::ItemPositionOutOfRange {
                position,
                items: self.item_names.len(),
            })?
            .clone();

        let event = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let values = state.items.entry(position).or_default();
            for (field, token) in self.field_names.iter().zip(tokens) {
                let last = values.get(field).and_then(|value| value.as_deref());
                let decoded = decode_field(token, last);
                values.insert(field.clone(), decoded);
            }

            let event = UpdateEvent {
                position,
                name,
                values: values.clone(),
            };
            state.history.push(event.clone());
            event
        };

        self.dispatch(&event);
        Ok(event)
    }

    fn dispatch(&self, event: &UpdateEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (**listener)(event)));
            if outcome.is_err() {
                error!(
                    event = "listener_panicked",
                    listener = index,
                    item = %event.name,
                    position = event.position
                );
            }
        }
        debug!(
            event = "update_dispatched",
            item = %event.name,
            listeners = listeners.len()
        );
    }

    /// Current merged values for the item at `position`.
    pub fn item_values(&self, position: usize) -> Option<ItemValues> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .get(&position)
            .cloned()
    }

    /// All events produced so far, oldest first. The history is unbounded.
    pub fn history(&self) -> Vec<UpdateEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }

    pub fn first_event(&self) -> Option<UpdateEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .first()
            .cloned()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("mode", &self.mode)
            .field("item_names", &self.item_names)
            .field("field_names", &self.field_names)
            .field("adapter", &self.adapter)
            .field("snapshot", &self.snapshot)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
