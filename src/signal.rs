//! Signal bus: declared, named notifications between widgets.
//!
//! A widget declares its signals by name; anything may then subscribe a
//! callback to the (widget, name) pair. Emission is synchronous message
//! passing on the calling thread: the subscription list is snapshotted
//! first, so subscribing or unsubscribing from inside a callback never
//! affects the emission pass already in flight.
//!
//! Subscriptions die with either endpoint: destroying the source widget or
//! the subscribing widget removes them, so no callback can fire against
//! freed state.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::session::Ui;
use crate::tree::WidgetId;
use crate::types::{Point, Size};

/// Value carried by an emission.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Text(String),
    Point(Point),
    Size(Size),
}

/// Handle returned by subscribe, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked on emission. Receives the session so it can mutate the
/// tree, and the payload by reference.
pub type SignalCallback = Rc<dyn Fn(&mut Ui, &Payload)>;

struct Subscription {
    id: SubscriptionId,
    source: WidgetId,
    name: String,
    /// The widget this subscription belongs to, when it belongs to one;
    /// `None` for plain application-code subscriptions.
    listener: Option<WidgetId>,
    callback: SignalCallback,
}

/// Registry of declared signals and live subscriptions for one session.
#[derive(Default)]
pub(crate) struct SignalRegistry {
    declared: HashMap<WidgetId, HashSet<String>>,
    subs: Vec<Subscription>,
    next_id: u64,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named signal on a widget. Idempotent.
    pub fn declare(&mut self, source: WidgetId, name: &str) {
        self.declared
            .entry(source)
            .or_default()
            .insert(name.to_string());
    }

    pub fn is_declared(&self, source: WidgetId, name: &str) -> bool {
        self.declared
            .get(&source)
            .map_or(false, |names| names.contains(name))
    }

    /// Subscribe a callback; fails fast on an undeclared signal.
    pub fn subscribe(
        &mut self,
        source: WidgetId,
        name: &str,
        listener: Option<WidgetId>,
        callback: SignalCallback,
    ) -> Result<SubscriptionId> {
        if !self.is_declared(source, name) {
            return Err(Error::UndeclaredSignal {
                id: source,
                name: name.to_string(),
            });
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subs.push(Subscription {
            id,
            source,
            name: name.to_string(),
            listener,
            callback,
        });
        Ok(id)
    }

    /// Remove one subscription; returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subs.len();
        self.subs.retain(|s| s.id != id);
        self.subs.len() != before
    }

    /// Snapshot the callbacks for (source, name), in subscription order.
    pub fn snapshot(&self, source: WidgetId, name: &str) -> Vec<SignalCallback> {
        self.subs
            .iter()
            .filter(|s| s.source == source && s.name == name)
            .map(|s| Rc::clone(&s.callback))
            .collect()
    }

    /// Drop declarations and subscriptions touching a destroyed widget,
    /// whichever end of them it was.
    pub fn remove_widget(&mut self, id: WidgetId) {
        self.declared.remove(&id);
        self.subs
            .retain(|s| s.source != id && s.listener != Some(id));
    }

    #[cfg(test)]
    pub fn subscription_count(&self) -> usize {
        self.subs.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
