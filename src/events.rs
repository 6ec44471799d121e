//! Synchronous publish/subscribe

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    hash::Hash,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use log::{error, warn};

type Listener<A> = Rc<RefCell<dyn FnMut(&A)>>;

/// Fans events out to listeners, in the order they subscribed
///
/// Publishing is synchronous and happens on the caller's thread. A listener
/// that panics is logged and skipped, and the remaining listeners still run.
/// Listeners may subscribe or [`clear`](Self::clear) while an event is being
/// published; after a clear, nobody else hears the event in flight.
pub struct EventNotifier<K, A> {
    listeners: RefCell<HashMap<K, Vec<Listener<A>>>>,
    generation: Cell<u64>,
}

impl<K, A> EventNotifier<K, A>
where
    K: Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            generation: Cell::new(0),
        }
    }

    /// Register a listener for one kind of event
    pub fn subscribe<F>(&self, kind: K, listener: F)
    where
        F: FnMut(&A) + 'static,
    {
        let listener: Listener<A> = Rc::new(RefCell::new(listener));

        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(listener);
    }

    /// Call every listener registered for `kind` with `args`
    pub fn publish(&self, kind: &K, args: &A) {
        let generation = self.generation.get();
        let snapshot: Vec<Listener<A>> = self
            .listeners
            .borrow()
            .get(kind)
            .cloned()
            .unwrap_or_default();

        for listener in snapshot {
            if self.generation.get() != generation {
                break;
            }

            let Ok(mut callback) = listener.try_borrow_mut() else {
                warn!("Skipping {:?} listener that is already handling this event", kind);
                continue;
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| (*callback)(args)));

            if let Err(payload) = result {
                error!("{:?} listener panicked: {}", kind, panic_message(&*payload));
            }
        }
    }

    /// The number of listeners registered for `kind`
    pub fn count_subscribers(&self, kind: &K) -> usize {
        self.listeners.borrow().get(kind).map_or(0, Vec::len)
    }

    /// Remove every listener of every kind
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
        self.generation.set(self.generation.get() + 1);
    }
}

impl<K, A> Default for EventNotifier<K, A>
where
    K: Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> fmt::Debug for EventNotifier<K, A>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.borrow();
        let counts: Vec<(&K, usize)> = listeners
            .iter()
            .map(|(kind, listeners)| (kind, listeners.len()))
            .collect();

        f.debug_struct("EventNotifier").field("listeners", &counts).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
