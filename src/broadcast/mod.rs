//! Broadcast - a one-to-many distributor over a source channel
//!
//! Every value received from the source is forwarded to every current
//! subscriber, suspending until each accepts. A slow subscriber therefore
//! back-pressures the whole broadcast; subscribers that cannot tolerate that
//! register a sliding or buffered channel instead.
//!
//! Subscribing is atomic relative to pump iterations: a subscriber registered
//! after a value has been dequeued may miss it but sees every subsequent
//! value. When the source ends, subscribers registered with close-on-end are
//! closed and the rest are released untouched.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::Chan;

/// Registration handle returned by subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// One-to-many distribution over a source channel
pub trait Subscribable<T> {
    /// Register a subscriber channel
    ///
    /// With `close_on_end` the channel is closed when the source ends;
    /// otherwise it is unsubscribed and left open.
    fn subscribe(&self, chan: Chan<T>, close_on_end: bool) -> Subscription;

    /// Remove a subscriber; its channel is left open
    fn unsubscribe(&self, sub: Subscription);
}

struct SubEntry<T> {
    id: u64,
    chan: Chan<T>,
    close_on_end: bool,
}

struct Registry<T> {
    next_id: u64,
    subs: Vec<SubEntry<T>>,
}

/// A broadcast over a source channel, pumped by a dedicated task
///
/// Cloning produces another handle to the same broadcast.
pub struct Broadcast<T> {
    source: Chan<T>,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Broadcast {
            source: self.source.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    /// Create a broadcast over the given source and start its pump task
    pub fn new(source: Chan<T>) -> Self {
        let registry = Arc::new(Mutex::new(Registry {
            next_id: 0,
            subs: Vec::new(),
        }));
        tokio::spawn(pump(source.clone(), registry.clone()));
        Self { source, registry }
    }

    /// Register a subscriber channel
    pub fn subscribe(&self, chan: Chan<T>, close_on_end: bool) -> Subscription {
        let mut reg = self.registry.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.subs.push(SubEntry {
            id,
            chan,
            close_on_end,
        });
        Subscription(id)
    }

    /// Remove a subscriber; its channel is left open
    pub fn unsubscribe(&self, sub: Subscription) {
        self.registry.lock().subs.retain(|e| e.id != sub.0);
    }

    /// Number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subs.len()
    }

    /// The source channel feeding this broadcast
    pub fn source(&self) -> &Chan<T> {
        &self.source
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> for Broadcast<T> {
    fn subscribe(&self, chan: Chan<T>, close_on_end: bool) -> Subscription {
        Broadcast::subscribe(self, chan, close_on_end)
    }

    fn unsubscribe(&self, sub: Subscription) {
        Broadcast::unsubscribe(self, sub)
    }
}

impl<T> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcast")
            .field("subscribers", &self.registry.lock().subs.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Forward one source value at a time to a consistent snapshot of subscribers
async fn pump<T: Clone + Send + 'static>(source: Chan<T>, registry: Arc<Mutex<Registry<T>>>) {
    while let Some(value) = source.recv().await {
        let targets: Vec<(u64, Chan<T>)> = registry
            .lock()
            .subs
            .iter()
            .map(|e| (e.id, e.chan.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, chan) in targets {
            if !chan.send(value.clone()).await {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            registry.lock().subs.retain(|e| !dead.contains(&e.id));
        }
    }

    tracing::trace!("broadcast source ended");
    let mut reg = registry.lock();
    for entry in reg.subs.drain(..) {
        if entry.close_on_end {
            entry.chan.close();
        }
    }
}
