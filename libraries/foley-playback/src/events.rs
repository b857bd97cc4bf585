//! Lifecycle events and observer lists
//!
//! Nodes and containers each own an [`EventChannel`]. Listeners are plain
//! closures invoked synchronously on the emitting task; anything long-running
//! must be spawned by the listener itself.

use crate::containers::Container;
use crate::error::PlaybackError;
use foley_core::{EffectId, ElementId, InstanceId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ChannelInner<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<E>)>>,
}

impl<E> ChannelInner<E> {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener<E>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Typed observer list
pub struct EventChannel<E> {
    inner: Arc<ChannelInner<E>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<E: 'static> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: 'static> EventChannel<E> {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; dropping the returned subscription removes it
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));

        let weak: Weak<ChannelInner<E>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Deliver `event` to every listener registered at the time of the call
    pub fn emit(&self, event: &E) {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.inner.listeners().clear();
    }

    /// Registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

/// Listener registration; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Keep the listener for the lifetime of the channel
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// Events emitted by a single playable node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Source decoded or opened; duration when already known
    Loaded {
        /// Length reported by the source, if any
        duration: Option<Duration>,
    },

    /// Voice connected to the graph
    Playing,

    /// Voice left the graph (fires once)
    Stopped,

    /// Load or render failure
    Error(PlaybackError),

    /// Length became known after loading
    DurationChanged(Duration),
}

/// Kind of a container event
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEventKind {
    /// First source is ready
    Loaded,

    /// Playback started (container-wide or for one sequence element)
    Playing,

    /// Playback ended (container-wide or for one sequence element)
    Stopped,

    /// Something failed; a `Stopped` follows when playback cannot continue
    Error(PlaybackError),

    /// Soundtrack handing over from one track to the next
    Crossfade {
        /// Outgoing track
        from: EffectId,
        /// Incoming track
        to: EffectId,
        /// Overlap length
        window: Duration,
    },
}

/// Event emitted by a container
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    /// What happened
    pub kind: ContainerEventKind,

    /// Correlation id supplied with the lifecycle callbacks
    pub correlation_id: String,

    /// Sequence step the event belongs to, `None` for the container itself
    pub element: Option<ElementId>,

    /// Emitting container
    pub container: Container,
}

impl ContainerEvent {
    /// Id of the emitting container
    pub fn instance(&self) -> &InstanceId {
        self.container.id()
    }
}

/// Lifecycle callback receiving the correlation id and the container
pub type LifecycleCallback = Arc<dyn Fn(&str, &Container) + Send + Sync>;

/// Error callback receiving the correlation id, the failure and the container
pub type ErrorCallback = Arc<dyn Fn(&str, &PlaybackError, &Container) + Send + Sync>;

/// Callbacks supplied when a container is built
///
/// Container-wide events carry the caller's correlation id. Sequence step
/// events reach the same callbacks tagged with the step's element id instead.
#[derive(Clone, Default)]
pub struct LifecycleCallbacks {
    correlation_id: String,
    on_loaded: Option<LifecycleCallback>,
    on_playing: Option<LifecycleCallback>,
    on_stopped: Option<LifecycleCallback>,
    on_error: Option<ErrorCallback>,
}

impl LifecycleCallbacks {
    /// Callbacks tagged with `correlation_id`
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Self::default()
        }
    }

    /// Called when the first source is ready
    #[must_use]
    pub fn on_loaded(mut self, f: impl Fn(&str, &Container) + Send + Sync + 'static) -> Self {
        self.on_loaded = Some(Arc::new(f));
        self
    }

    /// Called when playback starts
    #[must_use]
    pub fn on_playing(mut self, f: impl Fn(&str, &Container) + Send + Sync + 'static) -> Self {
        self.on_playing = Some(Arc::new(f));
        self
    }

    /// Called once when playback ends
    #[must_use]
    pub fn on_stopped(mut self, f: impl Fn(&str, &Container) + Send + Sync + 'static) -> Self {
        self.on_stopped = Some(Arc::new(f));
        self
    }

    /// Called on failures
    #[must_use]
    pub fn on_error(
        mut self,
        f: impl Fn(&str, &PlaybackError, &Container) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Correlation id passed with container-wide events
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub(crate) fn dispatch(
        &self,
        kind: &ContainerEventKind,
        element: Option<&ElementId>,
        container: &Container,
    ) {
        let id = element.map_or(self.correlation_id.as_str(), ElementId::as_str);
        match kind {
            ContainerEventKind::Loaded => {
                if let Some(f) = &self.on_loaded {
                    f(id, container);
                }
            }
            ContainerEventKind::Playing => {
                if let Some(f) = &self.on_playing {
                    f(id, container);
                }
            }
            ContainerEventKind::Stopped => {
                if let Some(f) = &self.on_stopped {
                    f(id, container);
                }
            }
            ContainerEventKind::Error(err) => {
                if let Some(f) = &self.on_error {
                    f(id, err, container);
                }
            }
            ContainerEventKind::Crossfade { .. } => {}
        }
    }
}

impl fmt::Debug for LifecycleCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallbacks")
            .field("correlation_id", &self.correlation_id)
            .field("on_loaded", &self.on_loaded.is_some())
            .field("on_playing", &self.on_playing.is_some())
            .field("on_stopped", &self.on_stopped.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dropping_subscription_unsubscribes() {
        let channel = EventChannel::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = channel.subscribe(move |v| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        });

        channel.emit(&2);
        drop(sub);
        channel.emit(&5);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn detached_listener_survives() {
        let channel = EventChannel::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        channel
            .subscribe(move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .detach();

        channel.emit(&());
        channel.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        channel.clear();
        channel.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_may_unsubscribe_during_emit() {
        let channel = EventChannel::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let sub = channel.subscribe(move |()| {
            inner.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        channel.emit(&());
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_channel_is_harmless() {
        let channel = EventChannel::<()>::new();
        let sub = channel.subscribe(|()| {});
        drop(channel);
        drop(sub);
    }
}
