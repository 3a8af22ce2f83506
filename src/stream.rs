//! Last-value streams.
//!
//! A [`Stream`] remembers the most recent value pushed into it and delivers
//! every new value synchronously to its subscribers, in the order they
//! subscribed. Delivery works on a snapshot of the subscriber list taken when
//! `trigger` starts, so handlers may subscribe, unsubscribe or dispose
//! reentrantly; those changes apply from the next `trigger` on.
//!
//! Streams are single-threaded. A `Stream` is a cheap handle: clones share
//! the same stream, and the stream disposes itself when the last handle is
//! dropped.
//!
//! ```
//! use rs2_signal::Stream;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let prices = Stream::new();
//! let sink = seen.clone();
//! let sub = prices.subscribe(move |p: &u32| sink.borrow_mut().push(*p));
//!
//! prices.trigger(10).trigger(12);
//! assert_eq!(*seen.borrow(), vec![10, 12]);
//!
//! sub.dispose();
//! prices.dispose();
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::{Rc, Weak};

use crate::disposable::{ActionDisposable, CompositeDisposable, Disposable};
use crate::leak_registry::{Allocation, LeakRegistry, TrackingKey};
use crate::retained;
use crate::stream_configuration::{StreamConfig, SubscribeOptions};
use crate::subscription::{Handler, Ownership, Subscription, SubscriptionInner, SubscriptionTarget};

struct StreamState<T: 'static> {
    last: Option<T>,
    subscribers: Vec<Weak<SubscriptionInner<T>>>,
    disposed: bool,
}

pub(crate) struct StreamInner<T: 'static> {
    config: StreamConfig,
    registry: LeakRegistry,
    state: RefCell<StreamState<T>>,
    owned: CompositeDisposable,
    allocation: RefCell<Option<Allocation>>,
}

impl<T: 'static> StreamInner<T> {
    fn label(&self) -> &str {
        self.config.label.as_deref().unwrap_or("<unnamed>")
    }

    pub(crate) fn remove_subscriber(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        state
            .subscribers
            .retain(|s| s.upgrade().is_some_and(|s| s.id() != id));
    }

    fn dispose(&self) {
        let (subscribers, last) = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (std::mem::take(&mut state.subscribers), state.last.take())
        };

        let detached = subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.release())
            .count();
        self.owned.dispose();

        let allocation = self.allocation.borrow_mut().take();
        if let Some(allocation) = allocation {
            allocation.release();
        }

        log::debug!(
            "Disposed stream {} ({} subscriber(s) detached)",
            self.label(),
            detached
        );
        drop(last);
    }
}

impl<T: 'static> Drop for StreamInner<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A single-value reactive stream
pub struct Stream<T: 'static> {
    inner: Rc<StreamInner<T>>,
}

impl<T: 'static> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a stream
pub struct WeakStream<T: 'static> {
    inner: Weak<StreamInner<T>>,
}

impl<T: 'static> Clone for WeakStream<T> {
    fn clone(&self) -> Self {
        WeakStream {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: 'static> WeakStream<T> {
    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.inner.upgrade().map(|inner| Stream { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Stream with default configuration
    #[track_caller]
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    #[track_caller]
    pub fn with_config(config: StreamConfig) -> Self {
        let registry = config.resolve_registry();
        let allocation = if config.track_leaks {
            Allocation::record(registry.clone(), TrackingKey::here("stream"))
        } else {
            None
        };
        Stream {
            inner: Rc::new(StreamInner {
                config,
                registry,
                state: RefCell::new(StreamState {
                    last: None,
                    subscribers: Vec::new(),
                    disposed: false,
                }),
                owned: CompositeDisposable::new(),
                allocation: RefCell::new(allocation),
            }),
        }
    }

    /// Stream already holding `value`
    #[track_caller]
    pub fn with_value(value: T) -> Self {
        let stream = Self::with_config(StreamConfig::default());
        stream.trigger(value);
        stream
    }

    /// Empty stream sharing this stream's registry and tracking, used by
    /// operators for the streams they derive
    #[track_caller]
    pub(crate) fn derive<U: Clone + 'static>(&self) -> Stream<U> {
        let mut config = self.inner.config.derived();
        config.registry = Some(self.inner.registry.clone());
        Stream::with_config(config)
    }

    /// Subscribe with default options: strong, no replay
    #[track_caller]
    pub fn subscribe<F>(&self, handler: F) -> Subscription<T>
    where
        F: Fn(&T) + 'static,
    {
        self.register(None, SubscribeOptions::default(), Rc::new(handler), Location::caller())
    }

    #[track_caller]
    pub fn subscribe_with<F>(&self, options: SubscribeOptions, handler: F) -> Subscription<T>
    where
        F: Fn(&T) + 'static,
    {
        self.register(None, options, Rc::new(handler), Location::caller())
    }

    /// Subscribe on behalf of `target` so that `unsubscribe_target` can
    /// remove all of its subscriptions at once. The target is held weakly.
    #[deprecated(note = "keep the returned Subscription and dispose it instead")]
    #[track_caller]
    pub fn subscribe_target<O, F>(
        &self,
        target: &Rc<O>,
        options: SubscribeOptions,
        handler: F,
    ) -> Subscription<T>
    where
        O: Any,
        F: Fn(&T) + 'static,
    {
        self.register(
            Some(SubscriptionTarget::of(target)),
            options,
            Rc::new(handler),
            Location::caller(),
        )
    }

    fn register(
        &self,
        target: Option<SubscriptionTarget>,
        options: SubscribeOptions,
        handler: Handler<T>,
        location: &'static Location<'static>,
    ) -> Subscription<T> {
        let ownership = if options.strong {
            Ownership::Strong
        } else {
            Ownership::Weak
        };

        if self.is_disposed() {
            log::warn!(
                "Subscribing to disposed stream {} at {}; nothing will be delivered",
                self.inner.label(),
                location
            );
            return Subscription::detached(ownership, target);
        }

        let allocation = if options.strong && self.inner.config.track_leaks {
            Allocation::record(
                self.inner.registry.clone(),
                TrackingKey::from_location("subscription", location),
            )
        } else {
            None
        };

        let subscription = Rc::new(SubscriptionInner::new(
            ownership,
            target,
            Rc::downgrade(&self.inner),
            Rc::clone(&handler),
            allocation,
        ));
        {
            let mut state = self.inner.state.borrow_mut();
            state.subscribers.retain(|s| s.strong_count() > 0);
            state.subscribers.push(Rc::downgrade(&subscription));
        }
        if ownership == Ownership::Strong {
            retained::retain(subscription.id(), subscription.clone());
        }

        if options.replay {
            let cached = self.inner.state.borrow().last.clone();
            if let Some(value) = cached {
                handler(&value);
            }
        }

        Subscription::from_inner(subscription)
    }

    /// Remove and dispose every subscription registered for `target`.
    /// Unknown targets are ignored.
    pub fn unsubscribe_target<O: Any>(&self, target: &Rc<O>) {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let mut removed = Vec::new();
            state.subscribers.retain(|s| match s.upgrade() {
                None => false,
                Some(s) if s.is_owned_by(target) => {
                    removed.push(s);
                    false
                }
                Some(_) => true,
            });
            removed
        };
        for subscription in removed {
            subscription.release();
        }
    }

    /// Dispose one subscription of this stream. Subscriptions belonging to
    /// other streams are left alone.
    pub fn unsubscribe(&self, subscription: &Subscription<T>) {
        if subscription.inner().belongs_to(&self.inner) {
            subscription.dispose();
        }
    }

    /// Call `callback` with the cached value, if there is one
    pub fn last<F>(&self, callback: F)
    where
        F: FnOnce(&T),
    {
        let cached = self.inner.state.borrow().last.clone();
        if let Some(value) = cached {
            callback(&value);
        }
    }

    /// Copy of the cached value
    pub fn value(&self) -> Option<T> {
        self.inner.state.borrow().last.clone()
    }

    pub fn has_value(&self) -> bool {
        self.inner.state.borrow().last.is_some()
    }

    /// Cache `value` (when memory is enabled) and deliver it to every live
    /// subscriber in subscription order.
    pub fn trigger(&self, value: T) -> &Self {
        let (handlers, previous): (Vec<Handler<T>>, Option<T>) = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                log::trace!("Ignoring trigger on disposed stream {}", self.inner.label());
                return self;
            }
            let previous = if self.inner.config.memory {
                state.last.replace(value.clone())
            } else {
                None
            };
            state.subscribers.retain(|s| s.strong_count() > 0);
            let handlers = state
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .filter_map(|s| s.handler())
                .collect();
            (handlers, previous)
        };
        // The replaced value may own streams that unsubscribe from this one
        drop(previous);

        log::trace!(
            "Stream {} delivering to {} subscriber(s)",
            self.inner.label(),
            handlers.len()
        );
        for handler in handlers {
            handler(&value);
        }
        self
    }
}

impl<T: 'static> Stream<T> {
    /// Detach every subscriber, release owned resources and clear the cached
    /// value. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Hand a resource to this stream; it is disposed with the stream, or at
    /// once if the stream is already disposed
    pub fn add_disposable<D>(&self, disposable: D)
    where
        D: Disposable + 'static,
    {
        self.inner.owned.add(disposable);
    }

    /// Run `action` when this stream is disposed
    pub fn on_dispose<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.add_disposable(ActionDisposable::new(action));
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .state
            .borrow()
            .subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| !s.is_disposed())
            .count()
    }

    /// Number of resources this stream will release on disposal
    pub fn owned_count(&self) -> usize {
        self.inner.owned.len()
    }

    pub fn memory_enabled(&self) -> bool {
        self.inner.config.memory
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.config.label.as_deref()
    }

    /// Registry this stream and its strong subscriptions count in
    pub fn leak_registry(&self) -> &LeakRegistry {
        &self.inner.registry
    }

    pub fn downgrade(&self) -> WeakStream<T> {
        WeakStream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same stream
    pub fn ptr_eq(&self, other: &Stream<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Disposable for Stream<T> {
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Stream")
            .field("label", &self.inner.config.label)
            .field("last", &state.last)
            .field("subscribers", &state.subscribers.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
