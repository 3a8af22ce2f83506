//! Derived streams.
//!
//! Every operator returns a new stream that owns exactly one weak, replaying
//! subscription on its source. The subscription's handler only holds a
//! [`WeakStream`](crate::stream::WeakStream) to the derived stream, so a
//! source never keeps its children alive: the caller does. Dropping or
//! disposing a child detaches it from the source.

use std::cell::{Cell, RefCell};

use crate::stream::Stream;
use crate::stream_configuration::SubscribeOptions;

fn upstream() -> SubscribeOptions {
    SubscribeOptions::weak().replay(true)
}

impl<T: Clone + 'static> Stream<T> {
    /// Stream of `f` applied to every value of this stream, starting with the
    /// current one
    #[track_caller]
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(&T) -> U + 'static,
    {
        let child = self.derive::<U>();
        let target = child.downgrade();
        let subscription = self.subscribe_with(upstream(), move |value| {
            if let Some(child) = target.upgrade() {
                child.trigger(f(value));
            }
        });
        child.add_disposable(subscription);
        child
    }

    /// Stream of the values satisfying `predicate`
    #[track_caller]
    pub fn filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        let child = self.derive::<T>();
        let target = child.downgrade();
        let subscription = self.subscribe_with(upstream(), move |value| {
            if !predicate(value) {
                return;
            }
            if let Some(child) = target.upgrade() {
                child.trigger(value.clone());
            }
        });
        child.add_disposable(subscription);
        child
    }

    /// Stream that suppresses consecutive values with equal keys.
    ///
    /// Each key is compared with the key of the last value this stream
    /// emitted, so the first value always passes.
    #[track_caller]
    pub fn distinct<K, F>(&self, key_fn: F) -> Stream<T>
    where
        K: PartialEq + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let child = self.derive::<T>();
        let target = child.downgrade();
        let emitted: RefCell<Option<K>> = RefCell::new(None);
        let subscription = self.subscribe_with(upstream(), move |value| {
            let Some(child) = target.upgrade() else {
                return;
            };
            let key = key_fn(value);
            if emitted.borrow().as_ref() == Some(&key) {
                return;
            }
            emitted.replace(Some(key));
            child.trigger(value.clone());
        });
        child.add_disposable(subscription);
        child
    }

    /// Running accumulation: each value replaces the accumulator with
    /// `f(accumulator, value)` and emits it
    #[track_caller]
    pub fn fold<U, F>(&self, initial: U, f: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(U, &T) -> U + 'static,
    {
        let child = self.derive::<U>();
        let target = child.downgrade();
        let accumulator = RefCell::new(initial);
        let subscription = self.subscribe_with(upstream(), move |value| {
            let Some(child) = target.upgrade() else {
                return;
            };
            let current = accumulator.borrow().clone();
            let next = f(current, value);
            accumulator.replace(next.clone());
            child.trigger(next);
        });
        child.add_disposable(subscription);
        child
    }

    /// The first `n` values, current one included. After the `n`th value
    /// the stream disposes itself; `take(0)` is disposed from the start.
    #[track_caller]
    pub fn take(&self, n: usize) -> Stream<T> {
        let child = self.derive::<T>();
        if n == 0 {
            child.dispose();
            return child;
        }
        let target = child.downgrade();
        let seen = Cell::new(0usize);
        let subscription = self.subscribe_with(upstream(), move |value| {
            let Some(child) = target.upgrade() else {
                return;
            };
            let count = seen.get() + 1;
            seen.set(count);
            if count <= n {
                child.trigger(value.clone());
            }
            if count >= n {
                child.dispose();
            }
        });
        child.add_disposable(subscription);
        child
    }

    /// Every value after the first `n`
    #[track_caller]
    pub fn skip(&self, n: usize) -> Stream<T> {
        let child = self.derive::<T>();
        let target = child.downgrade();
        let seen = Cell::new(0usize);
        let subscription = self.subscribe_with(upstream(), move |value| {
            let count = seen.get() + 1;
            seen.set(count);
            if count <= n {
                return;
            }
            if let Some(child) = target.upgrade() {
                child.trigger(value.clone());
            }
        });
        child.add_disposable(subscription);
        child
    }
}

impl<T: Clone + PartialEq + 'static> Stream<T> {
    /// `distinct` keyed on the values themselves
    #[track_caller]
    pub fn distinct_values(&self) -> Stream<T> {
        self.distinct(T::clone)
    }
}
