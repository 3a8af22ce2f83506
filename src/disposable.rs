//! Releasable resources owned by streams

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A resource released by an explicit, idempotent `dispose`
pub trait Disposable {
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
}

impl<D: Disposable + ?Sized> Disposable for Rc<D> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

/// Runs a closure the first time it is disposed
pub struct ActionDisposable {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ActionDisposable {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// Drop the action without running it. Counts as disposed afterwards.
    pub fn cancel(&self) {
        let action = self.action.borrow_mut().take();
        drop(action);
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

/// Ordered collection of disposables released together.
///
/// Items are disposed in insertion order. Anything added after the
/// collection itself was disposed is disposed on the spot. Items disposed
/// elsewhere no longer count and are pruned on the next `add`.
#[derive(Default)]
pub struct CompositeDisposable {
    items: RefCell<Vec<Box<dyn Disposable>>>,
    disposed: Cell<bool>,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<D>(&self, item: D)
    where
        D: Disposable + 'static,
    {
        if self.disposed.get() {
            item.dispose();
            return;
        }
        let stale: Vec<Box<dyn Disposable>> = {
            let mut items = self.items.borrow_mut();
            let (live, stale) = std::mem::take(&mut *items)
                .into_iter()
                .partition(|existing| !existing.is_disposed());
            *items = live;
            items.push(Box::new(item));
            stale
        };
        drop(stale);
    }

    /// Number of items not yet disposed
    pub fn len(&self) -> usize {
        self.items
            .borrow()
            .iter()
            .filter(|item| !item.is_disposed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // Items may add to or dispose this collection while releasing.
        let items = std::mem::take(&mut *self.items.borrow_mut());
        for item in items {
            item.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}
