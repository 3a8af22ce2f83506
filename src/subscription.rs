//! Subscription handles.
//!
//! A subscription is one observer registered on one stream. Streams keep
//! only weak references to their subscribers; what keeps a subscription
//! alive depends on its [`Ownership`]:
//!
//! - `Strong`: the thread's retained registry owns it until it is disposed,
//!   so dropping the returned handle does not stop delivery. Strong
//!   subscriptions are counted in the stream's leak registry.
//! - `Weak`: the returned handle (and its clones) is the only owner. Once the
//!   last handle is dropped the stream skips it and prunes the slot.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::disposable::Disposable;
use crate::leak_registry::Allocation;
use crate::retained;
use crate::stream::StreamInner;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Handler<T> = Rc<dyn Fn(&T)>;

/// Who keeps a subscription alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Strong,
    Weak,
}

/// Weak identity of the object a subscription was registered for
pub struct SubscriptionTarget {
    addr: *const (),
    alive: Weak<dyn Any>,
}

impl SubscriptionTarget {
    pub fn of<O: Any>(target: &Rc<O>) -> Self {
        let erased: Rc<dyn Any> = target.clone();
        Self {
            addr: Rc::as_ptr(target) as *const (),
            alive: Rc::downgrade(&erased),
        }
    }

    /// True while the target is alive and is `target`
    pub fn matches<O: Any>(&self, target: &Rc<O>) -> bool {
        self.is_alive() && self.addr == Rc::as_ptr(target) as *const ()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

impl fmt::Debug for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTarget")
            .field("addr", &self.addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}

pub(crate) struct SubscriptionInner<T: 'static> {
    id: u64,
    ownership: Ownership,
    target: Option<SubscriptionTarget>,
    parent: Weak<StreamInner<T>>,
    handler: RefCell<Option<Handler<T>>>,
    disposed: Cell<bool>,
    allocation: RefCell<Option<Allocation>>,
}

impl<T: 'static> SubscriptionInner<T> {
    pub(crate) fn new(
        ownership: Ownership,
        target: Option<SubscriptionTarget>,
        parent: Weak<StreamInner<T>>,
        handler: Handler<T>,
        allocation: Option<Allocation>,
    ) -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            ownership,
            target,
            parent,
            handler: RefCell::new(Some(handler)),
            disposed: Cell::new(false),
            allocation: RefCell::new(allocation),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn handler(&self) -> Option<Handler<T>> {
        if self.disposed.get() {
            return None;
        }
        self.handler.borrow().clone()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn is_owned_by<O: Any>(&self, target: &Rc<O>) -> bool {
        self.target.as_ref().is_some_and(|t| t.matches(target))
    }

    pub(crate) fn belongs_to(&self, stream: &Rc<StreamInner<T>>) -> bool {
        std::ptr::eq(self.parent.as_ptr(), Rc::as_ptr(stream))
    }

    /// Marks the subscription disposed and releases everything it holds
    /// except its slot in the parent list. Returns false when it was
    /// already disposed.
    ///
    /// Callers must hold an `Rc` to `self`: releasing a strong subscription
    /// drops the retained registry's reference.
    pub(crate) fn release(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        let handler = self.handler.borrow_mut().take();
        let allocation = self.allocation.borrow_mut().take();
        if self.ownership == Ownership::Strong {
            retained::release(self.id);
        }
        if let Some(allocation) = allocation {
            allocation.release();
        }
        log::debug!("Released {:?} subscription {}", self.ownership, self.id);
        drop(handler);
        true
    }

    /// Full disposal: release, then leave the parent's subscriber list
    pub(crate) fn dispose(&self) {
        if !self.release() {
            return;
        }
        if let Some(parent) = self.parent.upgrade() {
            parent.remove_subscriber(self.id);
        }
    }
}

/// Handle to one registration on a stream.
///
/// Clones refer to the same registration. Dropping a handle never disposes
/// the registration; call [`Subscription::dispose`] or dispose the stream.
pub struct Subscription<T: 'static> {
    inner: Rc<SubscriptionInner<T>>,
}

impl<T: 'static> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Subscription {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Subscription<T> {
    pub(crate) fn from_inner(inner: Rc<SubscriptionInner<T>>) -> Self {
        Subscription { inner }
    }

    /// A subscription that was never registered, as returned when
    /// subscribing to a disposed stream
    pub(crate) fn detached(ownership: Ownership, target: Option<SubscriptionTarget>) -> Self {
        let inner = SubscriptionInner::new(ownership, target, Weak::new(), Rc::new(|_: &T| {}), None);
        inner.disposed.set(true);
        inner.handler.borrow_mut().take();
        Subscription {
            inner: Rc::new(inner),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<SubscriptionInner<T>> {
        &self.inner
    }

    /// Process-unique id of this registration
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    pub fn is_strong(&self) -> bool {
        self.inner.ownership == Ownership::Strong
    }

    /// Whether this subscription was registered for `target`
    pub fn is_owned_by<O: Any>(&self, target: &Rc<O>) -> bool {
        self.inner.is_owned_by(target)
    }

    /// Remove this registration from its stream. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<T: 'static> Disposable for Subscription<T> {
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<T: 'static> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("ownership", &self.inner.ownership)
            .field("target", &self.inner.target)
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}
