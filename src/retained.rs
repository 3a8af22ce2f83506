//! Owning registry for strong subscriptions.
//!
//! Streams only hold weak references to their subscribers. A strong
//! subscription stays alive because this registry holds it, keyed by
//! subscription id, until it is disposed. Streams are `!Send`, so the
//! registry is per thread.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

thread_local! {
    static RETAINED: RefCell<HashMap<u64, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

pub(crate) fn retain(id: u64, subscription: Rc<dyn Any>) {
    let retained = RETAINED.try_with(|retained| {
        retained.borrow_mut().insert(id, subscription);
    });
    if retained.is_err() {
        log::warn!(
            "Thread is shutting down; strong subscription {} is held only by its handle",
            id
        );
    }
}

/// Drops the registry's reference. The value is dropped outside the borrow
/// since its handler may own streams that dispose more subscriptions.
pub(crate) fn release(id: u64) {
    let released = RETAINED
        .try_with(|retained| {
            let mut map = retained.borrow_mut();
            map.remove(&id)
        })
        .ok()
        .flatten();
    drop(released);
}

/// Number of strong subscriptions alive on this thread
pub fn retained_count() -> usize {
    RETAINED
        .try_with(|retained| retained.borrow().len())
        .unwrap_or(0)
}
