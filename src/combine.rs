//! Join-on-latest synchronization of several streams.
//!
//! Whenever any parent fires, the combined stream reads the cached value of
//! every parent and, if all of them have one, emits the full tuple. Parents
//! that have not fired recently contribute their last value again.
//!
//! The combined stream stays alive while at least one parent is: each parent
//! owns a hook that counts down on its disposal, and the combined stream
//! disposes itself once the count reaches zero. Disposing the combined stream
//! cancels its hooks.

use std::cell::Cell;
use std::rc::Rc;

use crate::disposable::ActionDisposable;
use crate::stream::{Stream, WeakStream};
use crate::stream_configuration::SubscribeOptions;

/// Countdown shared by the disposal hooks of all parents
struct Liveness<R: 'static> {
    remaining: Cell<usize>,
    joined: WeakStream<R>,
}

impl<R: Clone + 'static> Liveness<R> {
    fn new(parents: usize, joined: WeakStream<R>) -> Rc<Self> {
        Rc::new(Liveness {
            remaining: Cell::new(parents),
            joined,
        })
    }

    fn parent_disposed(&self) {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining > 0 {
            return;
        }
        if let Some(joined) = self.joined.upgrade() {
            log::debug!("All parents disposed, disposing combined stream");
            joined.dispose();
        }
    }
}

/// Subscribe `joined` to `parent` and hang a liveness hook on the parent
fn link<P, R>(parent: &Stream<P>, joined: &Stream<R>, emit: &Rc<dyn Fn()>, liveness: &Rc<Liveness<R>>)
where
    P: Clone + 'static,
    R: Clone + 'static,
{
    let emit = Rc::clone(emit);
    let subscription = parent.subscribe_with(SubscribeOptions::weak(), move |_| emit());
    joined.add_disposable(subscription);

    // The hook is cancelled when `joined` goes away so the parent does not
    // collect hooks for combined streams that no longer exist
    let liveness = Rc::clone(liveness);
    let hook = Rc::new(ActionDisposable::new(move || liveness.parent_disposed()));
    parent.add_disposable(Rc::clone(&hook));
    joined.on_dispose(move || hook.cancel());
}

macro_rules! combine_fn {
    ($(#[$meta:meta])* $name:ident, $count:expr; $fty:ident $first:ident $(, $ty:ident $parent:ident)+) => {
        $(#[$meta])*
        #[track_caller]
        pub fn $name<$fty, $($ty),+>($first: &Stream<$fty>, $($parent: &Stream<$ty>),+) -> Stream<($fty, $($ty,)+)>
        where
            $fty: Clone + 'static,
            $($ty: Clone + 'static),+
        {
            let joined = $first.derive::<($fty, $($ty,)+)>();

            let parents = ($first.downgrade(), $($parent.downgrade(),)+);
            let target = joined.downgrade();
            let emit: Rc<dyn Fn()> = Rc::new(move || {
                let Some(joined) = target.upgrade() else {
                    return;
                };
                let ($first, $($parent,)+) = &parents;
                let (Some($first), $(Some($parent),)+) = (
                    $first.upgrade().and_then(|p| p.value()),
                    $($parent.upgrade().and_then(|p| p.value()),)+
                ) else {
                    return;
                };
                joined.trigger(($first, $($parent,)+));
            });

            let liveness = Liveness::new($count, joined.downgrade());
            link($first, &joined, &emit, &liveness);
            $( link($parent, &joined, &emit, &liveness); )+

            emit();
            joined
        }
    };
}

combine_fn!(
    /// Join two streams
    combine2, 2; A a, B b
);
combine_fn!(
    /// Join three streams
    combine3, 3; A a, B b, C c
);
combine_fn!(combine4, 4; A a, B b, C c, D d);
combine_fn!(combine5, 5; A a, B b, C c, D d, E e);
combine_fn!(combine6, 6; A a, B b, C c, D d, E e, F f);

/// Join any number of streams of one type into a stream of vectors.
///
/// An empty slice yields a stream that is already disposed.
#[track_caller]
pub fn combine_all<T: Clone + 'static>(parents: &[Stream<T>]) -> Stream<Vec<T>> {
    let Some(first) = parents.first() else {
        let joined = Stream::<Vec<T>>::new();
        joined.dispose();
        return joined;
    };
    let joined = first.derive::<Vec<T>>();

    let weak_parents: Vec<WeakStream<T>> = parents.iter().map(Stream::downgrade).collect();
    let target = joined.downgrade();
    let emit: Rc<dyn Fn()> = Rc::new(move || {
        let Some(joined) = target.upgrade() else {
            return;
        };
        let values: Option<Vec<T>> = weak_parents
            .iter()
            .map(|p| p.upgrade().and_then(|p| p.value()))
            .collect();
        if let Some(values) = values {
            joined.trigger(values);
        }
    });

    let liveness = Liveness::new(parents.len(), joined.downgrade());
    for parent in parents {
        link(parent, &joined, &emit, &liveness);
    }

    emit();
    joined
}

/// Join two to six streams: `combine!(a, b, c)` is `combine3(&a, &b, &c)`
#[macro_export]
macro_rules! combine {
    ($a:expr, $b:expr $(,)?) => {
        $crate::combine::combine2(&$a, &$b)
    };
    ($a:expr, $b:expr, $c:expr $(,)?) => {
        $crate::combine::combine3(&$a, &$b, &$c)
    };
    ($a:expr, $b:expr, $c:expr, $d:expr $(,)?) => {
        $crate::combine::combine4(&$a, &$b, &$c, &$d)
    };
    ($a:expr, $b:expr, $c:expr, $d:expr, $e:expr $(,)?) => {
        $crate::combine::combine5(&$a, &$b, &$c, &$d, &$e)
    };
    ($a:expr, $b:expr, $c:expr, $d:expr, $e:expr, $f:expr $(,)?) => {
        $crate::combine::combine6(&$a, &$b, &$c, &$d, &$e, &$f)
    };
}
