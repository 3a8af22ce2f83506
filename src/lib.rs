//! rs2-signal - single-value reactive streams
//!
//! A [`Stream`] caches the last value pushed into it and broadcasts every
//! new value synchronously to its subscribers. Streams derive from one
//! another through `map`, `filter`, `distinct`, `fold`, `take` and `skip`,
//! and several streams can be joined with [`combine`](combine::combine2).
//!
//! Lifetimes are explicit: subscriptions are strong (kept alive until
//! disposed) or weak (kept alive by their handle), and a [`LeakRegistry`]
//! counts every stream and strong subscription so tests can check that
//! everything they created was released.

pub mod combine;
pub mod disposable;
pub mod error;
pub mod leak_registry;
mod operators;
pub mod retained;
pub mod stream;
pub mod stream_configuration;
pub mod subscription;
pub mod testing;

pub use combine::{combine2, combine3, combine4, combine5, combine6, combine_all};
pub use disposable::{ActionDisposable, CompositeDisposable, Disposable};
pub use error::{LeakError, LeakResult};
pub use leak_registry::{
    get_global_leak_registry, LeakEntry, LeakRegistry, LeakReport, TrackingKey,
    GLOBAL_LEAK_REGISTRY,
};
pub use retained::retained_count;
pub use stream::{Stream, WeakStream};
pub use stream_configuration::{StreamConfig, SubscribeOptions};
pub use subscription::{Ownership, Subscription, SubscriptionTarget};
