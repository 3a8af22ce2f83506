//! Configuration types for streams and subscriptions

use crate::leak_registry::{get_global_leak_registry, LeakRegistry};

/// Stream construction options
#[derive(Clone)]
pub struct StreamConfig {
    /// Keep the last triggered value; off means fire-and-forget
    pub memory: bool,
    /// Count this stream (and its strong subscriptions) in a leak registry
    pub track_leaks: bool,
    /// Registry to count in; the global one when absent
    pub registry: Option<LeakRegistry>,
    /// Name used in log output
    pub label: Option<String>,
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("memory", &self.memory)
            .field("track_leaks", &self.track_leaks)
            .field(
                "registry",
                &if self.registry.is_some() {
                    "Some(LeakRegistry)"
                } else {
                    "Global"
                },
            )
            .field("label", &self.label)
            .finish()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            memory: true,
            track_leaks: true,
            registry: None,
            label: None,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable last-value memory
    pub fn memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    /// Enable or disable leak tracking
    pub fn track_leaks(mut self, track: bool) -> Self {
        self.track_leaks = track;
        self
    }

    /// Count in the given registry instead of the global one
    pub fn with_registry(mut self, registry: LeakRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The registry this configuration counts in
    pub fn resolve_registry(&self) -> LeakRegistry {
        match &self.registry {
            Some(registry) => registry.clone(),
            None => get_global_leak_registry(),
        }
    }

    /// Configuration for a stream derived by an operator: same registry and
    /// tracking, fresh memory and no label
    pub(crate) fn derived(&self) -> Self {
        Self {
            memory: true,
            track_leaks: self.track_leaks,
            registry: self.registry.clone(),
            label: None,
        }
    }
}

/// Options for `Stream::subscribe_with`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Deliver the cached value immediately when one exists
    pub replay: bool,
    /// Keep the subscription alive without a caller-held handle
    pub strong: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            replay: false,
            strong: true,
        }
    }
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-retained subscription whose lifetime is its handle
    pub fn weak() -> Self {
        Self {
            replay: false,
            strong: false,
        }
    }

    pub fn replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    pub fn strong(mut self, strong: bool) -> Self {
        self.strong = strong;
        self
    }
}
