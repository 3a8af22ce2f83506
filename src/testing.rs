//! Leak-checking fixture for test harnesses.
//!
//! ```
//! use rs2_signal::testing::LeakFixture;
//! use rs2_signal::Stream;
//!
//! let fixture = LeakFixture::new();
//! let stream: Stream<i32> = Stream::with_config(fixture.config());
//! let doubled = stream.map(|x| x * 2);
//! stream.trigger(2);
//! assert_eq!(doubled.value(), Some(4));
//!
//! drop(doubled);
//! drop(stream);
//! fixture.finish().unwrap();
//! ```

use crate::error::LeakResult;
use crate::leak_registry::{LeakRegistry, LeakReport};
use crate::stream_configuration::StreamConfig;

/// Owns a registry for one test case
pub struct LeakFixture {
    registry: LeakRegistry,
}

impl Default for LeakFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl LeakFixture {
    /// Fixture with its own, always-enabled registry
    pub fn new() -> Self {
        Self::with_registry(LeakRegistry::enabled())
    }

    /// Fixture over an existing registry, which is reset first
    pub fn with_registry(registry: LeakRegistry) -> Self {
        registry.reset();
        Self { registry }
    }

    pub fn registry(&self) -> &LeakRegistry {
        &self.registry
    }

    /// Stream configuration counting in this fixture's registry
    pub fn config(&self) -> StreamConfig {
        StreamConfig::default().with_registry(self.registry.clone())
    }

    pub fn report(&self) -> LeakReport {
        self.registry.validate()
    }

    /// Validate and reset, failing if anything is still outstanding
    pub fn finish(self) -> LeakResult<()> {
        let report = self.registry.validate();
        self.registry.reset();
        report.into_result()
    }
}
