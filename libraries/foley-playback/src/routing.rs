//! Plain vs reverb output for new voices

use foley_audio::{AudioGraph, Route};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Environment flag deciding where newly created voices are connected
///
/// Only affects voices created after the change; running sounds keep their bus.
#[derive(Debug, Clone, Default)]
pub struct RoutingSelector {
    cave: Arc<AtomicBool>,
}

impl RoutingSelector {
    /// Start in plain mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle reverb ("cave") mode
    pub fn set_cave(&self, enabled: bool) {
        if self.cave.swap(enabled, Ordering::AcqRel) != enabled {
            info!(cave = enabled, "Routing changed");
        }
    }

    /// Whether reverb mode is on
    pub fn is_cave(&self) -> bool {
        self.cave.load(Ordering::Acquire)
    }

    /// Route for one new voice: dry, or a uniformly chosen reverb bus
    pub fn select(&self, graph: &AudioGraph) -> Route {
        if self.is_cave() {
            graph.random_reverb()
        } else {
            Route::Dry
        }
    }
}
