//! Process-wide source id → parser mapping.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::model::SourceId;
use crate::source::SourceParser;
use crate::source::mangadex::MangaDexSource;

/// Registry of all known source parsers.
///
/// Populated once at startup, then shared behind an `Arc` and only ever read.
/// A parser stays registered for the process lifetime; there is no hot-swap.
pub struct SourceRegistry {
    parsers: HashMap<SourceId, Arc<dyn SourceParser>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in sources registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MangaDexSource::new()));
        registry
    }

    /// Registers `parser` under its own source id, replacing any previous
    /// registration for that id.
    pub fn register(&mut self, parser: Arc<dyn SourceParser>) {
        let id = parser.info().id;
        if self.parsers.insert(id, parser).is_some() {
            warn!("Replacing parser already registered for source {id}");
        }
    }

    pub fn parser(&self, source: SourceId) -> Option<Arc<dyn SourceParser>> {
        self.parsers.get(&source).cloned()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
