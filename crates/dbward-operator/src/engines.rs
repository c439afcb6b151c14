//! Engine adapter registry
//!
//! Maps each engine kind to the adapter that serves it. An engine without a
//! registered adapter is never touched: a declared engine reports an error,
//! anything else reports `Unsupported`.

use dbward_rdbc::{EngineAdapter, EngineKind};
use std::collections::HashMap;
use std::sync::Arc;

/// How a resource's engine is served
pub enum Dispatch {
    /// An adapter is registered for the engine
    Adapter(Arc<dyn EngineAdapter>),
    /// The engine is known but has no adapter in this build
    Unimplemented(EngineKind),
    /// The engine is not known at all
    Unsupported(EngineKind),
}

/// Registered engine adapters
#[derive(Default, Clone)]
pub struct EngineRegistry {
    adapters: HashMap<EngineKind, Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the engine kind it reports
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) -> &mut Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Builder-style [`EngineRegistry::register`]
    pub fn with(mut self, adapter: Arc<dyn EngineAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapter registered for `kind`
    pub fn get(&self, kind: &EngineKind) -> Option<Arc<dyn EngineAdapter>> {
        self.adapters.get(kind).cloned()
    }

    /// Decide how a resource asking for `kind` is served
    pub fn dispatch(&self, kind: EngineKind) -> Dispatch {
        match self.get(&kind) {
            Some(adapter) => Dispatch::Adapter(adapter),
            None if kind.is_declared() => Dispatch::Unimplemented(kind),
            None => Dispatch::Unsupported(kind),
        }
    }

    /// Registered engine kinds
    pub fn kinds(&self) -> Vec<EngineKind> {
        let mut kinds: Vec<_> = self.adapters.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
