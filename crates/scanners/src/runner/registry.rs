use crate::core::Scanner;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ScannerRegistry {
    scanners: HashMap<String, Arc<dyn Scanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self {
            scanners: HashMap::new(),
        }
    }

    /// Registry with every built-in scanner: the flow-sensitive CEI engine
    /// and the lexical fallback. Each one no-ops when the context lacks its
    /// input, so registering both is always safe.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::reentrancy::CeiReentrancyScanner::new());
        registry.register(crate::source::SourceReentrancyScanner::new());
        registry
    }

    pub fn register<S: Scanner + 'static>(&mut self, scanner: S) {
        let id = scanner.id().to_string();
        self.scanners.insert(id, Arc::new(scanner));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Scanner>> {
        self.scanners.values().cloned().collect()
    }

    pub fn enabled(&self) -> Vec<Arc<dyn Scanner>> {
        self.scanners
            .values()
            .filter(|s| s.enabled_by_default())
            .cloned()
            .collect()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.scanners.keys().cloned().collect()
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
