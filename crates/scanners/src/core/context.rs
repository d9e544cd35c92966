use crate::program::Program;
use anyhow::Result;
use lru::LruCache;
use parking_lot::RwLock;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Which functions the reentrancy analysis considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionEligibility {
    /// Only functions whose body subtree reaches an interaction member
    /// (`call`, `send`, `transfer`, `delegatecall`). Default.
    InteractionsOnly,
    /// Every function, including ones with no external calls at all.
    All,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub parallel_execution: bool,
    pub cache_enabled: bool,
    pub max_cache_size: usize,
    pub deduplication_enabled: bool,
    pub eligibility: FunctionEligibility,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            parallel_execution: true,
            cache_enabled: true,
            max_cache_size: 256,
            deduplication_enabled: true,
            eligibility: FunctionEligibility::InteractionsOnly,
        }
    }
}

pub struct AnalysisCache {
    entries: LruCache<String, Arc<dyn Any + Send + Sync>>,
}

impl AnalysisCache {
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get_or_compute<T, F>(&mut self, key: &str, compute: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        if let Some(entry) = self.entries.get(key) {
            if let Some(value) = entry.downcast_ref::<Arc<T>>() {
                return Ok(value.clone());
            }
        }

        let value = Arc::new(compute()?);
        self.entries
            .put(key.to_string(), Arc::new(value.clone()) as Arc<dyn Any + Send + Sync>);

        Ok(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Everything a scanner invocation may read: the parsed program (when the
/// front end produced one), the raw source text (for the lexical fallback),
/// and the shared analysis cache.
pub struct AnalysisContext {
    program: Option<Arc<Program>>,
    source_code: Option<String>,
    source_path: Option<String>,
    config: ScannerConfig,
    cache: Arc<RwLock<AnalysisCache>>,
}

impl AnalysisContext {
    pub fn new(config: ScannerConfig) -> Self {
        let cache_size = config.max_cache_size;
        Self {
            program: None,
            source_code: None,
            source_path: None,
            config,
            cache: Arc::new(RwLock::new(AnalysisCache::new(cache_size))),
        }
    }

    pub fn with_program(mut self, program: Program) -> Self {
        self.program = Some(Arc::new(program));
        self
    }

    pub fn with_source(mut self, source_code: impl Into<String>) -> Self {
        self.source_code = Some(source_code.into());
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_deref()
    }

    pub fn source_code(&self) -> Option<&str> {
        self.source_code.as_deref()
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        if self.config.cache_enabled {
            self.cache.write().get_or_compute(key, compute)
        } else {
            Ok(Arc::new(compute()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_computes_once_per_key() {
        let context = AnalysisContext::new(ScannerConfig::default());
        let mut calls = 0;

        let first: Arc<usize> = context
            .get_or_compute("k", || {
                calls += 1;
                Ok(7)
            })
            .unwrap();
        let second: Arc<usize> = context
            .get_or_compute("k", || {
                calls += 1;
                Ok(8)
            })
            .unwrap();

        assert_eq!(*first, 7);
        assert_eq!(*second, 7);
        assert_eq!(calls, 1);
    }
}
