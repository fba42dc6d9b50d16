//! Memoized table loading

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::catalog::FormatCatalog;
use crate::dbc::{DbcTable, DecodeOptions, FormatSpec};
use crate::error::Result;
use crate::storage::TableSource;

/// Decoded tables keyed by table name
///
/// Entries live as long as the cache. Two callers missing on the same name
/// may both decode it; decoding is deterministic, so whichever insert lands
/// last is equivalent to the first. Failed loads are never stored.
pub struct TableCache {
    catalog: Arc<dyn FormatCatalog>,
    source: Arc<dyn TableSource>,
    options: DecodeOptions,
    tables: RwLock<HashMap<String, Arc<DbcTable>>>,
}

impl TableCache {
    pub fn new(
        catalog: Arc<dyn FormatCatalog>,
        source: Arc<dyn TableSource>,
        options: DecodeOptions,
    ) -> Self {
        Self::with_tables(catalog, source, options, HashMap::new())
    }

    /// Start from an existing backing map
    pub fn with_tables(
        catalog: Arc<dyn FormatCatalog>,
        source: Arc<dyn TableSource>,
        options: DecodeOptions,
        tables: HashMap<String, Arc<DbcTable>>,
    ) -> Self {
        Self {
            catalog,
            source,
            options,
            tables: RwLock::new(tables),
        }
    }

    /// Cached table, loading it on a miss
    pub fn get(&self, name: &str) -> Result<Arc<DbcTable>> {
        let cached = self.tables.read().get(name).cloned();
        if let Some(table) = cached {
            debug!(table = name, "cache hit");
            return Ok(table);
        }

        debug!(table = name, "cache miss");
        let table = Arc::new(self.load(name)?);
        self.tables.write().insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Resolve the layout and decode `name` without touching the cache
    pub fn load(&self, name: &str) -> Result<DbcTable> {
        let started = Instant::now();
        let layout = Arc::new(FormatSpec::resolve(name, self.catalog.as_ref())?);
        let data = self.source.read_table(name)?;
        let table = DbcTable::parse(name, &data, layout, &self.options)?;
        info!(
            table = name,
            records = table.record_count(),
            bytes = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded table"
        );
        Ok(table)
    }

    /// Cached table without loading
    pub fn cached(&self, name: &str) -> Option<Arc<DbcTable>> {
        self.tables.read().get(name).cloned()
    }

    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    pub fn catalog(&self) -> &dyn FormatCatalog {
        self.catalog.as_ref()
    }

    pub fn source(&self) -> &dyn TableSource {
        self.source.as_ref()
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticFormatCatalog;
    use crate::dbc::testing::{sample_table, DbcBuilder};
    use crate::error::Error;
    use crate::storage::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reads to observe cache behaviour
    struct CountingSource {
        inner: MemorySource,
        reads: AtomicUsize,
    }

    impl TableSource for CountingSource {
        fn read_table(&self, name: &str) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_table(name)
        }

        fn contains(&self, name: &str) -> bool {
            self.inner.contains(name)
        }

        fn table_files(&self) -> Vec<String> {
            self.inner.table_files()
        }
    }

    fn setup() -> (TableCache, Arc<CountingSource>) {
        let catalog = Arc::new(StaticFormatCatalog::from_iter([
            ("Sample", "nifss"),
            ("Broken", "nifss"),
            ("Orphan", "ni"),
        ]));
        let inner = MemorySource::new();
        inner.insert("Sample", sample_table());
        inner.insert("Broken", DbcBuilder::new(b"\0").magic(b"XXXX").build());
        let source = Arc::new(CountingSource {
            inner,
            reads: AtomicUsize::new(0),
        });
        let cache = TableCache::new(catalog, source.clone(), DecodeOptions::default());
        (cache, source)
    }

    #[test]
    fn test_second_get_hits_cache() {
        let (cache, source) = setup();
        let first = cache.get("Sample").unwrap();
        let second = cache.get("Sample").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_names(), vec!["Sample"]);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (cache, source) = setup();
        assert!(matches!(cache.get("Broken"), Err(Error::BadSignature { .. })));
        assert!(matches!(cache.get("Broken"), Err(Error::BadSignature { .. })));
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(matches!(cache.get("Unknown"), Err(Error::FormatNotFound(_))));
        assert!(matches!(cache.get("Orphan"), Err(Error::NotFound(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_instances_are_isolated() {
        let (a, _) = setup();
        let (b, _) = setup();
        a.get("Sample").unwrap();
        assert_eq!(a.len(), 1);
        assert!(b.cached("Sample").is_none());
    }

    #[test]
    fn test_concurrent_first_loads_agree() {
        let (cache, _) = setup();
        let tables: Vec<Arc<DbcTable>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| cache.get("Sample").unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for table in &tables {
            assert_eq!(table.records(), tables[0].records());
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_with_tables_prepopulated() {
        let (loader, _) = setup();
        let table = Arc::new(loader.load("Sample").unwrap());
        let catalog = Arc::new(StaticFormatCatalog::new());
        let source = Arc::new(MemorySource::new());
        let mut map = HashMap::new();
        map.insert("Sample".to_string(), table);
        let cache = TableCache::with_tables(catalog, source, DecodeOptions::default(), map);
        assert_eq!(cache.get("Sample").unwrap().record_count(), 2);
    }
}
