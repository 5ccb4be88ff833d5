//! Process-wide request cache keyed by logical query identity. Mutations
//! invalidate every key they may affect; staleness plus refetch is the
//! consistency model, there is no locking across operations.

use dashmap::DashMap;
use serde_json::Value;

/// Identity of a cached query: operation name plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub op: String,
    pub params: String,
}

impl QueryKey {
    pub fn new(op: &str, params: impl Into<String>) -> Self {
        QueryKey { op: op.to_owned(), params: params.into() }
    }

    /// Key for a parameterless operation.
    pub fn bare(op: &str) -> Self {
        Self::new(op, "")
    }
}

/// Injectable cache seam so the data layer can run with a real cache, a
/// deterministic fake, or nothing at all.
pub trait RequestCache: Send + Sync {
    fn get(&self, key: &QueryKey) -> Option<Value>;
    fn put(&self, key: QueryKey, value: Value);
    fn invalidate(&self, key: &QueryKey);
    /// Drop every cached entry of an operation, regardless of parameters.
    fn invalidate_op(&self, op: &str);
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<QueryKey, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RequestCache for MemoryCache {
    fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn put(&self, key: QueryKey, value: Value) {
        self.entries.insert(key, value);
    }

    fn invalidate(&self, key: &QueryKey) {
        self.entries.remove(key);
    }

    fn invalidate_op(&self, op: &str) {
        self.entries.retain(|k, _| k.op != op);
    }
}

/// No-op cache: every read misses.
pub struct NoCache;

impl RequestCache for NoCache {
    fn get(&self, _key: &QueryKey) -> Option<Value> {
        None
    }
    fn put(&self, _key: QueryKey, _value: Value) {}
    fn invalidate(&self, _key: &QueryKey) {}
    fn invalidate_op(&self, _op: &str) {}
}
