//! # Task Handle
//!
//! An immutable, identity-bearing placeholder for the eventual result of one
//! task invocation. Two invocations of the same function with the same
//! arguments collapse onto the same handle (same fingerprint) — this is
//! what gives the engine its deduplication and memoization-within-a-run
//! behavior.
//!
//! Argument traversal depth is intentionally shallow: a handle's
//! dependencies are whatever appears as a top-level positional/keyword
//! argument, or as an element of a *one-level* array nested in either.
//! Deeper structures (objects, nested arrays) are not walked. This mirrors
//! the original Python engine's behavior exactly (it only ever inspected
//! lists and tuples, never dicts) and changing it would change fingerprints
//! and dependency sets for existing workflows — see DESIGN.md.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Marker prefix used to splice a dependency's fingerprint into the
/// canonical argument serialization in place of the handle itself.
const HANDLE_MARKER: &str = "@handle:";

/// Lifecycle of a single task invocation within one run. One-way
/// transitions; a task never re-enters `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// An immutable placeholder for the output of one `(function, args)` call.
///
/// Cheap to clone (`Arc`-backed); equality and hashing are by fingerprint
/// alone, so two `TaskHandle`s built from identical arguments compare equal
/// even if constructed independently.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    function: String,
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
    fingerprint: String,
}

impl TaskHandle {
    /// Construct a handle, computing its fingerprint from `function` and the
    /// canonicalized arguments. `keyword` is a `BTreeMap` so insertion order
    /// can never leak into the fingerprint.
    pub fn new(function: impl Into<String>, positional: Vec<Value>, keyword: BTreeMap<String, Value>) -> Self {
        let function = function.into();
        let fingerprint = compute_fingerprint(&function, &positional, &keyword);
        Self {
            inner: Arc::new(Inner {
                function,
                positional,
                keyword,
                fingerprint,
            }),
        }
    }

    pub fn function(&self) -> &str {
        &self.inner.function
    }

    pub fn positional(&self) -> &[Value] {
        &self.inner.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.inner.keyword
    }

    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }

    /// Fingerprints of every handle reachable as a top-level argument, or as
    /// an element of a one-level array nested in a top-level argument.
    pub fn dependencies(&self) -> std::collections::HashSet<String> {
        let mut deps = std::collections::HashSet::new();
        for v in self.inner.positional.iter() {
            collect_dependency(v, &mut deps);
        }
        for v in self.inner.keyword.values() {
            collect_dependency(v, &mut deps);
        }
        deps
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}
impl Eq for TaskHandle {}

impl std::hash::Hash for TaskHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fingerprint().hash(state);
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} #{}>", self.function(), self.fingerprint())
    }
}

fn collect_dependency(value: &Value, deps: &mut std::collections::HashSet<String>) {
    if let Some(fp) = handle_marker_fingerprint(value) {
        deps.insert(fp.to_string());
        return;
    }
    if let Value::Array(items) = value {
        for item in items {
            if let Some(fp) = handle_marker_fingerprint(item) {
                deps.insert(fp.to_string());
            }
        }
    }
}

/// If `value` is a dependency marker produced by [`handle_marker`], return
/// the fingerprint it encodes.
pub fn handle_marker_fingerprint(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => s.strip_prefix(HANDLE_MARKER),
        _ => None,
    }
}

/// Serialize a dependency handle as a string marker so it can live inside a
/// `serde_json::Value` argument tree and still be recognized by
/// `collect_dependency` / canonicalization.
pub fn handle_marker(fingerprint: &str) -> Value {
    Value::String(format!("{HANDLE_MARKER}{fingerprint}"))
}

fn compute_fingerprint(function: &str, positional: &[Value], keyword: &BTreeMap<String, Value>) -> String {
    // serde_json::Map is insertion-ordered by default; rebuild from the
    // BTreeMap so the wire form is key-sorted regardless of how the caller
    // built this value, then lean on serde_json's stable array ordering for
    // positional args. Any value that somehow fails to serialize (it can't,
    // with serde_json::Value, but we keep the fallback per spec) degrades to
    // its Debug text rather than panicking.
    let canonical = serde_json::json!({
        "positional": positional,
        "keyword": keyword,
    });

    let arg_bytes = match serde_json::to_vec(&canonical) {
        Ok(bytes) => bytes,
        Err(_) => format!("{positional:?}{keyword:?}").into_bytes(),
    };

    let mut hasher = blake3::Hasher::new();
    hasher.update(function.as_bytes());
    hasher.update(b":");
    hasher.update(&arg_bytes);
    let digest = hasher.finalize();
    digest.to_hex()[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kw(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = TaskHandle::new("produce", vec![json!(3)], BTreeMap::new());
        let b = TaskHandle::new("produce", vec![json!(3)], BTreeMap::new());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn keyword_order_does_not_affect_fingerprint() {
        let a = TaskHandle::new("f", vec![], kw(&[("a", json!(1)), ("b", json!(2))]));
        let b = TaskHandle::new("f", vec![], kw(&[("b", json!(2)), ("a", json!(1))]));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn changing_scalar_arg_changes_fingerprint() {
        let a = TaskHandle::new("produce", vec![json!(3)], BTreeMap::new());
        let b = TaskHandle::new("produce", vec![json!(4)], BTreeMap::new());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn changing_function_name_changes_fingerprint() {
        let a = TaskHandle::new("produce", vec![json!(3)], BTreeMap::new());
        let b = TaskHandle::new("other", vec![json!(3)], BTreeMap::new());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn nested_handle_identity_changes_fingerprint() {
        let dep1 = TaskHandle::new("dup", vec![json!(1)], BTreeMap::new());
        let dep2 = TaskHandle::new("dup", vec![json!(2)], BTreeMap::new());

        let a = TaskHandle::new("consume", vec![handle_marker(dep1.fingerprint())], BTreeMap::new());
        let b = TaskHandle::new("consume", vec![handle_marker(dep2.fingerprint())], BTreeMap::new());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn dependencies_found_at_top_level_and_one_level_deep() {
        let dep_a = TaskHandle::new("dup", vec![json!(1)], BTreeMap::new());
        let dep_b = TaskHandle::new("dup", vec![json!(2)], BTreeMap::new());
        let dep_c = TaskHandle::new("dup", vec![json!(3)], BTreeMap::new());

        // top-level positional dependency
        let h1 = TaskHandle::new("consume", vec![handle_marker(dep_a.fingerprint())], BTreeMap::new());
        assert_eq!(h1.dependencies(), [dep_a.fingerprint().to_string()].into_iter().collect());

        // one-level-deep array of dependencies, plus a keyword dependency
        let arr = Value::Array(vec![
            handle_marker(dep_a.fingerprint()),
            handle_marker(dep_b.fingerprint()),
        ]);
        let h2 = TaskHandle::new(
            "sum",
            vec![arr],
            kw(&[("c", handle_marker(dep_c.fingerprint()))]),
        );
        let deps = h2.dependencies();
        assert_eq!(deps.len(), 3);
        assert!(deps.contains(dep_a.fingerprint()));
        assert!(deps.contains(dep_b.fingerprint()));
        assert!(deps.contains(dep_c.fingerprint()));
    }

    #[test]
    fn deduplicates_identical_nested_calls() {
        let dep_a1 = TaskHandle::new("dup", vec![json!(1)], BTreeMap::new());
        let dep_a2 = TaskHandle::new("dup", vec![json!(1)], BTreeMap::new());
        let dep_b = TaskHandle::new("dup", vec![json!(2)], BTreeMap::new());

        assert_eq!(dep_a1, dep_a2);

        let arr = Value::Array(vec![
            handle_marker(dep_a1.fingerprint()),
            handle_marker(dep_a2.fingerprint()),
            handle_marker(dep_b.fingerprint()),
        ]);
        let h = TaskHandle::new("sum", vec![arr], BTreeMap::new());
        assert_eq!(h.dependencies().len(), 2);
    }

    #[test]
    fn equality_and_hash_are_by_fingerprint() {
        use std::collections::HashSet;
        let a = TaskHandle::new("f", vec![json!(1)], BTreeMap::new());
        let b = TaskHandle::new("f", vec![json!(1)], BTreeMap::new());
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
