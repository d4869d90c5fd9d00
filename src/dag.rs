//! # DAG construction
//!
//! Building the dependency graph is a pure, backward BFS from one requested
//! terminal handle: only the handles reachable by repeatedly following
//! `TaskHandle::dependencies()` are included, never the full set of handles
//! a workflow happens to have constructed. This means calling `.run(handle)`
//! on two different terminal handles built from the same workflow only
//! does the work each one actually needs.

use crate::handle::TaskHandle;
use std::collections::{HashMap, HashSet, VecDeque};

/// The resolved subgraph needed to produce one terminal handle's result.
#[derive(Debug)]
pub struct Dag {
    /// Every handle reachable from the target, including the target itself,
    /// keyed by fingerprint.
    pub nodes: HashMap<String, TaskHandle>,
    /// fingerprint -> fingerprints it depends on.
    pub dependencies: HashMap<String, HashSet<String>>,
    /// fingerprint -> fingerprints that depend on it (the reverse edges).
    pub dependents: HashMap<String, HashSet<String>>,
    pub target: String,
}

impl Dag {
    /// Walk backward from `target`, looking up each dependency's full handle
    /// in `handle_table`. A dependency fingerprint absent from the table
    /// (the workflow never actually built a handle for it — a dangling
    /// reference) is recorded as missing rather than panicking; the caller
    /// decides whether that's fatal.
    pub fn build(target: &TaskHandle, handle_table: &HashMap<String, TaskHandle>) -> (Self, Vec<String>) {
        let mut nodes = HashMap::new();
        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
        let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
        let mut missing = Vec::new();

        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        queue.push_back(target.clone());
        seen.insert(target.fingerprint().to_string());

        while let Some(handle) = queue.pop_front() {
            let fp = handle.fingerprint().to_string();
            let deps = handle.dependencies();
            nodes.insert(fp.clone(), handle);
            dependencies.entry(fp.clone()).or_default();

            for dep_fp in deps {
                dependencies.entry(fp.clone()).or_default().insert(dep_fp.clone());
                dependents.entry(dep_fp.clone()).or_default().insert(fp.clone());

                if seen.insert(dep_fp.clone()) {
                    match handle_table.get(&dep_fp) {
                        Some(dep_handle) => queue.push_back(dep_handle.clone()),
                        None => missing.push(dep_fp),
                    }
                }
            }
        }

        (
            Dag {
                nodes,
                dependencies,
                dependents,
                target: target.fingerprint().to_string(),
            },
            missing,
        )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fingerprints with no unmet dependency at the start of a run, i.e.
    /// tasks that can be scheduled immediately.
    pub fn roots(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(fp, _)| fp.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::handle_marker;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn single_node_dag() {
        let h = TaskHandle::new("leaf", vec![json!(1)], BTreeMap::new());
        let table = HashMap::from([(h.fingerprint().to_string(), h.clone())]);
        let (dag, missing) = Dag::build(&h, &table);
        assert!(missing.is_empty());
        assert_eq!(dag.len(), 1);
        assert_eq!(dag.roots(), vec![h.fingerprint().to_string()]);
    }

    #[test]
    fn linear_chain() {
        let a = TaskHandle::new("a", vec![json!(1)], BTreeMap::new());
        let b = TaskHandle::new("b", vec![handle_marker(a.fingerprint())], BTreeMap::new());
        let c = TaskHandle::new("c", vec![handle_marker(b.fingerprint())], BTreeMap::new());

        let table = HashMap::from([
            (a.fingerprint().to_string(), a.clone()),
            (b.fingerprint().to_string(), b.clone()),
            (c.fingerprint().to_string(), c.clone()),
        ]);

        let (dag, missing) = Dag::build(&c, &table);
        assert!(missing.is_empty());
        assert_eq!(dag.len(), 3);
        assert_eq!(dag.roots(), vec![a.fingerprint().to_string()]);
        assert!(dag.dependents[a.fingerprint()].contains(b.fingerprint()));
        assert!(dag.dependents[b.fingerprint()].contains(c.fingerprint()));
    }

    #[test]
    fn diamond_shares_common_ancestor() {
        let a = TaskHandle::new("a", vec![json!(1)], BTreeMap::new());
        let b1 = TaskHandle::new("b", vec![handle_marker(a.fingerprint()), json!(1)], BTreeMap::new());
        let b2 = TaskHandle::new("b", vec![handle_marker(a.fingerprint()), json!(2)], BTreeMap::new());
        let arr = serde_json::Value::Array(vec![handle_marker(b1.fingerprint()), handle_marker(b2.fingerprint())]);
        let c = TaskHandle::new("c", vec![arr], BTreeMap::new());

        let table = HashMap::from([
            (a.fingerprint().to_string(), a.clone()),
            (b1.fingerprint().to_string(), b1.clone()),
            (b2.fingerprint().to_string(), b2.clone()),
            (c.fingerprint().to_string(), c.clone()),
        ]);

        let (dag, missing) = Dag::build(&c, &table);
        assert!(missing.is_empty());
        assert_eq!(dag.len(), 4);
        assert_eq!(dag.dependents[a.fingerprint()].len(), 2);
    }

    #[test]
    fn dangling_dependency_is_reported_not_panicked() {
        let dangling_fp = "deadbeef01".to_string();
        let c = TaskHandle::new("c", vec![handle_marker(&dangling_fp)], BTreeMap::new());
        let table = HashMap::from([(c.fingerprint().to_string(), c.clone())]);

        let (dag, missing) = Dag::build(&c, &table);
        assert_eq!(missing, vec![dangling_fp]);
        assert_eq!(dag.len(), 1);
    }
}
