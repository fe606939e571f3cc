//! Prerequisite Graph Layering
//!
//! Shared by the registry (cycle rejection at registration) and the resolver
//! (stage computation). Layering is Kahn's algorithm applied one whole layer
//! at a time: every node whose prerequisites are all in earlier layers forms
//! the next layer.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};

/// Layer a prerequisite graph given as `node -> prerequisites`.
///
/// Prerequisites that are not themselves nodes of the graph are treated as
/// already resolved. Layers are returned in ascending identity order; callers
/// re-order within a layer as they see fit.
///
/// Returns `DependencyCycle` naming the tools on (or between) cycles when the
/// graph cannot be fully layered.
pub fn layer_graph(nodes: &BTreeMap<String, BTreeSet<String>>) -> CoreResult<Vec<Vec<String>>> {
    // Build in-degree counts and prerequisite -> dependents adjacency
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (id, prerequisites) in nodes {
        in_degree.entry(id.as_str()).or_insert(0);
        for prerequisite in prerequisites {
            if !nodes.contains_key(prerequisite) {
                continue;
            }
            *in_degree.entry(id.as_str()).or_insert(0) += 1;
            dependents
                .entry(prerequisite.as_str())
                .or_default()
                .push(id.as_str());
        }
    }

    let mut remaining: BTreeSet<&str> = nodes.keys().map(String::as_str).collect();
    let mut layers = Vec::new();

    loop {
        let ready: Vec<&str> = remaining
            .iter()
            .filter(|id| in_degree.get(*id).copied().unwrap_or(0) == 0)
            .copied()
            .collect();

        if ready.is_empty() {
            break;
        }

        for id in &ready {
            remaining.remove(id);
            if let Some(deps) = dependents.get(id) {
                for dep in deps {
                    if let Some(degree) = in_degree.get_mut(dep) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
        }
        layers.push(ready.into_iter().map(str::to_string).collect());
    }

    if !remaining.is_empty() {
        return Err(CoreError::dependency_cycle(cycle_members(nodes, remaining)));
    }

    Ok(layers)
}

/// Narrow the unlayered residue down to the tools on cycles, dropping
/// downstream tools that are only blocked by a cycle.
fn cycle_members(
    nodes: &BTreeMap<String, BTreeSet<String>>,
    mut residual: BTreeSet<&str>,
) -> Vec<String> {
    loop {
        let leaves: Vec<&str> = residual
            .iter()
            .filter(|id| {
                !residual.iter().any(|other| {
                    nodes
                        .get(*other)
                        .map(|prereqs| prereqs.contains(**id))
                        .unwrap_or(false)
                })
            })
            .copied()
            .collect();
        if leaves.is_empty() {
            break;
        }
        for leaf in leaves {
            residual.remove(leaf);
        }
    }
    residual.into_iter().map(str::to_string).collect()
}

/// Every transitive prerequisite of `roots`, including the roots themselves.
///
/// Prerequisites absent from `nodes` are reported in the second set.
pub fn transitive_closure<'a, I>(
    nodes: &BTreeMap<String, BTreeSet<String>>,
    roots: I,
) -> (BTreeSet<String>, BTreeSet<String>)
where
    I: IntoIterator<Item = &'a String>,
{
    let mut closure = BTreeSet::new();
    let mut missing = BTreeSet::new();
    let mut stack: Vec<String> = roots.into_iter().cloned().collect();

    while let Some(id) = stack.pop() {
        if !closure.insert(id.clone()) {
            continue;
        }
        match nodes.get(&id) {
            Some(prerequisites) => {
                stack.extend(prerequisites.iter().filter(|p| !closure.contains(*p)).cloned())
            }
            None => {
                closure.remove(&id);
                missing.insert(id);
            }
        }
    }
    (closure, missing)
}
