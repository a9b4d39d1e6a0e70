//! Closure maintenance
//!
//! Keeps the closure rows of one relation type consistent when direct
//! edges come and go. Every function works inside a caller-supplied
//! transaction and leaves committing to the caller; an error means the
//! transaction must be dropped.
//!
//! Depths are shortest path lengths. Adding `p -> c` can only shorten
//! paths from `{p} ∪ ancestors(p)` to `{c} ∪ descendants(c)`, and removing
//! it can only lengthen or break those same paths, so both operations are
//! confined to that neighbourhood.

use super::edge::DIRECT;
use super::engine::{DagError, DagResult};
use super::vertex::VertexId;
use crate::registry::{Registry, RelationType};
use crate::storage::{ClosureTxn, DepthPredicate, RowFilter, StorageError};
use std::collections::{HashMap, HashSet, VecDeque};

/// Vertices related to `vertex` under `slot`, with their depths
fn ancestors_of(
    txn: &dyn ClosureTxn,
    slot: usize,
    vertex: &VertexId,
) -> DagResult<Vec<(VertexId, u32)>> {
    let rows = txn.rows_matching(&RowFilter::for_slot(slot).with_descendant(vertex.clone()))?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let depth = row.depth_in(slot);
            (row.ancestor, depth)
        })
        .collect())
}

fn descendants_of(
    txn: &dyn ClosureTxn,
    slot: usize,
    vertex: &VertexId,
) -> DagResult<Vec<(VertexId, u32)>> {
    let rows = txn.rows_matching(&RowFilter::for_slot(slot).with_ancestor(vertex.clone()))?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let depth = row.depth_in(slot);
            (row.descendant, depth)
        })
        .collect())
}

/// Insert the direct edge `parent -> child` and every path it creates.
///
/// Returns the number of closure rows written.
pub(crate) fn insert_edge(
    txn: &mut dyn ClosureTxn,
    relation: &RelationType,
    parent: &VertexId,
    child: &VertexId,
) -> DagResult<usize> {
    let slot = relation.slot;

    if parent == child {
        return Err(DagError::SelfEdge {
            relation: relation.name.clone(),
            vertex: parent.clone(),
        });
    }

    if relation.is_single() {
        let existing = txn.rows_matching(
            &RowFilter::for_slot(slot)
                .direct()
                .with_descendant(child.clone()),
        )?;
        if let Some(row) = existing.into_iter().next() {
            if &row.ancestor == parent {
                return Err(DagError::DuplicateEdge {
                    relation: relation.name.clone(),
                    ancestor: parent.clone(),
                    descendant: child.clone(),
                });
            }
            return Err(DagError::CardinalityViolation {
                relation: relation.name.clone(),
                child: child.clone(),
                existing_parent: row.ancestor,
            });
        }
    }

    let ancestors = ancestors_of(txn, slot, parent)?;
    let descendants = descendants_of(txn, slot, child)?;

    txn.insert_direct(slot, parent, child).map_err(|e| match e {
        StorageError::DuplicateEdge {
            ancestor,
            descendant,
        } => DagError::DuplicateEdge {
            relation: relation.name.clone(),
            ancestor,
            descendant,
        },
        other => other.into(),
    })?;
    let mut written = 1;

    for (ancestor, up) in &ancestors {
        if ancestor == child {
            tracing::warn!(relation = %relation.name, %parent, %child, "edge closes a cycle");
            continue;
        }
        if txn.upsert_min(slot, ancestor, child, up + DIRECT)? {
            written += 1;
        }
    }

    for (descendant, down) in &descendants {
        if descendant == parent {
            continue;
        }
        if txn.upsert_min(slot, parent, descendant, DIRECT + down)? {
            written += 1;
        }
    }

    for (ancestor, up) in &ancestors {
        for (descendant, down) in &descendants {
            if ancestor == descendant {
                continue;
            }
            if txn.upsert_min(slot, ancestor, descendant, up + DIRECT + down)? {
                written += 1;
            }
        }
    }

    Ok(written)
}

/// Remove the direct edge `parent -> child` and rebuild the paths that
/// went through it.
///
/// Every derived row between `{parent} ∪ ancestors(parent)` and
/// `{child} ∪ descendants(child)` is dropped, then each of those pairs is
/// re-derived by a breadth-first search over the surviving direct edges.
/// Returns the rows deleted and the rows written back, in that order.
pub(crate) fn remove_edge(
    txn: &mut dyn ClosureTxn,
    relation: &RelationType,
    parent: &VertexId,
    child: &VertexId,
) -> DagResult<(usize, usize)> {
    let slot = relation.slot;
    let direct = RowFilter::for_slot(slot)
        .direct()
        .with_ancestor(parent.clone())
        .with_descendant(child.clone());

    if txn.rows_matching(&direct)?.is_empty() {
        return Err(DagError::EdgeNotFound {
            relation: relation.name.clone(),
            ancestor: parent.clone(),
            descendant: child.clone(),
        });
    }

    let mut sources = vec![parent.clone()];
    sources.extend(ancestors_of(txn, slot, parent)?.into_iter().map(|(v, _)| v));
    let mut targets: HashSet<VertexId> = HashSet::from([child.clone()]);
    targets.extend(descendants_of(txn, slot, child)?.into_iter().map(|(v, _)| v));

    let mut removed = txn.delete_rows(&direct)?;
    for source in &sources {
        for target in &targets {
            if source == target {
                continue;
            }
            removed += txn.delete_rows(
                &RowFilter::for_slot(slot)
                    .with_depth(DepthPredicate::AtLeast(DIRECT + 1))
                    .with_ancestor(source.clone())
                    .with_descendant(target.clone()),
            )?;
        }
    }

    let mut restored = 0;
    for source in &sources {
        for (target, depth) in shortest_paths(txn, slot, source)? {
            if depth > DIRECT && targets.contains(&target) && txn.upsert_min(slot, source, &target, depth)? {
                restored += 1;
            }
        }
    }

    Ok((removed, restored))
}

/// Shortest path length from `origin` to everything reachable over direct
/// edges of `slot`.
fn shortest_paths(
    txn: &dyn ClosureTxn,
    slot: usize,
    origin: &VertexId,
) -> DagResult<HashMap<VertexId, u32>> {
    let mut depths = HashMap::new();
    let mut seen = HashSet::from([origin.clone()]);
    let mut queue = VecDeque::from([(origin.clone(), 0u32)]);

    while let Some((vertex, depth)) = queue.pop_front() {
        let children = txn.rows_matching(&RowFilter::for_slot(slot).direct().with_ancestor(vertex))?;
        for row in children {
            if seen.insert(row.descendant.clone()) {
                depths.insert(row.descendant.clone(), depth + 1);
                queue.push_back((row.descendant, depth + 1));
            }
        }
    }

    Ok(depths)
}

/// Remove every direct edge touching `vertex` in every relation type,
/// repairing the closure for each, then drop any row still naming it.
///
/// Returns the number of direct edges that were removed.
pub(crate) fn detach_vertex(
    txn: &mut dyn ClosureTxn,
    registry: &Registry,
    vertex: &VertexId,
) -> DagResult<usize> {
    let mut edges = 0;

    for relation in registry.types() {
        let slot = relation.slot;
        let parents = txn.rows_matching(
            &RowFilter::for_slot(slot)
                .direct()
                .with_descendant(vertex.clone()),
        )?;
        let children = txn.rows_matching(
            &RowFilter::for_slot(slot)
                .direct()
                .with_ancestor(vertex.clone()),
        )?;

        for row in parents {
            remove_edge(txn, relation, &row.ancestor, vertex)?;
            edges += 1;
        }
        for row in children {
            remove_edge(txn, relation, vertex, &row.descendant)?;
            edges += 1;
        }
    }

    let leftover = txn.delete_all_for_vertex(vertex)?;
    if leftover > 0 {
        tracing::warn!(%vertex, leftover, "rows outlived the vertex's direct edges");
    }

    Ok(edges)
}

/// Vertices the deletion policies of `registry` pull in when `vertex` goes
pub(crate) fn cascade_targets(
    txn: &dyn ClosureTxn,
    registry: &Registry,
    vertex: &VertexId,
) -> DagResult<Vec<VertexId>> {
    use crate::registry::DeleteAction;

    let mut related = Vec::new();
    for relation in registry.types() {
        let policy = relation.on_vertex_delete;
        if policy.ancestors == DeleteAction::Cascade {
            related.extend(ancestors_of(txn, relation.slot, vertex)?.into_iter().map(|(v, _)| v));
        }
        if policy.descendants == DeleteAction::Cascade {
            related.extend(descendants_of(txn, relation.slot, vertex)?.into_iter().map(|(v, _)| v));
        }
    }
    Ok(related)
}
