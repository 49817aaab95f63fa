//! Dependency ordering of enrichers
//!
//! Each declared dependency is an edge from the dependency to its
//! dependent. Orders are produced with Kahn's algorithm, ties broken by the
//! position of each enricher in the requested selection so the same input
//! always yields the same order.

use super::error::{EnrichmentError, EnrichmentResult};
use crate::enricher::{DescriptorSet, EnricherId};
use std::collections::{BTreeSet, HashMap};

/// Order `selection` so every enricher follows all of its dependencies.
///
/// Duplicate ids in `selection` collapse onto their first occurrence. Every
/// dependency of a selected enricher must itself be selected; expanding a
/// selection with its dependencies is the diff calculator's job.
pub fn sort(universe: &DescriptorSet, selection: &[EnricherId]) -> EnrichmentResult<Vec<EnricherId>> {
    let mut index: HashMap<&EnricherId, usize> = HashMap::with_capacity(selection.len());
    let mut nodes = Vec::with_capacity(selection.len());
    for id in selection {
        if index.contains_key(id) {
            continue;
        }
        let descriptor = universe
            .get(id)
            .ok_or_else(|| EnrichmentError::UnknownEnricher(id.clone()))?;
        index.insert(id, nodes.len());
        nodes.push(descriptor);
    }

    // dependents[d] lists the nodes that depend on d
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    for (i, descriptor) in nodes.iter().enumerate() {
        for dependency in universe.dependency_ids(descriptor)? {
            if dependency == descriptor.id {
                return Err(EnrichmentError::SelfDependency(descriptor.id.clone()));
            }
            let &d = index
                .get(&dependency)
                .ok_or_else(|| EnrichmentError::UnregisteredDependency {
                    enricher: descriptor.id.clone(),
                    dependency: dependency.clone(),
                })?;
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] > 0).collect();
        return Err(match find_cycle(&dependents, &stuck) {
            Some(cycle) => EnrichmentError::Cycle {
                path: cycle.into_iter().map(|i| nodes[i].id.clone()).collect(),
            },
            None => EnrichmentError::CycleAround(nodes[stuck[0]].id.clone()),
        });
    }

    Ok(order.into_iter().map(|i| nodes[i].id.clone()).collect())
}

/// Order every enricher in `universe`.
pub fn sort_all(universe: &DescriptorSet) -> EnrichmentResult<Vec<EnricherId>> {
    sort(universe, &universe.ids())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Depth-first search with colouring. Returns the first cycle found, with
/// its first node repeated at the end.
fn find_cycle(edges: &[Vec<usize>], starts: &[usize]) -> Option<Vec<usize>> {
    let mut colour = vec![Colour::White; edges.len()];
    let mut stack = Vec::new();
    starts.iter().find_map(|&start| {
        if colour[start] == Colour::White {
            visit(start, edges, &mut colour, &mut stack)
        } else {
            None
        }
    })
}

fn visit(node: usize, edges: &[Vec<usize>], colour: &mut [Colour], stack: &mut Vec<usize>) -> Option<Vec<usize>> {
    colour[node] = Colour::Grey;
    stack.push(node);
    for &next in &edges[node] {
        match colour[next] {
            Colour::Grey => {
                let from = stack.iter().position(|&n| n == next)?;
                let mut cycle = stack[from..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Colour::White => {
                if let Some(cycle) = visit(next, edges, colour, stack) {
                    return Some(cycle);
                }
            }
            Colour::Black => {}
        }
    }
    stack.pop();
    colour[node] = Colour::Black;
    None
}
