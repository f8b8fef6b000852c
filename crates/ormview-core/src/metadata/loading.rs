//! Loading order merging.

use std::collections::{BTreeSet, HashMap};

/// Merge several partial orders into one total order.
///
/// Each partial order contributes an edge between consecutive names. Names
/// are emitted once all their predecessors are emitted; ties go to the name
/// seen first. A cycle is broken by emitting the earliest remaining name.
pub(crate) fn merge_orders(orders: &[Vec<String>]) -> Vec<String> {
    let mut names: Vec<&str> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for order in orders {
        for name in order {
            if !position.contains_key(name.as_str()) {
                position.insert(name, names.len());
                names.push(name);
            }
        }
    }

    let mut predecessors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); names.len()];
    for order in orders {
        for pair in order.windows(2) {
            let (from, to) = (position[pair[0].as_str()], position[pair[1].as_str()]);
            if from != to {
                predecessors[to].insert(from);
            }
        }
    }

    let mut emitted = vec![false; names.len()];
    let mut result = Vec::with_capacity(names.len());
    while result.len() < names.len() {
        let ready = (0..names.len())
            .find(|&i| !emitted[i] && predecessors[i].iter().all(|&p| emitted[p]));
        let next = match ready {
            Some(i) => i,
            None => match (0..names.len()).find(|&i| !emitted[i]) {
                Some(i) => i,
                None => break,
            },
        };
        emitted[next] = true;
        result.push(names[next].to_string());
    }

    result
}

/// Put `properties` named in `order` first, in that order, then the rest
/// sorted by name.
pub(crate) fn sort_by_order(order: &[String], properties: &[String]) -> Vec<String> {
    let mut remaining: Vec<&String> = properties.iter().collect();
    remaining.sort();
    remaining.dedup();

    let mut result = Vec::with_capacity(remaining.len());
    for name in order {
        if let Ok(index) = remaining.binary_search(&name) {
            result.push(remaining.remove(index).clone());
        }
    }
    result.extend(remaining.into_iter().cloned());
    result
}
