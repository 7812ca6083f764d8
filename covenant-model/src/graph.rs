//! Dependency graph and integrity checks.
//!
//! Built once, after every property has been classified on its own. Errors
//! are accumulated per offending property; the graph is only usable when the
//! collector stayed empty.

use crate::classify::ClassifiedProperty;
use crate::definition::{Definitions, PropertyDefinition, Rule, rules};
use covenant_types::ErrorCollector;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reverse adjacency of the dependents, the alias map, and a resolution order.
#[derive(Debug, Clone, Default)]
pub(crate) struct DependencyGraph {
    /// `target -> dependents that re-resolve when target changes`, sorted.
    dependents_of: BTreeMap<String, Vec<String>>,
    /// `alias -> virtual`.
    aliases: BTreeMap<String, String>,
    /// Every dependent, each after all the dependents it reads from.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph from accepted properties, checking it against the raw
    /// definitions (so rejected neighbours still count as declared).
    pub(crate) fn build(
        definitions: &Definitions,
        properties: &BTreeMap<String, ClassifiedProperty>,
        virtuals: &BTreeMap<String, ClassifiedProperty>,
        errors: &mut ErrorCollector,
    ) -> Self {
        let dependents: BTreeMap<&str, &[String]> = properties
            .values()
            .filter(|p| !p.depends_on().is_empty())
            .map(|p| (p.name.as_str(), p.depends_on()))
            .collect();

        let mut dependents_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (&name, targets) in &dependents {
            for target in targets.iter() {
                if target == name {
                    errors.add(name, "A property cannot depend on itself");
                    continue;
                }
                match definitions.get(target) {
                    None => {
                        errors.add(
                            name,
                            format!("Cannot establish dependency with unknown property '{target}'"),
                        );
                    }
                    Some(def) if def.has(rules::CONSTANT) => {
                        errors.add(
                            name,
                            format!("A property cannot depend on a constant property: '{target}'"),
                        );
                    }
                    Some(_) => dependents_of
                        .entry(target.clone())
                        .or_default()
                        .push(name.to_string()),
                }
            }
        }

        for (name, cycle_members) in find_cycles(&dependents) {
            for member in cycle_members {
                errors.add(name, format!("Circular dependency identified with '{member}'"));
            }
        }

        for name in virtuals.keys() {
            let depended_on = definitions
                .values()
                .any(|def| def.has(rules::DEPENDENT) && raw_depends_on(def).contains(name));
            if !depended_on {
                errors.add(
                    name,
                    "A virtual property must have at least one property that depends on it",
                );
            }
        }

        let aliases = check_aliases(definitions, virtuals, errors);

        let order = if errors.is_payload_loaded() {
            Vec::new()
        } else {
            resolution_order(&dependents)
        };

        Self {
            dependents_of,
            aliases,
            order,
        }
    }

    /// Dependents that must re-resolve when `name` changes.
    pub(crate) fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents_of.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The virtual an alias stands for.
    pub(crate) fn virtual_for_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub(crate) fn order(&self) -> &[String] {
        &self.order
    }
}

/// `dependsOn` as written, before classification normalized it.
fn raw_depends_on(def: &PropertyDefinition) -> Vec<String> {
    match def.get(rules::DEPENDS_ON).and_then(Rule::literal) {
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// For every dependent `a`, the nodes other than `a` that lie on a cycle
/// through `a`: reachable from `a`, and reaching back to it.
fn find_cycles<'a>(
    dependents: &BTreeMap<&'a str, &'a [String]>,
) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
    let reach: BTreeMap<&str, BTreeSet<&str>> = dependents
        .keys()
        .map(|&name| (name, reachable_from(name, dependents)))
        .collect();

    let mut cycles = BTreeMap::new();
    for (&name, reachable) in &reach {
        let members: BTreeSet<&str> = reachable
            .iter()
            .copied()
            .filter(|&other| other != name)
            .filter(|other| reach.get(other).is_some_and(|r| r.contains(name)))
            .collect();
        if !members.is_empty() {
            cycles.insert(name, members);
        }
    }
    cycles
}

/// Depth-first walk over `dependsOn` edges, ignoring self-edges.
fn reachable_from<'a>(
    start: &'a str,
    dependents: &BTreeMap<&'a str, &'a [String]>,
) -> BTreeSet<&'a str> {
    let mut visited = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        let Some(&targets) = dependents.get(node) else {
            continue;
        };
        for target in targets {
            let target = target.as_str();
            if target != node && visited.insert(target) {
                stack.push(target);
            }
        }
    }
    visited
}

/// Kahn's algorithm over the dependents, ties broken by name.
fn resolution_order(dependents: &BTreeMap<&str, &[String]>) -> Vec<String> {
    let mut pending: BTreeMap<&str, usize> = dependents
        .iter()
        .map(|(&name, targets)| {
            let upstream = targets
                .iter()
                .filter(|t| t.as_str() != name && dependents.contains_key(t.as_str()))
                .count();
            (name, upstream)
        })
        .collect();

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(&name, _)| name)
        .collect();

    let mut order = Vec::with_capacity(dependents.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for (&other, targets) in dependents {
            if other == name || !targets.iter().any(|t| t == name) {
                continue;
            }
            if let Some(count) = pending.get_mut(other) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(other);
                }
            }
        }
    }
    order
}

fn check_aliases(
    definitions: &Definitions,
    virtuals: &BTreeMap<String, ClassifiedProperty>,
    errors: &mut ErrorCollector,
) -> BTreeMap<String, String> {
    let mut aliases: BTreeMap<String, String> = BTreeMap::new();
    for (name, property) in virtuals {
        let Some(alias) = property.alias() else {
            continue;
        };

        let claimed = definitions.get(alias);
        if claimed.is_some_and(|def| def.has(rules::VIRTUAL)) {
            errors.add(
                name,
                format!("'{alias}' cannot be used as an alias because it is a virtual property"),
            );
            continue;
        }
        if let Some(owner) = aliases.get(alias) {
            errors.add(name, format!("Alias '{alias}' is already used by '{owner}'"));
            continue;
        }
        if claimed.is_some_and(|def| !raw_depends_on(def).contains(name)) {
            errors.add(
                name,
                format!(
                    "'{alias}' cannot be used as the alias of '{name}' because it is a property that does not depend on it"
                ),
            );
            continue;
        }
        aliases.insert(alias.to_string(), name.clone());
    }
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges<'a>(pairs: &'a [(&'a str, Vec<String>)]) -> BTreeMap<&'a str, &'a [String]> {
        pairs.iter().map(|(n, t)| (*n, t.as_slice())).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn order_respects_dependencies() {
        let pairs = [
            ("c", names(&["b"])),
            ("b", names(&["a", "x"])),
            ("a", names(&["x"])),
        ];
        assert_eq!(resolution_order(&edges(&pairs)), ["a", "b", "c"]);
    }

    #[test]
    fn order_breaks_ties_by_name() {
        let pairs = [("z", names(&["x"])), ("m", names(&["x"])), ("a", names(&["z"]))];
        assert_eq!(resolution_order(&edges(&pairs)), ["m", "z", "a"]);
    }

    #[test]
    fn every_cycle_member_is_named() {
        let pairs = [
            ("a", names(&["b"])),
            ("b", names(&["c"])),
            ("c", names(&["a"])),
            ("d", names(&["a"])),
        ];
        let cycles = find_cycles(&edges(&pairs));

        assert_eq!(cycles["a"], BTreeSet::from(["b", "c"]));
        assert_eq!(cycles["b"], BTreeSet::from(["a", "c"]));
        assert_eq!(cycles["c"], BTreeSet::from(["a", "b"]));
        assert!(!cycles.contains_key("d"));
    }

    #[test]
    fn self_edges_are_not_cycles() {
        let pairs = [("a", names(&["a", "x"]))];
        assert!(find_cycles(&edges(&pairs)).is_empty());
    }
}
