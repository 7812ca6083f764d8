mod common;

use common::{any, plus, schema, schema_with};
use covenant_model::{
    ErrorMode, ExtensionOptions, PropertyDefinition, Schema, SchemaError, SchemaOptions,
    Timestamps,
};
use pretty_assertions::assert_eq;

fn dependent(on: &[&'static str]) -> PropertyDefinition {
    PropertyDefinition::new()
        .dependent()
        .default(0)
        .depends_on(on.iter().copied())
        .resolver(plus(on[0], 1))
}

fn virtual_input() -> PropertyDefinition {
    PropertyDefinition::new().virtual_input().validator(any())
}

fn rejected<const N: usize>(definitions: [(&str, PropertyDefinition); N]) -> SchemaError {
    Schema::new(definitions, SchemaOptions::default()).expect_err("schema should be rejected")
}

// ── Cycles ──────────────────────────────────────────────────────

#[test]
fn mutual_dependency_is_reported_on_both_sides() {
    let err = rejected([("x", dependent(&["y"])), ("y", dependent(&["x"]))]);

    assert_eq!(err.reasons("x"), ["Circular dependency identified with 'y'"]);
    assert_eq!(err.reasons("y"), ["Circular dependency identified with 'x'"]);
}

#[test]
fn every_node_of_a_longer_cycle_is_named() {
    let err = rejected([
        ("a", dependent(&["b"])),
        ("b", dependent(&["c"])),
        ("c", dependent(&["a"])),
        ("root", PropertyDefinition::new().default(0)),
        ("tail", dependent(&["a", "root"])),
    ]);

    assert_eq!(
        err.reasons("a"),
        [
            "Circular dependency identified with 'b'",
            "Circular dependency identified with 'c'",
        ]
    );
    assert_eq!(
        err.reasons("b"),
        [
            "Circular dependency identified with 'a'",
            "Circular dependency identified with 'c'",
        ]
    );
    assert_eq!(
        err.reasons("c"),
        [
            "Circular dependency identified with 'a'",
            "Circular dependency identified with 'b'",
        ]
    );
    // Reads from the cycle without being on it.
    assert!(err.reasons("tail").is_empty());
}

#[test]
fn self_dependency_is_rejected() {
    let err = rejected([("a", dependent(&["a"]))]);
    assert_eq!(err.reasons("a"), ["A property cannot depend on itself"]);
}

// ── Targets ─────────────────────────────────────────────────────

#[test]
fn dependency_on_constant_is_rejected() {
    let err = rejected([
        ("c", PropertyDefinition::new().constant().value(1)),
        ("d", dependent(&["c"])),
    ]);
    assert_eq!(
        err.reasons("d"),
        ["A property cannot depend on a constant property: 'c'"]
    );
}

#[test]
fn dependency_on_unknown_property_is_rejected() {
    let err = rejected([("d", dependent(&["ghost"]))]);
    assert_eq!(
        err.reasons("d"),
        ["Cannot establish dependency with unknown property 'ghost'"]
    );
}

#[test]
fn dependency_on_a_rejected_property_still_resolves_the_name() {
    let err = rejected([
        ("a", PropertyDefinition::new().readonly()),
        ("d", dependent(&["a"])),
    ]);
    assert!(err.reasons("d").is_empty());
    assert_eq!(err.reasons("a"), ["Readonly properties must have a default value"]);
}

#[test]
fn reverse_index_lists_dependents() {
    let schema = schema([
        ("a", PropertyDefinition::new().default(0)),
        ("b", dependent(&["a"])),
        ("c", dependent(&["a", "b"])),
    ]);
    assert_eq!(schema.dependents_of("a"), ["b", "c"]);
    assert_eq!(schema.dependents_of("b"), ["c"]);
    assert!(schema.dependents_of("c").is_empty());
}

// ── Virtuals and aliases ────────────────────────────────────────

#[test]
fn unused_virtual_is_rejected() {
    let err = rejected([
        ("l", PropertyDefinition::new().default(1)),
        ("v", virtual_input()),
    ]);
    assert_eq!(
        err.reasons("v"),
        ["A virtual property must have at least one property that depends on it"]
    );
}

#[test]
fn alias_cannot_name_another_virtual() {
    let err = rejected([
        ("d", dependent(&["v1", "v2"])),
        ("v1", virtual_input().alias("v2")),
        ("v2", virtual_input()),
    ]);
    assert_eq!(
        err.reasons("v1"),
        ["'v2' cannot be used as an alias because it is a virtual property"]
    );
}

#[test]
fn alias_can_be_claimed_once() {
    let err = rejected([
        ("d", dependent(&["v1", "v2"])),
        ("v1", virtual_input().alias("x")),
        ("v2", virtual_input().alias("x")),
    ]);
    assert!(err.reasons("v1").is_empty());
    assert_eq!(err.reasons("v2"), ["Alias 'x' is already used by 'v1'"]);
}

#[test]
fn alias_cannot_shadow_an_unrelated_property() {
    let err = rejected([
        ("d", dependent(&["v"])),
        ("l", PropertyDefinition::new().default(1)),
        ("v", virtual_input().alias("l")),
    ]);
    assert_eq!(
        err.reasons("v"),
        ["'l' cannot be used as the alias of 'v' because it is a property that does not depend on it"]
    );
}

#[test]
fn alias_may_name_the_property_it_feeds() {
    let schema = schema([("d", dependent(&["v"])), ("v", virtual_input().alias("d"))]);
    assert_eq!(schema.virtuals().collect::<Vec<_>>(), ["v"]);
}

// ── Schema-level checks ─────────────────────────────────────────

#[test]
fn empty_schema_is_rejected() {
    let err = Schema::new(Vec::<(String, PropertyDefinition)>::new(), SchemaOptions::default())
        .unwrap_err();
    assert_eq!(err.reasons("schema"), ["A schema must have at least one property"]);
}

#[test]
fn timestamps_cannot_reuse_property_names() {
    let err = Schema::new(
        [("createdAt", PropertyDefinition::new().default(""))],
        SchemaOptions::new().timestamps(Timestamps::enabled()),
    )
    .unwrap_err();
    assert_eq!(
        err.reasons("timestamps"),
        ["'createdAt' is already a property of your schema"]
    );
}

#[test]
fn timestamps_must_differ() {
    let err = Schema::new(
        [("a", PropertyDefinition::new().default(""))],
        SchemaOptions::new().timestamps(Timestamps::named("at", "at")),
    )
    .unwrap_err();
    assert_eq!(err.reasons("timestamps"), ["createdAt & updatedAt cannot be the same"]);
}

// ── Extension ───────────────────────────────────────────────────

fn parent() -> Schema {
    schema_with(
        [
            ("a", PropertyDefinition::new().default(1)),
            ("b", dependent(&["a"])),
        ],
        SchemaOptions::new().errors(ErrorMode::Throw),
    )
}

#[test]
fn extend_overlays_child_definitions() {
    let child = parent()
        .extend(
            [
                ("a", PropertyDefinition::new().default(10).readonly()),
                ("c", PropertyDefinition::new().default(2)),
            ],
            ExtensionOptions::new(),
        )
        .unwrap();

    assert_eq!(child.properties().collect::<Vec<_>>(), ["a", "b", "c"]);
    assert_eq!(child.options().errors, ErrorMode::Throw);
    assert_eq!(
        child.category("a"),
        Some(covenant_model::Category::Readonly)
    );
}

#[test]
fn extend_can_remove_and_replace_options() {
    let child = parent()
        .extend(
            [("c", PropertyDefinition::new().default(2))],
            ExtensionOptions::new()
                .remove(["b", "not-there"])
                .with_options(SchemaOptions::new()),
        )
        .unwrap();

    assert_eq!(child.properties().collect::<Vec<_>>(), ["a", "c"]);
    assert_eq!(child.options().errors, ErrorMode::Silent);
}

#[test]
fn extend_revalidates_the_whole_schema() {
    let err = parent()
        .extend(
            Vec::<(String, PropertyDefinition)>::new(),
            ExtensionOptions::new().remove(["a"]),
        )
        .unwrap_err();
    assert_eq!(
        err.reasons("b"),
        ["Cannot establish dependency with unknown property 'a'"]
    );
}
