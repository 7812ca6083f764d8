mod common;

use common::{any, schema};
use covenant_model::{
    Category, Handler, Predicate, PropertyDefinition, Schema, SchemaOptions, Setter,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn reasons_for(definition: PropertyDefinition) -> Vec<String> {
    let err = Schema::new([("prop", definition)], SchemaOptions::default())
        .expect_err("definition should be rejected");
    err.reasons("prop").to_vec()
}

fn always() -> Predicate {
    Predicate::new(|_| Ok(true))
}

// ── Categories ──────────────────────────────────────────────────

#[test]
fn every_category_is_recognized() {
    let schema = schema([
        ("c", PropertyDefinition::new().constant().value(1)),
        (
            "d",
            PropertyDefinition::new()
                .dependent()
                .default(0)
                .depends_on(["l", "v"])
                .resolver(Setter::new(|_| Ok(1))),
        ),
        ("l", PropertyDefinition::new().default(0)),
        ("lr", PropertyDefinition::new().default(0).readonly_lax()),
        ("r", PropertyDefinition::new().default(0).readonly()),
        ("rq", PropertyDefinition::new().required().validator(any())),
        ("rb", PropertyDefinition::new().default(0).required_by(always())),
        (
            "rrb",
            PropertyDefinition::new()
                .default(0)
                .readonly()
                .required_by(always()),
        ),
        ("v", PropertyDefinition::new().virtual_input().validator(any())),
    ]);

    let expected = [
        ("c", Category::Constant),
        ("d", Category::Dependent),
        ("l", Category::Lax),
        ("lr", Category::Lax),
        ("r", Category::Readonly),
        ("rq", Category::Required),
        ("rb", Category::RequiredBy),
        ("rrb", Category::ReadonlyRequiredBy),
        ("v", Category::Virtual),
    ];
    for (name, category) in expected {
        assert_eq!(schema.category(name), Some(category), "category of {name}");
    }
    assert_eq!(schema.category("missing"), None);
    assert_eq!(
        schema.properties().collect::<Vec<_>>(),
        ["c", "d", "l", "lr", "r", "rb", "rq", "rrb"]
    );
    assert_eq!(schema.virtuals().collect::<Vec<_>>(), ["v"]);
}

#[test]
fn classification_is_stable_across_rebuilds() {
    let build = || {
        Schema::new(
            [
                ("a", PropertyDefinition::new().default(1)),
                ("b", PropertyDefinition::new().required().validator(any())),
            ],
            SchemaOptions::default(),
        )
        .unwrap()
    };
    let first = build();
    let second = build();
    for name in ["a", "b"] {
        assert_eq!(first.category(name), second.category(name));
    }
}

// ── Shape and vocabulary ────────────────────────────────────────

#[test]
fn non_object_definitions_are_rejected() {
    let err = Schema::from_json(json!({"a": [1], "b": 3}), SchemaOptions::default()).unwrap_err();
    assert_eq!(err.reasons("a"), ["Invalid property definition"]);
    assert_eq!(err.reasons("b"), ["Invalid property definition"]);
}

#[test]
fn unknown_rules_are_reported_each() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .default(1)
            .rule("colour", "red")
            .rule("size", json!(2)),
    );
    assert_eq!(
        reasons,
        ["'colour' is not a valid rule", "'size' is not a valid rule"]
    );
}

#[test]
fn literal_schema_from_json() {
    let schema = Schema::from_json(
        json!({
            "name": {"default": ""},
            "kind": {"constant": true, "value": "user"},
        }),
        SchemaOptions::default(),
    )
    .unwrap();
    assert_eq!(schema.category("name"), Some(Category::Lax));
    assert_eq!(schema.category("kind"), Some(Category::Constant));
}

// ── Constants ───────────────────────────────────────────────────

#[test]
fn constant_cannot_be_required() {
    let reasons = reasons_for(PropertyDefinition::new().constant().value(1).required());
    assert_eq!(
        reasons,
        ["Constant properties can only have ('constant' & 'value') or 'onDelete' | 'onSuccess'"]
    );
}

#[test]
fn constant_must_be_true() {
    let reasons = reasons_for(PropertyDefinition::new().rule("constant", false).value(1));
    assert_eq!(reasons, ["Constant properties must have constant as 'true'"]);
}

#[test]
fn constant_needs_a_value() {
    let reasons = reasons_for(PropertyDefinition::new().constant());
    assert_eq!(reasons, ["Constant properties must have a value or setter"]);
}

#[test]
fn constant_accepts_delete_and_success_handlers() {
    let schema = schema([(
        "c",
        PropertyDefinition::new()
            .constant()
            .value_with(Setter::new(|_| Ok("id")))
            .on_delete(Handler::new(|_| Ok(())))
            .on_success(Handler::new(|_| Ok(()))),
    )]);
    assert_eq!(schema.category("c"), Some(Category::Constant));
}

#[test]
fn value_without_constant_is_rejected() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).value(2));
    assert_eq!(reasons, ["Only constant properties can have 'value'"]);
}

// ── Dependents ──────────────────────────────────────────────────

#[test]
fn dependent_reports_every_missing_piece() {
    let reasons = reasons_for(PropertyDefinition::new().dependent());
    assert_eq!(
        reasons,
        [
            "Dependent properties must have a default value",
            "Dependent properties must depend on at least one property",
            "Dependent properties must have a resolver",
        ]
    );
}

#[test]
fn dependent_cannot_be_validated_or_required() {
    let err = Schema::new(
        [
            ("a", PropertyDefinition::new().default(1)),
            (
                "prop",
                PropertyDefinition::new()
                    .dependent()
                    .default(0)
                    .depends_on(["a"])
                    .resolver(Setter::new(|_| Ok(1)))
                    .validator(any())
                    .required(),
            ),
        ],
        SchemaOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.reasons("prop"),
        [
            "Dependent properties cannot be validated",
            "Dependent properties cannot be required",
        ]
    );
    assert!(err.reasons("a").is_empty());
}

#[test]
fn dependent_cannot_be_lax_or_gated() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .dependent()
            .default(0)
            .depends_on(["x"])
            .resolver(Setter::new(|_| Ok(1)))
            .readonly_lax()
            .should_init_when(always())
            .should_update(false),
    );
    assert_eq!(
        reasons,
        [
            "Dependent properties cannot be readonly 'lax'",
            "Dependent properties cannot have shouldInit rule",
            "Dependent properties cannot have shouldUpdate rule",
        ]
    );
}

#[test]
fn resolver_without_dependent_is_rejected() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .default(1)
            .resolver(Setter::new(|_| Ok(1)))
            .depends_on(["x"]),
    );
    assert_eq!(
        reasons,
        [
            "Only dependent properties can have 'dependsOn'",
            "Only dependent properties can have 'resolver'",
        ]
    );
}

// ── Readonly ────────────────────────────────────────────────────

#[test]
fn readonly_must_be_true_or_lax() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).rule("readonly", "yes"));
    assert_eq!(reasons, ["Readonly properties are either true | 'lax'"]);
}

#[test]
fn readonly_needs_a_default() {
    let reasons = reasons_for(PropertyDefinition::new().readonly());
    assert_eq!(reasons, ["Readonly properties must have a default value"]);
}

#[test]
fn strictly_readonly_is_required_only_by_function() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .readonly()
            .default(1)
            .required()
            .validator(any()),
    );
    assert_eq!(
        reasons,
        [
            "Strictly readonly properties are required only with a required function",
            "Strictly required properties cannot have a default value",
        ]
    );
}

#[test]
fn lax_cannot_block_initialization() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .readonly_lax()
            .default(1)
            .should_init(false),
    );
    assert_eq!(reasons, ["Lax properties cannot have initialization blocked"]);
}

#[test]
fn blocked_initialization_needs_a_default() {
    let reasons = reasons_for(PropertyDefinition::new().should_init(false).validator(any()));
    assert_eq!(
        reasons,
        ["A property that should not be initialized must have a default value"]
    );
}

// ── Required ────────────────────────────────────────────────────

#[test]
fn required_must_be_bool_or_function() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).rule("required", "yes"));
    assert_eq!(reasons, ["Required must be a boolean or a function"]);
}

#[test]
fn strictly_required_needs_a_validator() {
    let reasons = reasons_for(PropertyDefinition::new().required());
    assert_eq!(reasons, ["Strictly required properties must have a validator"]);
}

#[test]
fn strictly_required_cannot_be_lax_or_gated() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .required()
            .validator(any())
            .readonly_lax()
            .should_init_when(always()),
    );
    assert_eq!(
        reasons,
        [
            "Readonly properties must have a default value",
            "Strictly required properties cannot be readonly",
            "Strictly required properties cannot have shouldInit rule",
        ]
    );
}

#[test]
fn required_by_needs_a_default() {
    let reasons = reasons_for(PropertyDefinition::new().required_by(always()));
    assert_eq!(reasons, ["Callable required properties must have a default value"]);
}

#[test]
fn required_error_needs_a_required_function() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).required_error("missing"));
    assert_eq!(reasons, ["'requiredError' is only valid with a required function"]);
}

// ── Virtuals ────────────────────────────────────────────────────

#[test]
fn virtual_needs_a_validator() {
    let reasons = reasons_for(PropertyDefinition::new().virtual_input());
    assert_eq!(reasons, ["Virtuals must have a validator"]);
}

#[test]
fn virtual_rules_are_restricted() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .virtual_input()
            .validator(any())
            .default(1),
    );
    assert_eq!(
        reasons,
        ["Virtual properties can only have (alias, onFailure, onSuccess, required, requiredError, sanitizer, shouldInit, shouldUpdate, validator, virtual) as rules"]
    );
}

#[test]
fn virtual_alias_cannot_be_its_own_name() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .virtual_input()
            .validator(any())
            .alias("prop"),
    );
    assert_eq!(reasons, ["An alias cannot be the same as the virtual property"]);
}

#[test]
fn virtual_alias_must_not_be_blank() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .virtual_input()
            .validator(any())
            .alias("  "),
    );
    assert_eq!(reasons, ["An alias must be a string with at least 1 character"]);
}

#[test]
fn virtual_is_required_only_by_function() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .virtual_input()
            .validator(any())
            .required(),
    );
    assert_eq!(reasons, ["Virtuals can only be required by a function"]);
}

#[test]
fn alias_without_virtual_is_rejected() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).alias("p"));
    assert_eq!(reasons, ["Only virtual properties can have 'alias'"]);
}

// ── Handlers and gates ──────────────────────────────────────────

#[test]
fn failure_handlers_need_a_validator() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .default(1)
            .on_failure(Handler::new(|_| Ok(()))),
    );
    assert_eq!(
        reasons,
        ["'onFailure' can only be used with properties that support and have validators"]
    );
}

#[test]
fn empty_handler_lists_are_rejected() {
    let reasons = reasons_for(
        PropertyDefinition::new()
            .default(1)
            .rule("onSuccess", Vec::<Handler>::new()),
    );
    assert_eq!(
        reasons,
        ["'onSuccess' must be a function or a non-empty array of functions"]
    );
}

#[test]
fn gates_accept_only_false_or_a_function() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).should_update(true));
    assert_eq!(reasons, ["'shouldUpdate' must either be 'false' or a function"]);
}

#[test]
fn validator_must_be_callable() {
    let reasons = reasons_for(PropertyDefinition::new().default(1).rule("validator", true));
    assert_eq!(reasons, ["Invalid validator"]);
}

// ── Admissibility ───────────────────────────────────────────────

#[test]
fn property_must_land_in_a_category() {
    let reasons = reasons_for(PropertyDefinition::new().validator(any()));
    assert_eq!(
        reasons,
        ["A property should at least be readonly, required, or have a default value"]
    );
}

#[test]
fn reasons_accumulate_across_properties() {
    let err = Schema::new(
        [
            ("a", PropertyDefinition::new().required()),
            ("b", PropertyDefinition::new().readonly()),
            ("c", PropertyDefinition::new().default(1)),
        ],
        SchemaOptions::default(),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "Invalid Schema");
    let payload = err.payload().unwrap();
    assert_eq!(payload.keys().collect::<Vec<_>>(), ["a", "b"]);
}
