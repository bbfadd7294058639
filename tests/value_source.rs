mod common;

use std::collections::BTreeMap;

use common::*;
use protoslot::model::{DynamicModel, ScopeHints};
use protoslot::schema::{Schema, SchemaId, SlotDeclaration, ValueSourceDeclaration};
use protoslot::value::{Value, ValueType};
use protoslot::value_source::ValueSourceKind;
use protoslot::{CompileError, ProtoError, PrototypeCompiler};

const REFERRER: &str = "urn:test:referrer";
const INNER: &str = "urn:test:inner";
const TARGET: &str = "urn:test:target";

fn compiler() -> PrototypeCompiler {
    compiler_for(vec![
        Schema::new(REFERRER)
            .slot(SlotDeclaration::new("a", ValueType::model(INNER)).alias("alpha"))
            .slot(SlotDeclaration::new("size", ValueType::Integer))
            .slot(SlotDeclaration::new("meta", ValueType::Native { name: "meta".into() })),
        Schema::new(INNER).slot(SlotDeclaration::new("b", ValueType::Integer)),
        Schema::new(TARGET)
            .slot(SlotDeclaration::new("n", ValueType::Integer))
            .slot(SlotDeclaration::new("nums", ValueType::list(ValueType::Integer)))
            .slot(SlotDeclaration::new("label", ValueType::Text))
            .slot(SlotDeclaration::new("flag", ValueType::Boolean)),
    ])
}

fn source(compiler: &PrototypeCompiler, slot: &str, declaration: ValueSourceDeclaration) -> protoslot::value_source::ProtoValueSource {
    compiler
        .value_source(&TARGET.into(), slot, &REFERRER.into(), &declaration)
        .unwrap()
}

fn with_query(parameters: &[(&str, &str)]) -> ScopeHints {
    ScopeHints {
        query_parameters: parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

#[test]
fn referrer_path_walks_nested_models() {
    let compiler = compiler();
    let inner = DynamicModel::new(INNER).with_slot("b", 5).into_handle();
    let referrer = DynamicModel::new(REFERRER).with_slot("a", inner).with_slot("size", 3);

    let nested = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("a.b"));
    assert_eq!(nested.kind(), ValueSourceKind::ReferrerSlot);
    assert_eq!(nested.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::Integer(5)));

    let direct = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("size"));
    assert_eq!(direct.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::Integer(3)));

    let aliased = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("alpha.b"));
    assert_eq!(aliased.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::Integer(5)));
}

#[test]
fn broken_path_resolves_to_none() {
    let compiler = compiler();
    let nested = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("a.b"));

    let without_a = DynamicModel::new(REFERRER);
    assert_eq!(nested.resolve(compiler.syntax(), &without_a).unwrap(), None);

    let inner_without_b = DynamicModel::new(INNER).into_handle();
    let referrer = DynamicModel::new(REFERRER).with_slot("a", inner_without_b);
    assert_eq!(nested.resolve(compiler.syntax(), &referrer).unwrap(), None);

    let scalar = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("size.b"));
    let referrer = DynamicModel::new(REFERRER).with_slot("size", 3);
    assert_eq!(scalar.resolve(compiler.syntax(), &referrer).unwrap(), None, "scalars have no members");
}

#[test]
fn native_values_are_read_through_accessor_names() {
    let compiler = compiler();
    let meta = serde_json::json!({ "getCode": 7, "isActive": true, "label": "x" });
    let referrer = DynamicModel::new(REFERRER).with_slot("meta", Value::Native(meta));

    let code = source(&compiler, "n", ValueSourceDeclaration::referrer_slot("meta.code"));
    assert_eq!(code.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::Long(7)));
    let active = source(&compiler, "flag", ValueSourceDeclaration::referrer_slot("meta.active"));
    assert_eq!(active.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::Boolean(true)));
    let label = source(&compiler, "label", ValueSourceDeclaration::referrer_slot("meta.label"));
    assert_eq!(label.resolve(compiler.syntax(), &referrer).unwrap(), Some(Value::from("x")));
    let missing = source(&compiler, "label", ValueSourceDeclaration::referrer_slot("meta.nothing"));
    assert_eq!(missing.resolve(compiler.syntax(), &referrer).unwrap(), None);
}

#[test]
fn constants_are_coerced_once() {
    let compiler = compiler();
    let list = source(&compiler, "nums", ValueSourceDeclaration::constant("[1, 2, 3]"));
    let expected = Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    assert_eq!(list.constant(), Some(&expected));
    assert_eq!(
        list.resolve(compiler.syntax(), &DynamicModel::new(REFERRER)).unwrap(),
        Some(expected)
    );

    let empty = source(&compiler, "nums", ValueSourceDeclaration::constant("[]"));
    assert_eq!(empty.constant(), Some(&Value::List(Vec::new())));
    let blank = source(&compiler, "nums", ValueSourceDeclaration::constant("[ ]"));
    assert_eq!(blank.constant(), Some(&Value::List(Vec::new())));
}

#[test]
fn bad_constant_fails_construction() {
    let compiler = compiler();
    let result = compiler.value_source(
        &TARGET.into(),
        "n",
        &REFERRER.into(),
        &ValueSourceDeclaration::constant("twelve"),
    );
    assert!(matches!(result, Err(ProtoError::Coercion(_))));
}

#[test]
fn query_parameters_are_coerced_per_lookup() {
    let compiler = compiler();
    let parameter = source(&compiler, "nums", ValueSourceDeclaration::query_parameter("ids"));

    let present = DynamicModel::new(REFERRER).with_hints(with_query(&[("ids", "[4,5]")]));
    assert_eq!(
        parameter.resolve(compiler.syntax(), &present).unwrap(),
        Some(Value::List(vec![Value::Integer(4), Value::Integer(5)]))
    );

    let absent = DynamicModel::new(REFERRER);
    assert_eq!(parameter.resolve(compiler.syntax(), &absent).unwrap(), None);

    let malformed = DynamicModel::new(REFERRER).with_hints(with_query(&[("ids", "[4,x]")]));
    assert!(matches!(
        parameter.resolve(compiler.syntax(), &malformed),
        Err(ProtoError::Coercion(_))
    ));
}

#[test]
fn unknown_slots_fail_construction() {
    let compiler = compiler();
    match compiler.value_source(
        &TARGET.into(),
        "missing",
        &REFERRER.into(),
        &ValueSourceDeclaration::constant("1"),
    ) {
        Err(ProtoError::Compile(CompileError::UnknownReferenceSlot { schema, slot })) => {
            assert_eq!(schema, SchemaId::from(TARGET));
            assert_eq!(slot, "missing");
        }
        other => panic!("expected UnknownReferenceSlot, got {:?}", other),
    }
    assert!(matches!(
        compiler.value_source(
            &TARGET.into(),
            "n",
            &REFERRER.into(),
            &ValueSourceDeclaration::referrer_slot("nope.b"),
        ),
        Err(ProtoError::Compile(CompileError::UnknownReferrerSlot { .. }))
    ));
    assert!(matches!(
        compiler.value_source(
            &TARGET.into(),
            "n",
            &REFERRER.into(),
            &ValueSourceDeclaration::referrer_slot("a..b"),
        ),
        Err(ProtoError::Compile(CompileError::UnknownReferrerSlot { .. }))
    ));
}
