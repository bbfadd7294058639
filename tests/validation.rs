mod common;

use common::*;
use protoslot::model::{DynamicModel, Model};
use protoslot::schema::{Schema, SlotDeclaration};
use protoslot::value::{Value, ValueType};
use protoslot::{ProtoError, ValidationError};

#[test]
fn integer_range_and_divisor() {
    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let count = counter.slot("count").unwrap().as_property().unwrap();

    assert!(
        matches!(
            count.validate(&Value::Integer(10)),
            Err(ValidationError::AboveMaximum { exclusive: true, .. })
        ),
        "maximum is exclusive"
    );
    assert!(count.validate(&Value::Integer(0)).is_ok(), "minimum is inclusive");
    assert!(matches!(
        count.validate(&Value::Integer(3)),
        Err(ValidationError::NotDivisible { .. })
    ));
    assert!(matches!(
        count.validate(&Value::Integer(-2)),
        Err(ValidationError::BelowMinimum { exclusive: false, .. })
    ));
    assert!(count.validate(&Value::Integer(4)).is_ok());
}

#[test]
fn violations_name_the_slot_and_bound() {
    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let count = counter.slot("count").unwrap().as_property().unwrap();
    match count.validate(&Value::Integer(12)) {
        Err(ValidationError::AboveMaximum { slot, value, maximum, .. }) => {
            assert_eq!(slot, "count");
            assert_eq!(value, "12");
            assert_eq!(maximum, "10");
        }
        other => panic!("expected AboveMaximum, got {:?}", other),
    }
    let message = count.validate(&Value::Integer(10)).unwrap_err().to_string();
    assert!(message.contains("count") && message.contains("exclusive maximum 10"), "{}", message);
}

#[test]
fn text_length_and_disallowed_values() {
    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let code = counter.slot("code").unwrap().as_property().unwrap();

    assert!(code.validate(&Value::from("ab")).is_ok());
    assert!(matches!(
        code.validate(&Value::from("a")),
        Err(ValidationError::TooShort { length: 1, min_length: 2, .. })
    ));
    assert!(matches!(
        code.validate(&Value::from("abcde")),
        Err(ValidationError::TooLong { length: 5, max_length: 4, .. })
    ));
    assert!(
        matches!(code.validate(&Value::from("root")), Err(ValidationError::Disallowed { .. })),
        "disallowed values are rejected before any other check"
    );
    assert!(matches!(
        code.validate(&Value::Integer(1)),
        Err(ValidationError::TypeMismatch { .. })
    ));
}

#[test]
fn double_range_and_remainder() {
    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let ratio = counter.slot("ratio").unwrap().as_property().unwrap();

    assert!(ratio.validate(&Value::Double(0.75)).is_ok());
    assert!(ratio.validate(&Value::Double(1.0)).is_ok(), "maximum is inclusive");
    assert!(matches!(
        ratio.validate(&Value::Double(0.0)),
        Err(ValidationError::BelowMinimum { exclusive: true, .. })
    ));
    assert!(matches!(
        ratio.validate(&Value::Double(0.3)),
        Err(ValidationError::NotDivisible { .. })
    ));
    assert!(matches!(
        ratio.validate(&Value::Double(1.25)),
        Err(ValidationError::AboveMaximum { .. })
    ));
}

#[test]
fn integer_slots_refuse_longs_outside_i32() {
    let compiler = compiler_for(lineage());
    let employee = compiler.get_prototype(&EMPLOYEE.into()).unwrap();
    assert!(matches!(
        employee.validate_write("age", &Value::Long(10_000_000_000)),
        Err(ValidationError::TypeMismatch { ref slot, .. }) if slot == "age"
    ));
    assert!(matches!(
        employee.validate_write("age", &Value::Long(i64::from(i32::MIN) - 1)),
        Err(ValidationError::TypeMismatch { .. })
    ));
    assert_eq!(employee.validate_write("age", &Value::Long(42)).unwrap(), "age");
    assert_eq!(employee.validate_write("badge", &Value::Long(10_000_000_000)).unwrap(), "badge");

    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let mut model = DynamicModel::from_prototype(&counter);
    assert!(model.set_slot(&counter, "count", Value::Long(1 << 40)).is_err());
    assert_eq!(model.slot_value("count"), None);
}

#[test]
fn unconstrained_types_pass() {
    let compiler = compiler_for(vec![counter(), item()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let enabled = counter.slot("enabled").unwrap().as_property().unwrap();
    assert!(enabled.validate(&Value::Boolean(false)).is_ok());
    let item = compiler.get_prototype(&ITEM.into()).unwrap();
    let tags = item.slot("tags").unwrap().as_property().unwrap();
    assert!(tags.validate(&Value::List(vec![Value::from("a")])).is_ok());
}

#[test]
fn write_gate_resolves_aliases_and_rejects_non_properties() {
    let compiler = compiler_for(lineage());
    let person = compiler.get_prototype(&PERSON.into()).unwrap();
    assert_eq!(person.validate_write("label", &Value::from("Ada")).unwrap(), "name");
    assert!(matches!(
        person.validate_write("nickname", &Value::from("x")),
        Err(ValidationError::UnknownSlot { .. })
    ));

    let shop = shop();
    let order = shop.get_prototype(&ORDER.into()).unwrap();
    assert!(matches!(
        order.validate_write("items", &Value::List(Vec::new())),
        Err(ValidationError::NotWritable { kind: "collection", .. })
    ));
    assert!(matches!(
        order.validate_write("customerLink", &Value::Link("/c/1".into())),
        Err(ValidationError::NotWritable { kind: "link", .. })
    ));
}

#[test]
fn read_only_schema_refuses_writes() {
    let compiler = compiler_for(vec![
        Schema::new("urn:frozen")
            .read_only()
            .slot(SlotDeclaration::new("value", ValueType::Text)),
    ]);
    let frozen = compiler.get_prototype(&"urn:frozen".into()).unwrap();
    assert!(frozen.is_read_only());
    assert!(matches!(
        frozen.validate_write("value", &Value::from("x")),
        Err(ValidationError::ReadOnly { .. })
    ));
}

#[test]
fn dynamic_model_seeds_defaults_and_validates_writes() {
    let compiler = compiler_for(vec![counter()]);
    let counter = compiler.get_prototype(&COUNTER.into()).unwrap();
    let mut model = DynamicModel::from_prototype(&counter);
    assert_eq!(model.slot_value("enabled"), Some(Value::Boolean(true)));
    assert_eq!(model.slot_value("count"), None);

    model.set_slot(&counter, "count", Value::Integer(6)).unwrap();
    assert_eq!(model.slot_value("count"), Some(Value::Integer(6)));
    match model.set_slot(&counter, "count", Value::Integer(7)) {
        Err(ProtoError::Validation(ValidationError::NotDivisible { slot, .. })) => assert_eq!(slot, "count"),
        other => panic!("expected NotDivisible, got {:?}", other),
    }
    assert_eq!(model.slot_value("count"), Some(Value::Integer(6)), "rejected writes leave the model unchanged");
}
