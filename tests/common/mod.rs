#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::Arc;

use protoslot::compiler::PrototypeCompiler;
use protoslot::model::{Model, ModelHandle};
use protoslot::schema::{
    CollectionDeclaration, Constraints, CriterionDeclaration, LinkDeclaration, Method, Schema, SchemaKeeper,
    SlotDeclaration, ValueSourceDeclaration,
};
use protoslot::search::{ComparisonOperator, SearchCriteria, SearchCriterion, SearchExecutor};
use protoslot::value::{Value, ValueType};

pub const THING: &str = "urn:test:thing";
pub const PERSON: &str = "urn:test:person";
pub const EMPLOYEE: &str = "urn:test:employee";
pub const ITEM: &str = "urn:test:item";
pub const ORDER: &str = "urn:test:order";
pub const CUSTOMER: &str = "urn:test:customer";
pub const COUNTER: &str = "urn:test:counter";

pub fn compiler_for(schemas: Vec<Schema>) -> PrototypeCompiler {
    let keeper = SchemaKeeper::new();
    for schema in schemas {
        keeper.keep(schema).unwrap();
    }
    PrototypeCompiler::new(Arc::new(keeper))
}

/// thing <- person <- employee, each adding slots and a key
pub fn lineage() -> Vec<Schema> {
    vec![
        Schema::new(THING)
            .slot(SlotDeclaration::new("id", ValueType::Text))
            .slot(SlotDeclaration::new("name", ValueType::Text).alias("label").searchable())
            .key("id"),
        Schema::new(PERSON)
            .extends(THING)
            .slot(SlotDeclaration::new("email", ValueType::Text))
            .slot(SlotDeclaration::new("age", ValueType::Integer))
            .key("email")
            .comparable("age"),
        Schema::new(EMPLOYEE)
            .extends(PERSON)
            .slot(SlotDeclaration::new("badge", ValueType::Long))
            .key("badge")
            .key("id"),
    ]
}

/// min 0 inclusive, max 10 exclusive, divisor 2
pub fn counter() -> Schema {
    Schema::new(COUNTER)
        .slot(SlotDeclaration::new("count", ValueType::Integer).constraints(Constraints {
            minimum: Some("0".into()),
            maximum: Some("10".into()),
            exclusive_maximum: true,
            divisor: Some("2".into()),
            ..Default::default()
        }))
        .slot(
            SlotDeclaration::new("code", ValueType::Text).constraints(Constraints {
                min_length: Some(2),
                max_length: Some(4),
                disallowed: vec!["root".into()],
                ..Default::default()
            }),
        )
        .slot(SlotDeclaration::new("ratio", ValueType::Double).constraints(Constraints {
            minimum: Some("0".into()),
            exclusive_minimum: true,
            maximum: Some("1".into()),
            divisor: Some("0.25".into()),
            ..Default::default()
        }))
        .slot(SlotDeclaration::new("enabled", ValueType::Boolean).default_value("true"))
}

pub fn item() -> Schema {
    Schema::new(ITEM)
        .slot(SlotDeclaration::new("id", ValueType::Text))
        .slot(SlotDeclaration::new("name", ValueType::Text).searchable())
        .slot(SlotDeclaration::new("category", ValueType::Text))
        .slot(SlotDeclaration::new("owner", ValueType::Text))
        .slot(SlotDeclaration::new("price", ValueType::Double))
        .slot(SlotDeclaration::new("tags", ValueType::list(ValueType::Text)))
        .link(LinkDeclaration::new("self", "self", Method::Get))
        .key("id")
}

/// An order whose `items` collection declares two AND criteria and one OR criterion.
pub fn order() -> Schema {
    Schema::new(ORDER)
        .slot(SlotDeclaration::new("id", ValueType::Text))
        .slot(SlotDeclaration::new("customer", ValueType::Text))
        .slot(SlotDeclaration::new("buyer", ValueType::model(CUSTOMER)))
        .slot(
            SlotDeclaration::new("items", ValueType::list_of_models(ITEM)).collection(
                CollectionDeclaration::default()
                    .and(CriterionDeclaration::new(
                        "category",
                        ComparisonOperator::Equal,
                        ValueSourceDeclaration::constant("books"),
                    ))
                    .and(CriterionDeclaration::new(
                        "owner",
                        ComparisonOperator::Equal,
                        ValueSourceDeclaration::referrer_slot("customer"),
                    ))
                    .or(CriterionDeclaration::new(
                        "name",
                        ComparisonOperator::Regex,
                        ValueSourceDeclaration::query_parameter("q"),
                    ))
                    .limit(5)
                    .relation("items"),
            ),
        )
        .link(
            LinkDeclaration::new("customerLink", "customer", Method::Get)
                .response(ValueType::model(CUSTOMER))
                .bind("id", ValueSourceDeclaration::referrer_slot("customer"))
                .bind("region", ValueSourceDeclaration::query_parameter("region")),
        )
        .key("id")
}

pub fn customer() -> Schema {
    Schema::new(CUSTOMER)
        .slot(SlotDeclaration::new("id", ValueType::Text))
        .slot(SlotDeclaration::new("region", ValueType::Text))
        .slot(SlotDeclaration::new("address", ValueType::Native { name: "address".into() }))
        .key("id")
}

pub fn shop() -> PrototypeCompiler {
    compiler_for(vec![item(), order(), customer()])
}

/// Runs criteria over an in-memory list of models.
pub struct MemoryExecutor {
    pub models: Vec<ModelHandle>,
}

impl MemoryExecutor {
    fn matches(model: &ModelHandle, criterion: &SearchCriterion) -> bool {
        let actual = model.slot_value(criterion.reference_slot());
        match criterion.operator() {
            ComparisonOperator::Exists => actual.is_some(),
            ComparisonOperator::NotExists => actual.is_none(),
            ComparisonOperator::Regex => match (actual.as_ref().and_then(Value::as_text), criterion.regex()) {
                (Some(text), Some(regex)) => regex.is_match(text),
                _ => false,
            },
            operator => {
                let (Some(actual), Some(expected)) = (actual, criterion.value()) else {
                    return false;
                };
                let ordering = actual
                    .compare_numeric(expected)
                    .or_else(|| Some(actual.as_text()?.cmp(expected.as_text()?)));
                match operator {
                    ComparisonOperator::Equal => actual == *expected,
                    ComparisonOperator::NotEqual => actual != *expected,
                    ComparisonOperator::LessThan => ordering == Some(Ordering::Less),
                    ComparisonOperator::LessThanOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    ComparisonOperator::GreaterThan => ordering == Some(Ordering::Greater),
                    ComparisonOperator::GreaterThanOrEqual => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    _ => false,
                }
            }
        }
    }
}

impl SearchExecutor for MemoryExecutor {
    fn execute(&self, criteria: &SearchCriteria) -> protoslot::Result<Vec<ModelHandle>> {
        let limit = criteria.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(self
            .models
            .iter()
            .filter(|model| model.schema_id() == criteria.reference_schema_id())
            .filter(|model| criteria.and().iter().all(|c| Self::matches(model, c)))
            .filter(|model| criteria.or().is_empty() || criteria.or().iter().any(|c| Self::matches(model, c)))
            .take(limit)
            .cloned()
            .collect())
    }
}
