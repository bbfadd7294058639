//! Compiled slot descriptors.
//!
//! Every slot of a prototype is one of three kinds:
//! * [`PropertySlot`] – a plain value with optional write constraints.
//! * [`CollectionPropertySlot`] – a list of models populated by a search
//!   built from declared criteria.
//! * [`LinkSlot`] – a hyperlink with an interaction method and optional
//!   request/response schemas.
//!
//! Slots are immutable once built. The search criteria of a collection and the
//! bindings of a link are computed on first use and kept in a `OnceLock`,
//! since they need the referenced prototype, which may be the owning one.

use tracing::debug;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use crate::compiler::PrototypeCompiler;
use crate::error::{CompileError, Result, ValidationError};
use crate::model::Model;
use crate::schema::{
    CollectionDeclaration, CriterionDeclaration, LinkDeclaration, Method, SchemaId, SlotDeclaration,
    ValueSourceDeclaration,
};
use crate::search::ProtoSearchCriteria;
use crate::syntax::{Syntax, coerce};
use crate::value::{Value, ValueType};
use crate::value_source::ProtoValueSource;

// ------------- Slot Kind -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKind {
    Property,
    CollectionProperty,
    Link,
}

impl SlotKind {
    pub fn name(&self) -> &'static str {
        match self {
            SlotKind::Property => "property",
            SlotKind::CollectionProperty => "collection",
            SlotKind::Link => "link",
        }
    }
}
impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ------------- Slot Base -------------
/// What every slot kind shares.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotBase {
    name: String,
    owner: SchemaId,
    declaring: SchemaId,
    value_type: ValueType,
    title: String,
    description: String,
    aliases: BTreeSet<String>,
}

impl SlotBase {
    pub(crate) fn new(
        name: &str,
        owner: &SchemaId,
        declaring: &SchemaId,
        value_type: ValueType,
        title: &str,
        description: &str,
        aliases: &[String],
    ) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.clone(),
            declaring: declaring.clone(),
            value_type,
            title: title.to_string(),
            description: description.to_string(),
            aliases: aliases.iter().cloned().collect(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Aliases resolve to their slot, so a table entry is always its own real name.
    pub fn real_name(&self) -> &str {
        &self.name
    }
    /// The prototype this slot was compiled into.
    pub fn owner(&self) -> &SchemaId {
        &self.owner
    }
    /// The schema (the owner or one of its ancestors) that declared the slot.
    pub fn declaring(&self) -> &SchemaId {
        &self.declaring
    }
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }
}

// ------------- Proto Slot -------------
#[derive(Debug)]
pub enum ProtoSlot {
    Property(PropertySlot),
    CollectionProperty(CollectionPropertySlot),
    Link(LinkSlot),
}

impl ProtoSlot {
    pub fn base(&self) -> &SlotBase {
        match self {
            ProtoSlot::Property(slot) => &slot.base,
            ProtoSlot::CollectionProperty(slot) => &slot.base,
            ProtoSlot::Link(slot) => &slot.base,
        }
    }
    pub fn kind(&self) -> SlotKind {
        match self {
            ProtoSlot::Property(_) => SlotKind::Property,
            ProtoSlot::CollectionProperty(_) => SlotKind::CollectionProperty,
            ProtoSlot::Link(_) => SlotKind::Link,
        }
    }
    pub fn name(&self) -> &str {
        self.base().name()
    }
    pub fn value_type(&self) -> &ValueType {
        self.base().value_type()
    }
    pub fn as_property(&self) -> Option<&PropertySlot> {
        match self {
            ProtoSlot::Property(slot) => Some(slot),
            _ => None,
        }
    }
    pub fn as_collection(&self) -> Option<&CollectionPropertySlot> {
        match self {
            ProtoSlot::CollectionProperty(slot) => Some(slot),
            _ => None,
        }
    }
    pub fn as_link(&self) -> Option<&LinkSlot> {
        match self {
            ProtoSlot::Link(slot) => Some(slot),
            _ => None,
        }
    }
    fn ordering_key(&self) -> (SlotKind, &str, &ValueType, &SchemaId, &SchemaId) {
        let base = self.base();
        (self.kind(), &base.name, &base.value_type, &base.owner, &base.declaring)
    }
}

// total order for deterministic enumeration: kind, name, type, owner, declarer
impl Ord for ProtoSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering_key().cmp(&other.ordering_key())
    }
}
impl PartialOrd for ProtoSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for ProtoSlot {
    fn eq(&self, other: &Self) -> bool {
        self.ordering_key() == other.ordering_key()
    }
}
impl Eq for ProtoSlot {}

// ------------- Property Slot -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub exclusive: bool,
}

#[derive(Debug, Clone)]
pub struct PropertySlot {
    base: SlotBase,
    default: Option<Value>,
    minimum: Option<Bound>,
    maximum: Option<Bound>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_size: Option<usize>,
    max_size: Option<usize>,
    divisor: Option<Value>,
    disallowed: Vec<Value>,
    searchable: bool,
    link_binding: Option<String>,
}

impl PropertySlot {
    pub(crate) fn compile(base: SlotBase, declaration: &SlotDeclaration, syntax: &dyn Syntax) -> Result<Self> {
        let constraints = &declaration.constraints;
        let value_type = base.value_type.clone();
        let (owner, slot_name) = (base.owner.clone(), base.name.clone());
        let invalid = |reason: String| CompileError::InvalidConstraint {
            schema: owner.clone(),
            slot: slot_name.clone(),
            reason,
        };
        let numeric = |text: &Option<String>, what: &str| -> Result<Option<Value>> {
            match text {
                None => Ok(None),
                Some(_) if !value_type.is_numeric() => {
                    Err(invalid(format!("{} needs a numeric slot, not {}", what, value_type)).into())
                }
                Some(text) => Ok(Some(coerce(syntax, text, &value_type)?)),
            }
        };

        let minimum = numeric(&constraints.minimum, "minimum")?.map(|value| Bound {
            value,
            exclusive: constraints.exclusive_minimum,
        });
        let maximum = numeric(&constraints.maximum, "maximum")?.map(|value| Bound {
            value,
            exclusive: constraints.exclusive_maximum,
        });
        if let (Some(min), Some(max)) = (&minimum, &maximum) {
            if min.value.compare_numeric(&max.value) == Some(Ordering::Greater) {
                return Err(invalid(format!("minimum {} exceeds maximum {}", min.value, max.value)).into());
            }
        }
        let divisor = numeric(&constraints.divisor, "divisor")?;
        if let Some(d) = &divisor {
            if d.as_f64() == Some(0.0) {
                return Err(invalid("divisor cannot be zero".to_string()).into());
            }
        }
        if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
            if min > max {
                return Err(invalid(format!("min length {} exceeds max length {}", min, max)).into());
            }
        }
        if let (Some(min), Some(max)) = (constraints.min_size, constraints.max_size) {
            if min > max {
                return Err(invalid(format!("min size {} exceeds max size {}", min, max)).into());
            }
        }
        let disallowed = constraints
            .disallowed
            .iter()
            .map(|text| coerce(syntax, text, &value_type))
            .collect::<std::result::Result<Vec<Value>, _>>()?;

        let mut slot = Self {
            default: None,
            minimum,
            maximum,
            min_length: constraints.min_length,
            max_length: constraints.max_length,
            min_size: constraints.min_size,
            max_size: constraints.max_size,
            divisor,
            disallowed,
            searchable: declaration.searchable,
            link_binding: declaration.link_binding.clone(),
            base,
        };
        if let Some(text) = &declaration.default {
            let default = coerce(syntax, text, &value_type)?;
            // a default that could never be written is a broken declaration
            if let Err(e) = slot.validate(&default) {
                return Err(invalid(format!("default {} is rejected: {}", default, e)).into());
            }
            slot.default = Some(default);
        }
        Ok(slot)
    }

    pub fn base(&self) -> &SlotBase {
        &self.base
    }
    pub fn name(&self) -> &str {
        &self.base.name
    }
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
    pub fn minimum(&self) -> Option<&Bound> {
        self.minimum.as_ref()
    }
    pub fn maximum(&self) -> Option<&Bound> {
        self.maximum.as_ref()
    }
    pub fn length_bounds(&self) -> (Option<usize>, Option<usize>) {
        (self.min_length, self.max_length)
    }
    pub fn size_bounds(&self) -> (Option<usize>, Option<usize>) {
        (self.min_size, self.max_size)
    }
    pub fn divisor(&self) -> Option<&Value> {
        self.divisor.as_ref()
    }
    pub fn disallowed(&self) -> &[Value] {
        &self.disallowed
    }
    pub fn is_searchable(&self) -> bool {
        self.searchable
    }
    /// The link slot whose target populates this slot, if any.
    pub fn link_binding(&self) -> Option<&str> {
        self.link_binding.as_deref()
    }

    /// Checks a value about to be written to this slot.
    pub fn validate(&self, new_value: &Value) -> std::result::Result<(), ValidationError> {
        if self.disallowed.contains(new_value) {
            return Err(ValidationError::Disallowed {
                slot: self.base.name.clone(),
                value: new_value.to_string(),
            });
        }
        match &self.base.value_type {
            ValueType::Integer | ValueType::Long => {
                let n = new_value.as_i64().ok_or_else(|| self.mismatch(new_value))?;
                if self.base.value_type == ValueType::Integer && i32::try_from(n).is_err() {
                    return Err(self.mismatch(new_value));
                }
                self.check_range(new_value)?;
                if let Some(divisor) = self.divisor.as_ref().and_then(Value::as_i64) {
                    if n.checked_rem(divisor).unwrap_or(0) != 0 {
                        return Err(self.not_divisible(new_value));
                    }
                }
                Ok(())
            }
            ValueType::Double => {
                let x = new_value.as_f64().ok_or_else(|| self.mismatch(new_value))?;
                self.check_range(new_value)?;
                if let Some(divisor) = self.divisor.as_ref().and_then(Value::as_f64) {
                    if x % divisor != 0.0 {
                        return Err(self.not_divisible(new_value));
                    }
                }
                Ok(())
            }
            ValueType::Text => {
                let text = match new_value {
                    Value::Text(text) => text,
                    other => return Err(self.mismatch(other)),
                };
                let length = text.chars().count();
                if let Some(max_length) = self.max_length {
                    if length > max_length {
                        return Err(ValidationError::TooLong {
                            slot: self.base.name.clone(),
                            length,
                            max_length,
                        });
                    }
                }
                if let Some(min_length) = self.min_length {
                    if length < min_length {
                        return Err(ValidationError::TooShort {
                            slot: self.base.name.clone(),
                            length,
                            min_length,
                        });
                    }
                }
                Ok(())
            }
            // structural checks for these happen outside of the slot
            _ => Ok(()),
        }
    }

    fn check_range(&self, new_value: &Value) -> std::result::Result<(), ValidationError> {
        if let Some(min) = &self.minimum {
            let ordering = new_value.compare_numeric(&min.value);
            let rejected = match ordering {
                Some(Ordering::Greater) => false,
                Some(Ordering::Equal) => min.exclusive,
                _ => true,
            };
            if rejected {
                return Err(ValidationError::BelowMinimum {
                    slot: self.base.name.clone(),
                    value: new_value.to_string(),
                    minimum: min.value.to_string(),
                    exclusive: min.exclusive,
                });
            }
        }
        if let Some(max) = &self.maximum {
            let ordering = new_value.compare_numeric(&max.value);
            let rejected = match ordering {
                Some(Ordering::Less) => false,
                Some(Ordering::Equal) => max.exclusive,
                _ => true,
            };
            if rejected {
                return Err(ValidationError::AboveMaximum {
                    slot: self.base.name.clone(),
                    value: new_value.to_string(),
                    maximum: max.value.to_string(),
                    exclusive: max.exclusive,
                });
            }
        }
        Ok(())
    }

    fn mismatch(&self, actual: &Value) -> ValidationError {
        ValidationError::TypeMismatch {
            slot: self.base.name.clone(),
            expected: self.base.value_type.to_string(),
            actual: actual.kind().to_string(),
        }
    }

    fn not_divisible(&self, new_value: &Value) -> ValidationError {
        ValidationError::NotDivisible {
            slot: self.base.name.clone(),
            value: new_value.to_string(),
            divisor: self
                .divisor
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default(),
        }
    }
}

// ------------- Collection Property Slot -------------
/// A list-of-models slot whose content is found by searching the referenced
/// schema's documents with criteria bound to the referrer.
#[derive(Debug)]
pub struct CollectionPropertySlot {
    base: SlotBase,
    reference_schema_id: SchemaId,
    link_relation: Option<String>,
    limit: Option<u32>,
    and: Vec<CriterionDeclaration>,
    or: Vec<CriterionDeclaration>,
    search: OnceLock<ProtoSearchCriteria>,
}

impl CollectionPropertySlot {
    pub(crate) fn compile(
        base: SlotBase,
        declaration: &SlotDeclaration,
        collection: &CollectionDeclaration,
        default_limit: Option<u32>,
    ) -> std::result::Result<Self, CompileError> {
        let reference_schema_id = match base.value_type.referenced_schema() {
            Some(schema) if base.value_type.is_list_of_models() => schema.clone(),
            _ => {
                return Err(CompileError::NotAModelList {
                    schema: base.owner.clone(),
                    slot: base.name.clone(),
                    found: base.value_type.clone(),
                });
            }
        };
        if let Some(link) = &declaration.link_binding {
            return Err(CompileError::ConflictingBinding {
                schema: base.owner.clone(),
                slot: base.name.clone(),
                link: link.clone(),
            });
        }
        if let Some(limit) = collection.limit {
            if limit < 1 {
                return Err(CompileError::InvalidLimit {
                    schema: base.owner.clone(),
                    slot: base.name.clone(),
                    limit,
                });
            }
        }
        Ok(Self {
            reference_schema_id,
            link_relation: collection.link_relation.clone(),
            limit: collection.limit.or(default_limit),
            and: collection.and.clone(),
            or: collection.or.clone(),
            search: OnceLock::new(),
            base,
        })
    }

    pub fn base(&self) -> &SlotBase {
        &self.base
    }
    pub fn name(&self) -> &str {
        &self.base.name
    }
    /// The schema of the documents held by this collection.
    pub fn reference_schema_id(&self) -> &SchemaId {
        &self.reference_schema_id
    }
    pub fn link_relation(&self) -> Option<&str> {
        self.link_relation.as_deref()
    }
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
    pub fn and_declarations(&self) -> &[CriterionDeclaration] {
        &self.and
    }
    pub fn or_declarations(&self) -> &[CriterionDeclaration] {
        &self.or
    }

    /// The declared criteria compiled against the reference and owning
    /// prototypes, built on first use.
    pub fn proto_search_criteria(&self, compiler: &PrototypeCompiler) -> Result<&ProtoSearchCriteria> {
        if let Some(criteria) = self.search.get() {
            return Ok(criteria);
        }
        let built = ProtoSearchCriteria::compile(compiler, self)?;
        debug!(slot = %self.base.name, owner = %self.base.owner, "compiled search criteria");
        Ok(self.search.get_or_init(|| built))
    }
}

// ------------- Link Slot -------------
#[derive(Debug)]
pub struct LinkSlot {
    base: SlotBase,
    method: Method,
    relation: String,
    request_schema_id: Option<SchemaId>,
    response_schema_id: Option<SchemaId>,
    embedded: bool,
    binding_declarations: BTreeMap<String, ValueSourceDeclaration>,
    bindings: OnceLock<BTreeMap<String, ProtoValueSource>>,
}

impl LinkSlot {
    pub(crate) fn compile(base: SlotBase, declaration: &LinkDeclaration) -> std::result::Result<Self, CompileError> {
        if declaration.embedded && !declaration.method.is_safe() {
            return Err(CompileError::EmbeddedUnsafeLink {
                schema: base.owner.clone(),
                slot: base.name.clone(),
                method: declaration.method.to_string(),
            });
        }
        let schema_of = |value_type: &Option<ValueType>| match value_type {
            Some(ValueType::Model { schema }) => Some(schema.clone()),
            _ => None,
        };
        let response_schema_id = schema_of(&declaration.response_type);
        if !declaration.bindings.is_empty() && response_schema_id.is_none() {
            return Err(CompileError::UnboundLinkBinding {
                schema: base.owner.clone(),
                slot: base.name.clone(),
            });
        }
        Ok(Self {
            method: declaration.method,
            relation: declaration.relation.clone(),
            request_schema_id: schema_of(&declaration.request_type),
            response_schema_id,
            embedded: declaration.embedded,
            binding_declarations: declaration.bindings.clone(),
            bindings: OnceLock::new(),
            base,
        })
    }

    pub fn base(&self) -> &SlotBase {
        &self.base
    }
    pub fn name(&self) -> &str {
        &self.base.name
    }
    pub fn method(&self) -> Method {
        self.method
    }
    pub fn relation(&self) -> &str {
        &self.relation
    }
    pub fn request_schema_id(&self) -> Option<&SchemaId> {
        self.request_schema_id.as_ref()
    }
    pub fn response_schema_id(&self) -> Option<&SchemaId> {
        self.response_schema_id.as_ref()
    }
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Reference slot name (in the response schema) to its compiled value source.
    pub fn bindings(&self, compiler: &PrototypeCompiler) -> Result<&BTreeMap<String, ProtoValueSource>> {
        if let Some(bindings) = self.bindings.get() {
            return Ok(bindings);
        }
        let mut built = BTreeMap::new();
        if let Some(response) = &self.response_schema_id {
            let reference = compiler.get_prototype(response)?;
            let referrer = compiler.get_prototype(&self.base.owner)?;
            for (slot_name, declaration) in &self.binding_declarations {
                let source =
                    ProtoValueSource::new(&reference, slot_name, &referrer, declaration, compiler.syntax())?;
                built.insert(source.reference_slot_name().to_string(), source);
            }
        }
        debug!(slot = %self.base.name, owner = %self.base.owner, bindings = built.len(), "compiled link bindings");
        Ok(self.bindings.get_or_init(|| built))
    }

    /// Resolves every binding against `referrer`, giving the parameters the
    /// link is followed with.
    pub fn resolve_bindings(
        &self,
        compiler: &PrototypeCompiler,
        referrer: &dyn Model,
    ) -> Result<BTreeMap<String, Option<Value>>> {
        let mut resolved = BTreeMap::new();
        for (slot_name, source) in self.bindings(compiler)? {
            resolved.insert(slot_name.clone(), source.resolve(compiler.syntax(), referrer)?);
        }
        Ok(resolved)
    }
}
