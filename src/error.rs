use thiserror::Error;

use crate::schema::SchemaId;
use crate::value::ValueType;

/// Structural violations found while compiling a schema into a prototype.
/// All of them are fatal for the schema being compiled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Schema not found: {schema}")]
    SchemaNotFound { schema: SchemaId },
    #[error("Schema {schema} inherits from itself through {cycle:?}")]
    CyclicInheritance { schema: SchemaId, cycle: Vec<SchemaId> },
    #[error("Schema {schema}: link relation {relation} is claimed by both '{first}' and '{second}'")]
    DuplicateLinkRelation {
        schema: SchemaId,
        relation: String,
        first: String,
        second: String,
    },
    #[error("Schema {schema}: slot name '{slot}' is reserved")]
    ReservedSlotName { schema: SchemaId, slot: String },
    #[error("Schema {schema}: slot '{slot}' is declared more than once")]
    DuplicateSlot { schema: SchemaId, slot: String },
    #[error("Schema {schema}: slot name '{slot}' is declared both as a {first} and as a {second}")]
    SlotKindConflict {
        schema: SchemaId,
        slot: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("Schema {schema}: collection slot '{slot}' must be a list of models, found {found}")]
    NotAModelList {
        schema: SchemaId,
        slot: String,
        found: ValueType,
    },
    #[error("Schema {schema}: collection slot '{slot}' also declares a link binding to '{link}'")]
    ConflictingBinding {
        schema: SchemaId,
        slot: String,
        link: String,
    },
    #[error("Schema {schema}: alias '{alias}' of slot '{slot}' is invalid: {reason}")]
    InvalidAlias {
        schema: SchemaId,
        slot: String,
        alias: String,
        reason: String,
    },
    #[error("Schema {schema}: key slot '{slot}' does not exist")]
    UnknownKeySlot { schema: SchemaId, slot: String },
    #[error("Schema {schema}: slot '{slot}' has an invalid constraint: {reason}")]
    InvalidConstraint {
        schema: SchemaId,
        slot: String,
        reason: String,
    },
    #[error("Schema {schema}: collection slot '{slot}' has limit {limit}, must be at least 1")]
    InvalidLimit {
        schema: SchemaId,
        slot: String,
        limit: u32,
    },
    #[error("Schema {schema}: link slot '{slot}' is embedded but {method} is not a safe method")]
    EmbeddedUnsafeLink {
        schema: SchemaId,
        slot: String,
        method: String,
    },
    #[error("Schema {schema}: link slot '{slot}' declares bindings but has no response schema")]
    UnboundLinkBinding { schema: SchemaId, slot: String },
    #[error("Schema {schema}: slot '{slot}' is bound to unknown link slot '{link}'")]
    UnknownLinkSlot {
        schema: SchemaId,
        slot: String,
        link: String,
    },
    #[error("Schema {schema}: reference slot '{slot}' does not exist")]
    UnknownReferenceSlot { schema: SchemaId, slot: String },
    #[error("Schema {schema}: referrer slot '{slot}' does not exist")]
    UnknownReferrerSlot { schema: SchemaId, slot: String },
    #[error("Schema {schema}: slot '{slot}' is not a {expected} slot")]
    WrongSlotKind {
        schema: SchemaId,
        slot: String,
        expected: &'static str,
    },
}

/// Text that could not be turned into a value of the requested type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot coerce '{text}' to {target}: {reason}")]
pub struct CoercionError {
    pub text: String,
    pub target: ValueType,
    pub reason: String,
}

impl CoercionError {
    pub fn new(text: &str, target: &ValueType, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            target: target.clone(),
            reason: reason.into(),
        }
    }
}

/// Write-time rejection, always naming the slot and the bound it violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Slot '{slot}': value {value} is not allowed")]
    Disallowed { slot: String, value: String },
    #[error("Slot '{slot}': value {value} is below the {} minimum {minimum}", bound_kind(.exclusive))]
    BelowMinimum {
        slot: String,
        value: String,
        minimum: String,
        exclusive: bool,
    },
    #[error("Slot '{slot}': value {value} is above the {} maximum {maximum}", bound_kind(.exclusive))]
    AboveMaximum {
        slot: String,
        value: String,
        maximum: String,
        exclusive: bool,
    },
    #[error("Slot '{slot}': value {value} is not divisible by {divisor}")]
    NotDivisible {
        slot: String,
        value: String,
        divisor: String,
    },
    #[error("Slot '{slot}': length {length} is shorter than the minimum length {min_length}")]
    TooShort {
        slot: String,
        length: usize,
        min_length: usize,
    },
    #[error("Slot '{slot}': length {length} exceeds the maximum length {max_length}")]
    TooLong {
        slot: String,
        length: usize,
        max_length: usize,
    },
    #[error("Slot '{slot}': expected a {expected} value, got {actual}")]
    TypeMismatch {
        slot: String,
        expected: String,
        actual: String,
    },
    #[error("Slot '{slot}': schema {schema} is read-only")]
    ReadOnly { slot: String, schema: SchemaId },
    #[error("Slot '{slot}' is a {kind} slot and cannot be written")]
    NotWritable { slot: String, kind: &'static str },
    #[error("Slot '{slot}' does not exist in schema {schema}")]
    UnknownSlot { slot: String, schema: SchemaId },
}

fn bound_kind(exclusive: &bool) -> &'static str {
    if *exclusive { "exclusive" } else { "inclusive" }
}

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),
    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Document error: {0}")]
    Document(String),
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ProtoError>;

// Helper conversions
impl From<config::ConfigError> for ProtoError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
impl From<serde_json::Error> for ProtoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Document(e.to_string())
    }
}
