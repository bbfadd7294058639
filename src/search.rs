//! Search criteria for collection slots.
//!
//! A collection slot declares AND and OR criteria over the slots of the
//! documents it holds. [`ProtoSearchCriteria`] is the compiled, reusable form
//! of those declarations; [`build_search_criteria`] binds it to a live
//! referrer and produces a [`SearchCriteria`] ready for a [`SearchExecutor`].
//! Nothing here runs a search.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeSet;
use std::fmt;

use crate::compiler::PrototypeCompiler;
use crate::error::{ProtoError, Result};
use crate::model::{Model, ModelHandle, ScopeHints};
use crate::schema::{CriterionDeclaration, SchemaId};
use crate::slot::CollectionPropertySlot;
use crate::syntax::Syntax;
use crate::value::Value;
use crate::value_source::ProtoValueSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Regex,
    Exists,
    NotExists,
}

impl ComparisonOperator {
    /// Existence checks ignore the comparison value.
    pub fn needs_value(&self) -> bool {
        !matches!(self, ComparisonOperator::Exists | ComparisonOperator::NotExists)
    }
}
impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::Regex => "~",
            ComparisonOperator::Exists => "exists",
            ComparisonOperator::NotExists => "not exists",
        };
        write!(f, "{}", symbol)
    }
}

// ------------- Compiled Criteria -------------
#[derive(Debug, Clone)]
pub struct ProtoSearchCriterion {
    source: ProtoValueSource,
    operator: ComparisonOperator,
    case_insensitive: bool,
}

impl ProtoSearchCriterion {
    pub fn reference_slot_name(&self) -> &str {
        self.source.reference_slot_name()
    }
    pub fn source(&self) -> &ProtoValueSource {
        &self.source
    }
    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    fn bind(&self, syntax: &dyn Syntax, referrer: &ModelHandle) -> Result<SearchCriterion> {
        let value = self.source.resolve(syntax, &**referrer)?;
        let regex = match (&self.operator, &value) {
            (ComparisonOperator::Regex, Some(value)) => {
                let pattern = match value.as_text() {
                    Some(text) => text.to_string(),
                    None => syntax.format(value),
                };
                let compiled = RegexBuilder::new(&pattern)
                    .case_insensitive(self.case_insensitive)
                    .build()
                    .map_err(|e| ProtoError::Pattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                Some(compiled)
            }
            _ => None,
        };
        Ok(SearchCriterion {
            reference_slot: self.source.reference_slot_name().to_string(),
            value,
            operator: self.operator,
            regex,
        })
    }
}

/// The declared criteria of one collection slot, compiled once.
#[derive(Debug, Clone)]
pub struct ProtoSearchCriteria {
    reference_schema_id: SchemaId,
    referrer_slot_name: String,
    and: Vec<ProtoSearchCriterion>,
    or: Vec<ProtoSearchCriterion>,
    limit: Option<u32>,
}

impl ProtoSearchCriteria {
    pub(crate) fn compile(compiler: &PrototypeCompiler, slot: &CollectionPropertySlot) -> Result<Self> {
        let reference = compiler.get_prototype(slot.reference_schema_id())?;
        let referrer = compiler.get_prototype(slot.base().owner())?;
        let compile_all = |declarations: &[CriterionDeclaration]| -> Result<Vec<ProtoSearchCriterion>> {
            declarations
                .iter()
                .map(|declaration| {
                    let source = ProtoValueSource::new(
                        &reference,
                        &declaration.reference_slot,
                        &referrer,
                        &declaration.source,
                        compiler.syntax(),
                    )?;
                    Ok(ProtoSearchCriterion {
                        source,
                        operator: declaration.operator,
                        case_insensitive: declaration.case_insensitive,
                    })
                })
                .collect()
        };
        Ok(Self {
            reference_schema_id: slot.reference_schema_id().clone(),
            referrer_slot_name: slot.name().to_string(),
            and: compile_all(slot.and_declarations())?,
            or: compile_all(slot.or_declarations())?,
            limit: slot.limit(),
        })
    }

    pub fn reference_schema_id(&self) -> &SchemaId {
        &self.reference_schema_id
    }
    pub fn referrer_slot_name(&self) -> &str {
        &self.referrer_slot_name
    }
    pub fn and(&self) -> &[ProtoSearchCriterion] {
        &self.and
    }
    pub fn or(&self) -> &[ProtoSearchCriterion] {
        &self.or
    }
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

// ------------- Bound Criteria -------------
/// One comparison against a slot of the referenced documents.
#[derive(Debug, Clone)]
pub struct SearchCriterion {
    reference_slot: String,
    value: Option<Value>,
    operator: ComparisonOperator,
    regex: Option<Regex>,
}

impl SearchCriterion {
    pub fn reference_slot(&self) -> &str {
        &self.reference_slot
    }
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }
}

/// A search request for the documents of one collection slot of one
/// referrer. Built fresh for every evaluation and never changed afterwards.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    reference_schema_id: SchemaId,
    hints: ScopeHints,
    and: Vec<SearchCriterion>,
    or: Vec<SearchCriterion>,
    projection: BTreeSet<String>,
    limit: Option<u32>,
    referrer: ModelHandle,
    referrer_slot_name: String,
}

impl SearchCriteria {
    pub fn reference_schema_id(&self) -> &SchemaId {
        &self.reference_schema_id
    }
    /// Scope hints for the referenced documents, derived from the referrer's.
    pub fn hints(&self) -> &ScopeHints {
        &self.hints
    }
    pub fn and(&self) -> &[SearchCriterion] {
        &self.and
    }
    pub fn or(&self) -> &[SearchCriterion] {
        &self.or
    }
    /// Slot names to fetch; empty means the executor's default.
    pub fn projection(&self) -> &BTreeSet<String> {
        &self.projection
    }
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
    pub fn referrer(&self) -> &ModelHandle {
        &self.referrer
    }
    pub fn referrer_slot_name(&self) -> &str {
        &self.referrer_slot_name
    }
}

/// Runs search requests. Implemented by the storage layer.
pub trait SearchExecutor: Send + Sync {
    fn execute(&self, criteria: &SearchCriteria) -> Result<Vec<ModelHandle>>;
}

/// Binds the declared criteria of `slot` to `referrer`.
pub fn build_search_criteria(
    compiler: &PrototypeCompiler,
    slot: &CollectionPropertySlot,
    referrer: &ModelHandle,
) -> Result<SearchCriteria> {
    let proto_criteria = slot.proto_search_criteria(compiler)?;
    let syntax = compiler.syntax();

    let and = proto_criteria
        .and
        .iter()
        .map(|criterion| criterion.bind(syntax, referrer))
        .collect::<Result<Vec<_>>>()?;
    let or = proto_criteria
        .or
        .iter()
        .map(|criterion| criterion.bind(syntax, referrer))
        .collect::<Result<Vec<_>>>()?;

    let hints = referrer.hints().nested(slot.name());
    let projection: BTreeSet<String> = if !hints.included_slot_names.is_empty() {
        hints.included_slot_names.iter().cloned().collect()
    } else if !hints.excluded_slot_names.is_empty() {
        let reference = compiler.get_prototype(&proto_criteria.reference_schema_id)?;
        reference
            .property_slot_names()
            .into_iter()
            .filter(|name| !hints.excluded_slot_names.contains(name))
            .collect()
    } else {
        BTreeSet::new()
    };
    debug!(
        slot = %slot.name(),
        reference = %proto_criteria.reference_schema_id,
        and = and.len(),
        or = or.len(),
        projection = projection.len(),
        "built search criteria"
    );

    Ok(SearchCriteria {
        reference_schema_id: proto_criteria.reference_schema_id.clone(),
        hints,
        and,
        or,
        projection,
        limit: proto_criteria.limit,
        referrer: ModelHandle::clone(referrer),
        referrer_slot_name: slot.name().to_string(),
    })
}
