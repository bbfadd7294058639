//! Protoslot – compiles inheritable hypermedia schemas into cached prototypes.
//!
//! A [`schema::Schema`] declares named slots, hyperlinks, key slots and base
//! schemas. Compiling it yields a [`prototype::Prototype`]: the merged,
//! immutable view of the schema and all of its ancestors, which is what the
//! rest of a system consults when it
//! * validates a write to a slot ([`prototype::Prototype::validate_write`]),
//! * binds the parameters of a link from a live model
//!   ([`slot::LinkSlot::resolve_bindings`]),
//! * builds the search that populates a collection slot
//!   ([`search::build_search_criteria`]).
//!
//! ## Slots
//! Every compiled slot is a [`slot::ProtoSlot`], one of:
//! * [`slot::PropertySlot`] – a plain value with declarative constraints
//!   (range with exclusive flags, divisor, text length, disallowed values).
//! * [`slot::CollectionPropertySlot`] – a list of models found by searching
//!   the referenced schema with AND/OR criteria.
//! * [`slot::LinkSlot`] – a hyperlink with a method, a relation and optional
//!   request/response schemas.
//!
//! ## Value sources
//! Criteria and link bindings take their values from a
//! [`value_source::ProtoValueSource`]: a slot path on the referrer (`"a.b"`),
//! a query parameter from the referrer's scope hints, or a constant coerced
//! once when the source is built. A broken path or an absent parameter
//! resolves to `None` rather than an error.
//!
//! ## Caching
//! The [`compiler::PrototypeCompiler`] memoizes prototypes by schema id for
//! the lifetime of the process. Slots refer to other schemas by id only and
//! fetch the referenced prototype on first use, so a collection or link slot
//! may reference its own schema.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use protoslot::{
//!     compiler::PrototypeCompiler,
//!     schema::{Constraints, Schema, SchemaKeeper, SlotDeclaration},
//!     value::{Value, ValueType},
//! };
//! let keeper = SchemaKeeper::new();
//! keeper
//!     .keep(Schema::new("urn:person").slot(
//!         SlotDeclaration::new("age", ValueType::Integer).constraints(Constraints {
//!             minimum: Some("0".into()),
//!             ..Default::default()
//!         }),
//!     ))
//!     .unwrap();
//! let compiler = PrototypeCompiler::new(Arc::new(keeper));
//! let person = compiler.get_prototype(&"urn:person".into()).unwrap();
//! assert!(person.validate_write("age", &Value::Integer(42)).is_ok());
//! assert!(person.validate_write("age", &Value::Integer(-1)).is_err());
//! ```

pub mod compiler;
pub mod error;
pub mod model;
pub mod prototype;
pub mod schema;
pub mod search;
pub mod settings;
pub mod slot;
pub mod syntax;
pub mod value;
pub mod value_source;

pub use compiler::PrototypeCompiler;
pub use error::{CoercionError, CompileError, ProtoError, Result, ValidationError};
pub use model::{DynamicModel, Model, ModelHandle, ScopeHints};
pub use prototype::Prototype;
pub use schema::{Schema, SchemaId, SchemaKeeper, SchemaSource};
pub use settings::Settings;
pub use value::{Value, ValueType};
