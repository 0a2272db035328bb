//! Output validation for specsmith
//!
//! Two layers: a structural check run on every stage attempt
//! ([`structural`]) and a full JSON Schema check run once on the assembled
//! document ([`schema`]).

pub mod schema;
pub mod structural;

pub use schema::{FinalSchemaValidator, SchemaError, SchemaPolicy};
pub use structural::{
    API_DB_KEYS, FEATURES_KEYS, RequiredKey, SPECIFICATION_KEYS, STORIES_KEYS, Shape,
    StructuralIssue, check_structure, parse_and_check, required_keys,
};
