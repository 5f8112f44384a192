//! Data model shared by the form state crates.
//!
//! - [`FieldPath`] / [`Address`]: parsed dot-paths and `$meta` addresses
//! - [`FieldState`] / [`FieldId`]: per-field metadata with a stable identity
//! - [`FormState`]: form-wide flags and the version counter
//! - [`FormError`]: programming errors (bad paths, wrong metadata types)

pub mod error;
pub mod field;
pub mod form;
pub mod path;

pub use error::{FormError, Result, json_type_name};
pub use field::{FieldId, FieldState, MetaKey, MetaValue};
pub use form::{FormId, FormState};
pub use path::{Address, FieldPath, IntoFieldPath, Segment};
