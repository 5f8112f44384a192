//! Rule-based validation for formstate controllers.
//!
//! Rules are typed values bound to field patterns; `*` in a pattern matches
//! any single key or index:
//!
//! ```
//! use formstate_validate::{Rule, RuleSet, RuleValidator};
//!
//! let rules = RuleSet::new()
//!     .rule("email", Rule::Required)?
//!     .rule("email", Rule::Email)?
//!     .rule("confirm", Rule::same_as("password")?)?
//!     .rule("items.*.qty", Rule::Min(1.0))?;
//! let validator = RuleValidator::new(rules);
//! # Ok::<(), formstate_validate::RuleError>(())
//! ```
//!
//! The same set can be loaded from JSON with [`RuleSet::from_json`].

pub mod error;
pub mod pattern;
pub mod rules;
mod validator;

pub use error::{Result, RuleError};
pub use pattern::PathPattern;
pub use rules::{Rule, RuleDef, RuleSet, Violation};
pub use validator::RuleValidator;
