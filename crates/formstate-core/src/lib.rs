//! Path-addressed reactive form state.
//!
//! A [`FormController`] owns a JSON document plus a registry of per-field
//! metadata keyed by dot-path. Values and metadata are read and written
//! through string addresses (`items.0.price`, `email.$errors`). Array edits
//! keep each element's metadata attached to it, validation runs through a
//! pluggable [`Validator`], and lifecycle changes are published on an
//! [`EventBus`].
//!
//! # Modules
//!
//! - [`access`]: reading and writing JSON values by path
//! - [`registry`]: field records and array reindexing
//! - [`validator`]: the validation adapter contract
//! - [`events`]: typed publish/subscribe
//! - [`debounce`]: per-key trailing-edge debouncing
//! - [`config`]: controller behavior switches

pub mod access;
pub mod config;
mod controller;
pub mod debounce;
pub mod events;
pub mod registry;
pub mod validator;

pub use config::ControllerConfig;
pub use controller::{FormBuilder, FormController, SubmitHandler, submit_handler};
pub use events::{EventBus, EventKind, EventPayload, FormEvent, HandlerId};
pub use formstate_model::{
    Address, FieldId, FieldPath, FieldState, FormError, FormId, FormState, IntoFieldPath, MetaKey,
    MetaValue, Segment,
};
pub use registry::FieldRegistry;
pub use validator::{NoopValidator, Validator, ValidatorError};
