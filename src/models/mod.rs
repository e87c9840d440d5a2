//! Model naming.
//!
//! Maps the free-form model names callers send to the canonical
//! `<provider>/<model>` identifiers the upstream API requires.

mod alias;

pub use alias::{aliases, resolve, DEFAULT_PROVIDER, PROVIDER_SEPARATOR};
