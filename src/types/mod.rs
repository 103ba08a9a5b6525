// ABOUTME: Validated newtypes shared across modules.
// ABOUTME: Currently the OCI runtime name.

mod runtime_name;

pub use runtime_name::{RuntimeName, RuntimeNameError};
