//! Contract store: load, validate, fingerprint and serialize API contract
//! documents (OpenAPI 3 subset, YAML or JSON).
//!
//! - [`load`] parses bytes under a logical resource name and enforces the
//!   document invariants (unique `operationId`, `required ⊆ properties`).
//! - [`fingerprint`] is a sha256 over a canonical form.
//! - [`serialize`] produces canonical YAML for immutable snapshots.

mod error;
mod fingerprint;
mod load;
pub mod model;
mod raw;
mod serialize;

pub use error::{ContractError, InvariantViolation};
pub use fingerprint::fingerprint;
pub use load::load;
pub use model::{
    Constraints, ContractDocument, ContractInfo, Method, Operation, Parameter, ParameterLocation,
    RequestBody, Response, Route, Schema, SchemaKind,
};
pub use serialize::serialize;
