//! `reqflow-auth`: pure authentication/authorization boundary (zero-trust).
//!
//! Identity is asserted by an external provider through signed tokens; this
//! crate turns verified claims into a `Principal` and answers permission checks.
//! Relational rules (requester-only, same department, no self-approval) live in
//! the workflow policy, which has the requisition at hand.

pub mod actor;
pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use actor::Actor;
pub use authorize::{AuthzError, authorize, authorize_any};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::{Permission, default_role_permissions};
pub use principal::Principal;
pub use roles::Role;
