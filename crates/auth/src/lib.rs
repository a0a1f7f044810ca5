//! `libram-auth` — pure authentication/authorization boundary.
//!
//! This crate validates tokens and answers policy questions; it is
//! intentionally decoupled from HTTP and storage. Identity *provisioning*
//! (issuing tokens, managing accounts) is an external collaborator.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, CommandAuthorization, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use roles::Role;
