//! Placeholder auth seam: each route has a minimum role (`admin` or
//! `highest`), but real routing and enforcement are a separate
//! collaborator's concern, so this extractor is a permissive
//! pass-through, not a security boundary. A real deployment replaces
//! `AuthContext`'s `from_request_parts` with one that actually verifies
//! a JWT and maps it onto `Role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Admin,
    Highest,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub role: Role,
    pub actor: String,
}

impl AuthContext {
    pub fn satisfies(&self, required: Role) -> bool {
        self.role >= required
    }
}

/// Not a security boundary: always grants `Role::Highest` for whatever
/// identity the caller claims via `X-Actor`, or `"anonymous"` if absent.
/// Documented integration point for a real JWT/RBAC collaborator.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get("x-actor")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string();
        Ok(AuthContext {
            role: Role::Highest,
            actor,
        })
    }
}
