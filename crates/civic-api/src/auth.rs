//! Bearer token gate
//!
//! Resolves `Authorization: Bearer <token>` against the configured token
//! table. Handlers that mutate issues take [`Authenticated`]; status
//! transitions take [`Admin`], which carries the core's admin capability.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use civic_core::config::TokenEntry;
use civic_core::{AdminCapability, Caller};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Session tokens known to this server
#[derive(Debug, Default)]
pub struct TokenRegistry {
    callers: HashMap<String, Caller>,
}

impl TokenRegistry {
    pub fn from_entries(entries: &[TokenEntry]) -> Self {
        let callers = entries
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    Caller::new(entry.user_id.clone(), entry.role),
                )
            })
            .collect();
        Self { callers }
    }

    pub fn resolve(&self, token: &str) -> Option<&Caller> {
        self.callers.get(token)
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any caller holding a known token
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let caller = state
            .tokens
            .resolve(token)
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        tracing::debug!(user_id = %caller.user_id, role = %caller.role, "caller authenticated");
        Ok(Authenticated(caller))
    }
}

/// A caller with the admin role
#[derive(Debug, Clone)]
pub struct Admin {
    pub caller: Caller,
    pub capability: AdminCapability,
}

impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(caller) = Authenticated::from_request_parts(parts, state).await?;
        let capability = caller
            .admin_capability()
            .ok_or_else(|| ApiError::Forbidden("Admin role required".into()))?;
        Ok(Admin { caller, capability })
    }
}
