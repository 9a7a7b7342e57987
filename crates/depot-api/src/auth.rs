//! Caller context extraction.
//!
//! Authentication and tenant resolution live in the fronting gateway, which
//! forwards the resolved identity as `x-tenant-id` / `x-caller-id` headers.
//! This module only lifts those headers into a typed context.

use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use depot_core::CallerContext;
use uuid::Uuid;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const CALLER_HEADER: &str = "x-caller-id";

/// Tenant context extracted from gateway headers.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub caller_id: Option<Uuid>,
}

impl TenantContext {
    pub fn caller(&self) -> CallerContext {
        CallerContext::new(self.tenant_id, self.caller_id)
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message, "UNAUTHORIZED")),
    )
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing tenant context"))?
            .parse::<Uuid>()
            .map_err(|_| unauthorized("Invalid tenant id"))?;

        let caller_id = match parts.headers.get(CALLER_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .ok()
                    .and_then(|v| v.parse::<Uuid>().ok())
                    .ok_or_else(|| unauthorized("Invalid caller id"))?,
            ),
            None => None,
        };

        Ok(TenantContext {
            tenant_id,
            caller_id,
        })
    }
}
