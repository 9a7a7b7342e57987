//! Caller identity supplied by the surrounding platform.

use uuid::Uuid;

/// Opaque caller identity. Authentication and tenant resolution happen
/// upstream; every session-manager operation is scoped to `tenant_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    pub tenant_id: Uuid,
    pub caller_id: Option<Uuid>,
}

impl CallerContext {
    pub fn new(tenant_id: Uuid, caller_id: Option<Uuid>) -> Self {
        Self {
            tenant_id,
            caller_id,
        }
    }
}
