//! Tenant and session context.
//!
//! Every engine operation is scoped to one tenant. Rather than reading
//! ambient session state, callers build a [`RequestContext`] once per request
//! (usually from the [`Session`] collaborator) and pass it into each call.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TallyError, TallyResult};

/// Unique identifier for a tenant (one set of books).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Creates a new random tenant ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tenant ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated user as reported by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// The user's ID.
    pub id: UserId,

    /// The tenant the user is currently working in, if any is selected.
    pub current_tenant_id: Option<TenantId>,
}

/// Session collaborator owned by the application shell.
///
/// The engine never resolves sessions itself; it only consumes the result.
pub trait Session: Send + Sync {
    /// Returns the authenticated user, or `None` when not signed in.
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Explicit per-request scope for engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// The acting user.
    pub user_id: UserId,

    /// The tenant all row access is scoped to.
    pub tenant_id: TenantId,
}

impl RequestContext {
    /// Creates a context from explicit ids.
    #[must_use]
    pub const fn new(user_id: UserId, tenant_id: TenantId) -> Self {
        Self { user_id, tenant_id }
    }

    /// Builds a context from the session collaborator.
    ///
    /// # Errors
    /// - [`TallyError::NotAuthenticated`] when no user is signed in
    /// - [`TallyError::NoTenantSelected`] when the user has not picked a tenant
    pub fn from_session(session: &dyn Session) -> TallyResult<Self> {
        let user = session.current_user().ok_or(TallyError::NotAuthenticated)?;
        let tenant_id = user
            .current_tenant_id
            .ok_or(TallyError::NoTenantSelected)?;
        Ok(Self {
            user_id: user.id,
            tenant_id,
        })
    }
}
