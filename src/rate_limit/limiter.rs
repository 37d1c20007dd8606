//! Admission façade: subject keying, admin bypass, decision type.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::backend::{RateLimitBackend, RateLimitResult};
use crate::models::Role;

/// Who is making the request, as resolved at the API edge.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub user: Option<Uuid>,
    pub roles: Vec<Role>,
    pub remote_addr: IpAddr,
}

impl ClientIdentity {
    pub fn authenticated(user: Uuid, roles: Vec<Role>, remote_addr: IpAddr) -> Self {
        Self {
            user: Some(user),
            roles,
            remote_addr,
        }
    }

    pub fn anonymous(remote_addr: IpAddr) -> Self {
        Self {
            user: None,
            roles: Vec::new(),
            remote_addr,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Window subject: the authenticated identity when present, the
    /// network address otherwise.
    pub fn subject_key(&self) -> String {
        match self.user {
            Some(id) => format!("user:{}", id.simple()),
            None => format!("ip:{}", self.remote_addr),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed,
    /// Over the permit limit. Callers surface a 429-equivalent with the
    /// retry-after hint.
    Limited { retry_after: Duration },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub struct RateLimiter {
    backend: Arc<dyn RateLimitBackend>,
    permit_limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(backend: Arc<dyn RateLimitBackend>, permit_limit: usize, window: Duration) -> Self {
        Self {
            backend,
            permit_limit,
            window,
        }
    }

    /// Check one request. Admin requests bypass the window entirely and
    /// are not recorded.
    pub async fn check(&self, identity: &ClientIdentity) -> RateLimitResult<AdmissionDecision> {
        if identity.is_admin() {
            return Ok(AdmissionDecision::Allowed);
        }

        let count = self
            .backend
            .record_and_count(&identity.subject_key(), self.window)
            .await?;

        if count > self.permit_limit {
            Ok(AdmissionDecision::Limited {
                retry_after: self.window,
            })
        } else {
            Ok(AdmissionDecision::Allowed)
        }
    }
}
