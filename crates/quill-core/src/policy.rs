//! Authorization policies for post mutations.

use std::str::FromStr;

use uuid::Uuid;

use crate::domain::Post;
use crate::error::DomainError;

/// Whether a request only reads a resource or may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Classify an HTTP method name. GET, HEAD, OPTIONS and TRACE are safe.
    pub fn from_method(method: &str) -> Self {
        match method {
            "GET" | "HEAD" | "OPTIONS" | "TRACE" => Access::Read,
            _ => Access::Write,
        }
    }
}

/// Owner-or-read-only: anyone may read, only the owning user may write.
///
/// Anonymous callers (`caller == None`) are denied every write.
pub fn is_owner_or_read_only(caller: Option<Uuid>, post: &Post, access: Access) -> bool {
    match access {
        Access::Read => true,
        Access::Write => caller.is_some_and(|id| post.is_owned_by(id)),
    }
}

/// Like [`is_owner_or_read_only`], failing with [`DomainError::Forbidden`].
pub fn ensure_owner_or_read_only(
    caller: Option<Uuid>,
    post: &Post,
    access: Access,
) -> Result<(), DomainError> {
    if is_owner_or_read_only(caller, post, access) {
        Ok(())
    } else {
        Err(DomainError::Forbidden)
    }
}

/// Who may delete a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Same rule as updates: only the owning user.
    #[default]
    OwnerOnly,
    /// No ownership check at all.
    Open,
}

impl DeletePolicy {
    pub fn check(&self, caller: Option<Uuid>, post: &Post) -> Result<(), DomainError> {
        match self {
            DeletePolicy::OwnerOnly => ensure_owner_or_read_only(caller, post, Access::Write),
            DeletePolicy::Open => Ok(()),
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" | "owner_only" | "owner-only" => Ok(DeletePolicy::OwnerOnly),
            "open" | "any" => Ok(DeletePolicy::Open),
            other => Err(format!("unknown delete policy '{other}'")),
        }
    }
}
