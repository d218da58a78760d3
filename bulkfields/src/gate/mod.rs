// Authorization gate run in front of the save, export and import operations

use crate::error::{BulkFieldsError, Result};
use std::fmt;

/// Operations that require an administrative caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Export,
    Import,
}

impl Action {
    /// Whether the action changes stored data and so needs an anti-forgery token.
    pub fn is_state_changing(self) -> bool {
        matches!(self, Action::Save | Action::Import)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Save => "save",
            Action::Export => "export",
            Action::Import => "import",
        };
        f.write_str(name)
    }
}

/// Who is calling, as established by the surrounding application
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub is_admin: bool,
    pub token: Option<String>,
}

pub trait AuthorizationGate {
    /// Reject the request before any core operation runs.
    fn check(&self, request: &RequestContext, action: Action) -> Result<()>;
}

/// Gate for a local operator who already owns the data directory.
pub struct LocalOperator;

impl AuthorizationGate for LocalOperator {
    fn check(&self, _request: &RequestContext, _action: Action) -> Result<()> {
        Ok(())
    }
}

/// Requires an admin caller, and for state-changing actions a token equal to
/// `<secret>:<action>`.
pub struct AdminTokenGate {
    secret: String,
}

impl AdminTokenGate {
    pub fn new(secret: &str) -> Self {
        AdminTokenGate {
            secret: secret.to_string(),
        }
    }

    /// The token a caller must present for `action`.
    pub fn token_for(&self, action: Action) -> String {
        format!("{}:{action}", self.secret)
    }
}

impl AuthorizationGate for AdminTokenGate {
    fn check(&self, request: &RequestContext, action: Action) -> Result<()> {
        if !request.is_admin {
            return Err(BulkFieldsError::Unauthorized(format!(
                "{action} requires an administrator"
            )));
        }
        if action.is_state_changing()
            && request.token.as_deref() != Some(self.token_for(action).as_str())
        {
            return Err(BulkFieldsError::InvalidToken {
                action: action.to_string(),
            });
        }
        Ok(())
    }
}
