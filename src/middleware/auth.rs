//! Bearer-token authentication and per-route permission checks.

use crate::error::{AppError, ConfigError};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    BooksRead,
    BooksWrite,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BooksRead => "books:read",
            Self::BooksWrite => "books:write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "books:read" => Ok(Self::BooksRead),
            "books:write" => Ok(Self::BooksWrite),
            other => Err(format!("unknown permission '{}'", other)),
        }
    }
}

/// Who is making the request. Inserted into request extensions by [`authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated { permissions: HashSet<Permission> },
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn has(&self, permission: Permission) -> bool {
        match self {
            Self::Anonymous => false,
            Self::Authenticated { permissions } => permissions.contains(&permission),
        }
    }
}

/// Maps a presented bearer token to a principal. `Ok(None)` means the token is not recognised.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Principal>, AppError>;
}

/// Fixed token table loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, HashSet<Permission>>,
}

impl StaticTokens {
    /// Parse `token=perm,perm;token=perm`. Blank input yields an empty table.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            name: "API_TOKENS".into(),
            reason,
        };
        let mut tokens = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, perms) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected token=permission[,permission]".into()))?;
            let token = token.trim();
            if token.is_empty() {
                return Err(invalid("empty token".into()));
            }
            let permissions = perms
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .map(Permission::from_str)
                .collect::<Result<HashSet<_>, _>>()
                .map_err(invalid)?;
            tokens.insert(token.to_string(), permissions);
        }
        Ok(Self { tokens })
    }

    pub fn with_token(mut self, token: impl Into<String>, permissions: &[Permission]) -> Self {
        self.tokens
            .insert(token.into(), permissions.iter().copied().collect());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenResolver for StaticTokens {
    async fn resolve(&self, token: &str) -> Result<Option<Principal>, AppError> {
        Ok(self.tokens.get(token).map(|permissions| Principal::Authenticated {
            permissions: permissions.clone(),
        }))
    }
}

/// Resolve the `Authorization: Bearer` header into a [`Principal`]. Requests
/// without the header continue as anonymous; a malformed or unknown token is rejected.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = match request.headers().get(header::AUTHORIZATION) {
        None => Principal::Anonymous,
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(AppError::InvalidAuthenticationToken)?;
            state
                .tokens()
                .resolve(token)
                .await?
                .ok_or(AppError::InvalidAuthenticationToken)?
        }
    };
    request.extensions_mut().insert(principal);

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    Ok(response)
}

/// Route layer: the caller must be authenticated and hold `permission`.
pub async fn require_permission(
    State(permission): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or(Principal::Anonymous);
    if principal.is_anonymous() {
        return Err(AppError::AuthenticationRequired);
    }
    if !principal.has(permission) {
        tracing::debug!(%permission, "permission denied");
        return Err(AppError::NotPermitted);
    }
    Ok(next.run(request).await)
}
