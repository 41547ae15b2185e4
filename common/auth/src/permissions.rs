use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::token::Token;

/// Permissions a protected operation requires. Empty means "authenticated".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for PermissionSet {
    fn from(value: &str) -> Self {
        Self(vec![value.to_owned()])
    }
}

impl From<&[&str]> for PermissionSet {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PermissionSet {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<T: Into<PermissionSet>> From<Option<T>> for PermissionSet {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Resolves a token's roles to the permissions they grant.
pub trait PermissionLookup: Send + Sync {
    fn permissions_for(&self, roles: &[String]) -> HashSet<String>;
}

impl<F> PermissionLookup for F
where
    F: Fn(&[String]) -> HashSet<String> + Send + Sync,
{
    fn permissions_for(&self, roles: &[String]) -> HashSet<String> {
        self(roles)
    }
}

/// Lookup that grants nothing; tokens only pass permission-free checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionLookup for NoPermissions {
    fn permissions_for(&self, _roles: &[String]) -> HashSet<String> {
        HashSet::new()
    }
}

/// Static role → permissions table, e.g. loaded from a JSON file:
///
/// ```json
/// { "editor": ["posts:read", "posts:write"], "viewer": ["posts:read"] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RolePermissionMap {
    roles: HashMap<String, HashSet<String>>,
}

impl RolePermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role<I, S>(mut self, role: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles
            .entry(role.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let map_err = |reason: String| ConfigError::PermissionMap {
            path: path.display().to_string(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|err| map_err(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| map_err(err.to_string()))
    }
}

impl PermissionLookup for RolePermissionMap {
    fn permissions_for(&self, roles: &[String]) -> HashSet<String> {
        roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .flatten()
            .cloned()
            .collect()
    }
}

/// Whether `token`'s roles grant every permission in `required`.
pub fn has_permissions(
    token: &Token,
    required: &PermissionSet,
    lookup: &dyn PermissionLookup,
) -> bool {
    if required.is_empty() {
        return true;
    }
    let Some(roles) = token.roles.as_deref() else {
        return false;
    };
    let granted = lookup.permissions_for(roles);
    required.iter().all(|permission| granted.contains(permission))
}
