//! Permissions and the permissions claim
//!
//! A permission is a single fine-grained capability string such as
//! `get:drinks-detail` or `post:actors`. Tokens carry a collection of them
//! in a `permissions` claim; a protected route names exactly one, and the
//! check is exact string membership with no wildcard or hierarchy
//! semantics.

use std::collections::{hash_set, HashSet};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AuthError;

/// An invalid permission
#[derive(Debug, Error)]
pub enum InvalidPermission {
    /// The permission was the empty string
    #[error("permission cannot be empty")]
    EmptyString,
    /// The permission contained an invalid byte
    #[error("invalid permission byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the permission where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

aliri_braid::from_infallible!(InvalidPermission);

/// A single permission, such as `delete:movies`
///
/// A permission must be composed of printable ASCII characters excluding
/// ` ` (space), `"` (double quote), and `\` (backslash), matching the
/// character set of an OAuth2 scope token ([RFC 6749, Section 3.3][RFC6749 3.3]).
///
///   [RFC6749 3.3]: https://datatracker.ietf.org/doc/html/rfc6749#section-3.3
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to a [`Permission`]"
)]
pub struct Permission;

impl aliri_braid::Validator for Permission {
    type Error = InvalidPermission;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidPermission::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidPermission::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum PermissionsDto {
    String(String),
    Array(Vec<Permission>),
}

impl TryFrom<Option<PermissionsDto>> for PermissionSet {
    type Error = InvalidPermission;

    fn try_from(dto: Option<PermissionsDto>) -> Result<Self, Self::Error> {
        if let Some(dto) = dto {
            match dto {
                PermissionsDto::String(s) => {
                    s.split_whitespace().map(Permission::try_from).collect()
                }
                PermissionsDto::Array(arr) => Ok(arr.into_iter().collect()),
            }
        } else {
            Ok(Self::empty())
        }
    }
}

impl From<PermissionSet> for PermissionsDto {
    fn from(s: PermissionSet) -> Self {
        PermissionsDto::Array(s.0.into_iter().collect())
    }
}

/// The set of permissions carried by a token
///
/// Accepts either a JSON array of permission strings (the shape Auth0
/// publishes) or a single space-delimited string on deserialization, and
/// serializes as an array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Option<PermissionsDto>", into = "PermissionsDto")]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    /// Produces an empty permission set
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(HashSet::new())
    }

    /// Constructs a permission set from a single permission
    #[inline]
    #[must_use]
    pub fn single(permission: Permission) -> Self {
        let mut s = Self::empty();
        s.insert(permission);
        s
    }

    /// Adds a permission to the set
    #[inline]
    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    /// Checks whether the set contains the exact permission given
    #[inline]
    #[must_use]
    pub fn contains(&self, permission: &PermissionRef) -> bool {
        self.0.contains(permission)
    }

    /// Produces an iterator over the permissions in the set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PermissionRef> {
        self.into_iter()
    }
}

impl FromIterator<Permission> for PermissionSet {
    #[inline]
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = <HashSet<Permission> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed permissions
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: hash_set::Iter<'a, Permission>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a PermissionRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a PermissionRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            iter: self.0.iter(),
        }
    }
}

impl Extend<Permission> for PermissionSet {
    #[inline]
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// Indicates that a claims type may carry a permissions collection
pub trait HasPermissions {
    /// The permissions granted to the bearer, if the claim was present
    ///
    /// `None` means the token carried no permissions collection at all,
    /// which is treated differently from an empty collection.
    fn permissions(&self) -> Option<&PermissionSet>;
}

impl HasPermissions for PermissionSet {
    #[inline]
    fn permissions(&self) -> Option<&PermissionSet> {
        Some(self)
    }
}

/// Confirms that verified claims grant the required permission
///
/// # Errors
///
/// Returns [`AuthError::MissingPermissionsClaim`] if the claims carry no
/// permissions collection at all, and [`AuthError::PermissionNotFound`]
/// if the collection is present but lacks the exact permission required.
pub fn check_permission<T: HasPermissions>(
    claims: &T,
    required: &PermissionRef,
) -> Result<(), AuthError> {
    let permissions = claims
        .permissions()
        .ok_or(AuthError::MissingPermissionsClaim)?;
    if permissions.contains(required) {
        Ok(())
    } else {
        tracing::debug!(permission = %required, "bearer lacks required permission");
        Err(AuthError::PermissionNotFound)
    }
}
