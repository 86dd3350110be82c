//! # Visibility and Ownership
//!
//! Every repository operation runs under a [`Scope`], which decides which rows
//! the caller may read or mutate:
//!
//! | Scope | Visible rows | `clear_all` |
//! |-------|--------------|-------------|
//! | `Owner(U)` | `owner = U` or `owner` is null | forbidden |
//! | `Admin` | every row | allowed |
//!
//! Mutations use the same visibility test as reads. A row outside the scope is
//! reported as *not found*, never as *forbidden*, so hidden rows cannot be
//! probed for.
//!
//! ## Scope Tokens
//!
//! The calling layer passes a [`ScopeToken`] (`self`, `all`, or an explicit
//! identity) together with who the caller is ([`Caller`]). [`Caller::resolve`]
//! turns the pair into a [`Scope`]:
//!
//! - `self` → the caller's own owner scope
//! - `all` → admin scope, admins only
//! - `<id>` → the caller's own scope when `id` is the caller, otherwise that
//!   user's owner scope, admins only

use std::fmt;
use std::str::FromStr;

use crate::error::{CardError, Result};
use crate::model::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Owner(OwnerId),
    Admin,
}

impl Scope {
    pub fn is_admin(&self) -> bool {
        matches!(self, Scope::Admin)
    }

    /// Whether a row with the given owner is visible (and mutable) here.
    pub fn can_see(&self, owner: Option<&OwnerId>) -> bool {
        match (self, owner) {
            (Scope::Admin, _) => true,
            (Scope::Owner(_), None) => true,
            (Scope::Owner(me), Some(owner)) => me == owner,
        }
    }

    pub fn can_clear_all(&self) -> bool {
        self.is_admin()
    }

    /// Owner for a row added under this scope.
    ///
    /// Owner scopes always add to themselves; only the admin scope may pick an
    /// owner (or none, for a public row).
    pub fn assign_owner(&self, requested: Option<OwnerId>) -> Option<OwnerId> {
        match self {
            Scope::Owner(me) => Some(me.clone()),
            Scope::Admin => requested,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Owner(id) => write!(f, "owner:{}", id),
            Scope::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeToken {
    /// `self`
    Current,
    /// `all`
    All,
    Identity(OwnerId),
}

impl FromStr for ScopeToken {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "self" => Ok(ScopeToken::Current),
            "all" => Ok(ScopeToken::All),
            other => Ok(ScopeToken::Identity(OwnerId::new(other)?)),
        }
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeToken::Current => f.write_str("self"),
            ScopeToken::All => f.write_str("all"),
            ScopeToken::Identity(id) => write!(f, "{}", id),
        }
    }
}

/// Who is calling, as established by the auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub identity: Option<OwnerId>,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(identity: OwnerId) -> Self {
        Self {
            identity: Some(identity),
            is_admin: false,
        }
    }

    pub fn admin(identity: Option<OwnerId>) -> Self {
        Self {
            identity,
            is_admin: true,
        }
    }

    pub fn resolve(&self, token: &ScopeToken) -> Result<Scope> {
        match token {
            ScopeToken::Current => match (&self.identity, self.is_admin) {
                (Some(me), _) => Ok(Scope::Owner(me.clone())),
                (None, true) => Ok(Scope::Admin),
                (None, false) => Err(CardError::Forbidden(
                    "no caller identity to scope the request to".to_string(),
                )),
            },
            ScopeToken::All if self.is_admin => Ok(Scope::Admin),
            ScopeToken::All => Err(CardError::Forbidden(
                "scope 'all' requires admin privileges".to_string(),
            )),
            ScopeToken::Identity(id) if self.identity.as_ref() == Some(id) => {
                Ok(Scope::Owner(id.clone()))
            }
            ScopeToken::Identity(id) if self.is_admin => Ok(Scope::Owner(id.clone())),
            ScopeToken::Identity(id) => Err(CardError::Forbidden(format!(
                "cannot act on behalf of '{}'",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    #[test]
    fn owner_sees_own_and_public_rows() {
        let scope = Scope::Owner(owner("ash"));
        assert!(scope.can_see(None));
        assert!(scope.can_see(Some(&owner("ash"))));
        assert!(!scope.can_see(Some(&owner("gary"))));
    }

    #[test]
    fn admin_sees_everything() {
        assert!(Scope::Admin.can_see(None));
        assert!(Scope::Admin.can_see(Some(&owner("gary"))));
        assert!(Scope::Admin.can_clear_all());
        assert!(!Scope::Owner(owner("ash")).can_clear_all());
    }

    #[test]
    fn owner_scope_forces_own_identity() {
        let scope = Scope::Owner(owner("ash"));
        assert_eq!(scope.assign_owner(Some(owner("gary"))), Some(owner("ash")));
        assert_eq!(scope.assign_owner(None), Some(owner("ash")));
        assert_eq!(Scope::Admin.assign_owner(None), None);
        assert_eq!(
            Scope::Admin.assign_owner(Some(owner("gary"))),
            Some(owner("gary"))
        );
    }

    #[test]
    fn parse_tokens() {
        assert_eq!("self".parse::<ScopeToken>().unwrap(), ScopeToken::Current);
        assert_eq!("all".parse::<ScopeToken>().unwrap(), ScopeToken::All);
        assert_eq!(
            "brock".parse::<ScopeToken>().unwrap(),
            ScopeToken::Identity(owner("brock"))
        );
        assert!("  ".parse::<ScopeToken>().is_err());
    }

    #[test]
    fn resolve_self() {
        let caller = Caller::user(owner("ash"));
        assert_eq!(
            caller.resolve(&ScopeToken::Current).unwrap(),
            Scope::Owner(owner("ash"))
        );
        assert_eq!(
            Caller::admin(None).resolve(&ScopeToken::Current).unwrap(),
            Scope::Admin
        );
        assert!(matches!(
            Caller::default().resolve(&ScopeToken::Current),
            Err(CardError::Forbidden(_))
        ));
    }

    #[test]
    fn resolve_all_requires_admin() {
        assert!(matches!(
            Caller::user(owner("ash")).resolve(&ScopeToken::All),
            Err(CardError::Forbidden(_))
        ));
        assert_eq!(
            Caller::admin(Some(owner("oak")))
                .resolve(&ScopeToken::All)
                .unwrap(),
            Scope::Admin
        );
    }

    #[test]
    fn resolve_explicit_identity() {
        let ash = Caller::user(owner("ash"));
        assert_eq!(
            ash.resolve(&ScopeToken::Identity(owner("ash"))).unwrap(),
            Scope::Owner(owner("ash"))
        );
        assert!(matches!(
            ash.resolve(&ScopeToken::Identity(owner("gary"))),
            Err(CardError::Forbidden(_))
        ));
        assert_eq!(
            Caller::admin(None)
                .resolve(&ScopeToken::Identity(owner("gary")))
                .unwrap(),
            Scope::Owner(owner("gary"))
        );
    }
}
