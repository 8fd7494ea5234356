//! Who may edit or delete a post, consultation or comment.
//!
//! A row is owned either by a registered user (`user_id`) or by whoever
//! knows the password it was created with. The account match wins; the
//! password is only consulted when it does not apply.

use thiserror::Error;

use crate::auth::verify_password;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("a password is required")]
    MissingCredential,
    #[error("the password does not match")]
    InvalidCredential,
    #[error("password check did not complete: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnedResource {
    #[sqlx(rename = "user_id")]
    pub owner_user_id: Option<i32>,
    #[sqlx(rename = "password")]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Owner,
    Password,
}

pub fn resolve(
    resource: &OwnedResource,
    caller_id: Option<i32>,
    password: Option<&str>,
) -> Result<Grant, OwnershipError> {
    if let (Some(owner), Some(caller)) = (resource.owner_user_id, caller_id) {
        if owner == caller {
            return Ok(Grant::Owner);
        }
    }

    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(OwnershipError::MissingCredential)?;

    match resource.password_hash.as_deref() {
        Some(hash) if verify_password(password, hash) => Ok(Grant::Password),
        _ => Err(OwnershipError::InvalidCredential),
    }
}

/// [`resolve`] on the blocking pool; Argon2 verification takes tens of ms.
pub async fn resolve_blocking(
    resource: OwnedResource,
    caller_id: Option<i32>,
    password: Option<String>,
) -> Result<Grant, OwnershipError> {
    let joined =
        tokio::task::spawn_blocking(move || resolve(&resource, caller_id, password.as_deref()))
            .await;
    settle(joined)
}

fn settle(
    joined: Result<Result<Grant, OwnershipError>, tokio::task::JoinError>,
) -> Result<Grant, OwnershipError> {
    joined.map_err(|e| OwnershipError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;

    fn anonymous(password: &str) -> OwnedResource {
        OwnedResource {
            owner_user_id: None,
            password_hash: Some(hash_password(password).unwrap()),
        }
    }

    #[test]
    fn owner_needs_no_password() {
        let res = OwnedResource {
            owner_user_id: Some(7),
            password_hash: Some(hash_password("").unwrap()),
        };
        assert_eq!(resolve(&res, Some(7), None), Ok(Grant::Owner));
    }

    #[test]
    fn other_user_falls_back_to_password() {
        let res = OwnedResource {
            owner_user_id: Some(7),
            password_hash: Some(hash_password("pw").unwrap()),
        };
        assert_eq!(resolve(&res, Some(8), None), Err(OwnershipError::MissingCredential));
        assert_eq!(resolve(&res, Some(8), Some("pw")), Ok(Grant::Password));
    }

    #[test]
    fn correct_password_is_allowed() {
        let res = anonymous("1234");
        assert_eq!(resolve(&res, None, Some("1234")), Ok(Grant::Password));
    }

    #[test]
    fn wrong_password_is_invalid() {
        let res = anonymous("1234");
        assert_eq!(resolve(&res, None, Some("4321")), Err(OwnershipError::InvalidCredential));
    }

    #[test]
    fn absent_or_empty_password_is_missing() {
        let res = anonymous("1234");
        assert_eq!(resolve(&res, None, None), Err(OwnershipError::MissingCredential));
        assert_eq!(resolve(&res, None, Some("")), Err(OwnershipError::MissingCredential));
    }

    #[test]
    fn row_without_hash_rejects_any_password() {
        let res = OwnedResource {
            owner_user_id: None,
            password_hash: None,
        };
        assert_eq!(resolve(&res, None, Some("x")), Err(OwnershipError::InvalidCredential));
    }

    #[tokio::test]
    async fn blocking_variant_matches() {
        let res = anonymous("abc");
        let grant = resolve_blocking(res, None, Some("abc".to_string())).await;
        assert_eq!(grant, Ok(Grant::Password));
    }

    #[tokio::test]
    async fn panicked_check_is_not_a_wrong_password() {
        let joined = tokio::task::spawn_blocking(|| -> Result<Grant, OwnershipError> {
            panic!("verifier crashed")
        })
        .await;
        assert!(matches!(settle(joined), Err(OwnershipError::Aborted(_))));
    }
}
