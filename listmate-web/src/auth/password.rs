use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::instrument;
use uuid::Uuid;

use super::AuthError;

/// Hash a password using a randomly-generated salt value
pub async fn new_hash(password: String) -> Result<String, AuthError> {
    let salt = Uuid::new_v4();
    hash_password(password, salt).await
}

#[instrument(skip(password))]
async fn hash_password(password: String, salt: Uuid) -> Result<String, AuthError> {
    let hash = tokio::task::spawn_blocking(move || {
        let saltstring = SaltString::encode_b64(salt.as_bytes())
            .map_err(|e| AuthError::PasswordHasherError(e.to_string()))?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), saltstring.as_salt())
            .map_err(|e| AuthError::PasswordHasherError(e.to_string()))?;

        Ok::<_, AuthError>(hash.to_string())
    })
    .await
    .map_err(|e| AuthError::PasswordHasherError(e.to_string()))??;

    Ok(hash)
}

/// Verify that the given password matches the stored hash
#[instrument(skip_all)]
pub async fn verify_password(password: String, hash_str: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(&hash_str)
            .map_err(|e| AuthError::PasswordHasherError(e.to_string()))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| AuthError::InvalidCredentials)
    })
    .await
    .map_err(|e| AuthError::PasswordHasherError(e.to_string()))??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_PASSWORD, TEST_PASSWORD_HASH};

    #[tokio::test]
    #[cfg_attr(
        not(any(feature = "test_slow", feature = "test_password")),
        ignore = "slow password test"
    )]
    async fn good_password() -> Result<(), AuthError> {
        let hash = new_hash("abcdef".into()).await?;
        verify_password("abcdef".to_string(), hash).await
    }

    #[tokio::test]
    #[cfg_attr(
        not(any(feature = "test_slow", feature = "test_password")),
        ignore = "slow password test"
    )]
    async fn bad_password() -> Result<(), AuthError> {
        let hash = new_hash("abcdef".into()).await?;
        let err = verify_password("abcdefg".to_string(), hash)
            .await
            .expect_err("non-matching password");
        assert!(err.is_unauthenticated());
        Ok(())
    }

    /// Test that the salt actually results in a different hash every time.
    #[tokio::test]
    #[cfg_attr(
        not(any(feature = "test_slow", feature = "test_password")),
        ignore = "slow password test"
    )]
    async fn unique_password_salt() {
        let p1 = new_hash("abc".into()).await.unwrap();
        let p2 = new_hash("abc".into()).await.unwrap();
        assert_ne!(p1, p2);
    }

    #[tokio::test]
    #[cfg_attr(
        not(any(feature = "test_slow", feature = "test_password")),
        ignore = "slow password test"
    )]
    async fn test_password_hash_matches() {
        verify_password(TEST_PASSWORD.to_string(), TEST_PASSWORD_HASH.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_hash() {
        let err = verify_password("abc".into(), "not a hash".into())
            .await
            .expect_err("malformed hash");
        assert!(matches!(err, AuthError::PasswordHasherError(_)));
    }
}
