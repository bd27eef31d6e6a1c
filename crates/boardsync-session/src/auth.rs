//! Credential validation and issuing.
//!
//! Credentials are HS256-signed JWTs carrying the owner's id in the
//! `user_id` claim alongside identity-provider fields. Validation is a pure
//! function of (token, secret): no I/O, no state.

use std::future::Future;
use std::time::Duration;

use boardsync_protocol::OwnerId;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Default lifetime of an issued credential.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Validates a bearer credential and returns the owner it belongs to.
///
/// Implement this to plug in a different credential scheme. The server
/// calls it once per connection attempt, before the hub is contacted.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<OwnerId, AuthError>> + Send;
}

/// Claims carried by a BoardSync credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Hex object id of the owner. A missing claim decodes as empty and is
    /// reported as a malformed identity.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub google_id: String,
    /// Issued-at, seconds since the Unix epoch.
    #[serde(default)]
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

impl Claims {
    /// Decodes the embedded owner identity.
    pub fn owner_id(&self) -> Result<OwnerId, AuthError> {
        self.user_id
            .parse()
            .map_err(|_| AuthError::MalformedIdentity(self.user_id.clone()))
    }
}

/// [`Authenticator`] for HS256 credentials signed with a shared secret.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verifies signature and expiry and returns the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<OwnerId, AuthError> {
        self.validate(token)?.owner_id()
    }
}

/// Signs credentials for an owner.
///
/// Shares its secret with the [`JwtAuthenticator`] that will later admit
/// the credential.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Overrides the credential lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issues a credential for `owner`, valid from now for the configured
    /// lifetime.
    pub fn issue(
        &self,
        owner: OwnerId,
        email: &str,
        google_id: &str,
    ) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        self.sign(&Claims {
            user_id: owner.to_string(),
            email: email.to_owned(),
            google_id: google_id.to_owned(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        })
    }

    /// Signs arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(AuthError::Signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn owner() -> OwnerId {
        "64b7f0c2a1e4d3b2c1a09f8e".parse().unwrap()
    }

    fn claims_for(user_id: &str, exp: u64) -> Claims {
        Claims {
            user_id: user_id.to_owned(),
            email: "ada@example.com".into(),
            google_id: "g-123".into(),
            iat: jsonwebtoken::get_current_timestamp(),
            exp,
        }
    }

    #[tokio::test]
    async fn test_authenticate_issued_token_returns_owner() {
        let token = TokenIssuer::new(SECRET)
            .issue(owner(), "ada@example.com", "g-123")
            .unwrap();
        let auth = JwtAuthenticator::new(SECRET);
        assert_eq!(auth.authenticate(&token).await.unwrap(), owner());
    }

    #[tokio::test]
    async fn test_authenticate_empty_token_is_missing_credential() {
        let auth = JwtAuthenticator::new(SECRET);
        let err = auth.authenticate("").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn test_authenticate_garbage_token_is_invalid_credential() {
        let auth = JwtAuthenticator::new(SECRET);
        let err = auth.authenticate("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_secret_is_invalid_credential() {
        let token = TokenIssuer::new(b"other-secret")
            .issue(owner(), "", "")
            .unwrap();
        let err = JwtAuthenticator::new(SECRET)
            .authenticate(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token_is_invalid_credential() {
        // Well past the default 60s leeway.
        let exp = jsonwebtoken::get_current_timestamp() - 3600;
        let token = TokenIssuer::new(SECRET)
            .sign(&claims_for(&owner().to_string(), exp))
            .unwrap();
        let err = JwtAuthenticator::new(SECRET)
            .authenticate(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_authenticate_non_hex_identity_is_malformed() {
        let exp = jsonwebtoken::get_current_timestamp() + 3600;
        let token = TokenIssuer::new(SECRET)
            .sign(&claims_for("not-an-object-id", exp))
            .unwrap();
        let err = JwtAuthenticator::new(SECRET)
            .authenticate(&token)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AuthError::MalformedIdentity(ref s) if s == "not-an-object-id")
        );
    }

    #[test]
    fn test_validate_missing_user_id_claim_is_malformed_identity() {
        #[derive(Serialize)]
        struct Bare {
            exp: u64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Bare {
                exp: jsonwebtoken::get_current_timestamp() + 3600,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let claims = JwtAuthenticator::new(SECRET).validate(&token).unwrap();
        assert_eq!(claims.user_id, "");
        assert!(matches!(
            claims.owner_id(),
            Err(AuthError::MalformedIdentity(_))
        ));
    }

    #[test]
    fn test_issue_sets_lifetime_and_identity_fields() {
        let issuer = TokenIssuer::new(SECRET).with_ttl(Duration::from_secs(60));
        let token = issuer.issue(owner(), "ada@example.com", "g-123").unwrap();
        let claims = JwtAuthenticator::new(SECRET).validate(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 60);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.google_id, "g-123");
        assert_eq!(claims.user_id, owner().to_string());
    }
}
