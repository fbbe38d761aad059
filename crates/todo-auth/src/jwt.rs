//! JWT token management

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::key::SigningKey;

/// Token lifetime used when the configured one is unset or not positive
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest accepted token lifetime (ten years)
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 3600;

/// Claim names owned by the codec; extra claims cannot override them
const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Additional claims supplied at issuance
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Expired once `now` reaches `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Clamp a configured lifetime to something usable
///
/// Non-positive values use the default; values past
/// [`MAX_TOKEN_LIFETIME_SECS`] are capped so expiries stay representable.
pub fn normalize_lifetime(secs: i64) -> i64 {
    if secs <= 0 {
        DEFAULT_TOKEN_LIFETIME_SECS
    } else if secs > MAX_TOKEN_LIFETIME_SECS {
        warn!(
            "Token lifetime {}s exceeds maximum {}s, using maximum",
            secs, MAX_TOKEN_LIFETIME_SECS
        );
        MAX_TOKEN_LIFETIME_SECS
    } else {
        secs
    }
}

/// JWT manager for token issuance and verification
///
/// All operations are read-only over the signing key, so one instance is
/// shared by every request.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(key: &SigningKey, lifetime_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            lifetime: Duration::seconds(normalize_lifetime(lifetime_secs)),
        }
    }

    /// Lifetime given to newly issued tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `subject`, valid from now
    pub fn issue(&self, subject: &str, extra: Option<Map<String, Value>>) -> Result<String, AuthError> {
        self.issue_at(subject, extra, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(
        &self,
        subject: &str,
        extra: Option<Map<String, Value>>,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let mut extra = extra.unwrap_or_default();
        for name in RESERVED_CLAIMS {
            extra.remove(name);
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp: iat + self.lifetime.num_seconds(),
            extra,
        };

        debug!("Issuing token for subject: {}", subject);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Verify a token and return its claims
    ///
    /// Failures are logged and counted here; callers only see the typed error.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let result = self.verify_at(token, Utc::now());

        let outcome = match &result {
            Ok(_) => "valid",
            Err(e) => {
                debug!("Token rejected ({}): {}", e.category(), e);
                e.category()
            }
        };
        metrics::counter!("todo_auth_token_verifications_total", "outcome" => outcome).increment(1);

        result
    }

    /// Verify signature and expiry against an explicit clock
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let claims = self.decode_signed(token)?;
        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Whether the token currently verifies
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }

    /// Subject of a valid token
    pub fn subject_of(&self, token: &str) -> Option<String> {
        self.verify(token).ok().map(|claims| claims.sub)
    }

    /// Whether the token is valid and was issued to `subject`
    pub fn verify_for_subject(&self, token: &str, subject: &str) -> bool {
        self.subject_of(token).is_some_and(|sub| sub == subject)
    }

    /// A single extra claim of a valid token
    pub fn claim(&self, token: &str, name: &str) -> Option<Value> {
        self.verify(token)
            .ok()
            .and_then(|mut claims| claims.extra.remove(name))
    }

    /// Expiry of a correctly signed token, even one that has already expired
    pub fn expiration(&self, token: &str) -> Option<DateTime<Utc>> {
        self.decode_signed(token).ok().map(|claims| claims.expires_at())
    }

    /// Time left before the token expires; zero when expired or unreadable
    pub fn remaining_lifetime(&self, token: &str) -> Duration {
        self.remaining_lifetime_at(token, Utc::now())
    }

    pub fn remaining_lifetime_at(&self, token: &str, now: DateTime<Utc>) -> Duration {
        match self.decode_signed(token) {
            Ok(claims) if !claims.is_expired_at(now) => {
                (claims.expires_at() - now).max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }

    /// True when the token is expired or cannot be read
    pub fn is_expired(&self, token: &str) -> bool {
        self.is_expired_at(token, Utc::now())
    }

    pub fn is_expired_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.decode_signed(token)
            .map(|claims| claims.is_expired_at(now))
            .unwrap_or(true)
    }

    /// Decode and check the signature, leaving expiry to the caller
    fn decode_signed(&self, token: &str) -> Result<Claims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::EmptyToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)
    }
}

/// Map a jsonwebtoken failure onto the verification taxonomy
fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthError::UnsupportedAlgorithm
        }
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::MalformedToken(err.to_string()),
    }
}
