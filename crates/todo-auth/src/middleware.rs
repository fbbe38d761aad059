//! Authentication middleware for Axum
//!
//! Two layers cooperate:
//!
//! - [`auth_middleware`] is the request gate. For protected paths it reads
//!   the bearer token, verifies it and binds a [`Principal`] into the
//!   request extensions. It never rejects a request.
//! - [`require_auth`] is the boundary. It rejects protected requests that
//!   reached it without a bound principal.

use axum::{
    extract::{Request, State},
    http::{Extensions, HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};
use crate::policy::PathPolicy;
use crate::principal::Principal;
use crate::resolver::{Identity, IdentityResolver};

const BEARER_PREFIX: &str = "Bearer ";

/// Default bound on a single identity lookup
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one gate pass over a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// A principal was bound by this pass
    Authenticated,
    /// A principal was already bound; nothing changed
    AlreadyAuthenticated,
    /// No usable `Authorization: Bearer` header
    NoCredential,
    /// The token failed verification (category attached)
    Rejected(&'static str),
    /// The subject is unknown and existence is enforced
    UnknownSubject,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Authenticated => "authenticated",
            GateOutcome::AlreadyAuthenticated => "already_authenticated",
            GateOutcome::NoCredential => "no_credential",
            GateOutcome::Rejected(_) => "rejected",
            GateOutcome::UnknownSubject => "unknown_subject",
        }
    }
}

/// Extract bearer token from the request headers
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Per-request authenticator shared by every request
pub struct RequestGate {
    jwt: Arc<JwtManager>,
    resolver: Arc<dyn IdentityResolver>,
    policy: Arc<PathPolicy>,
    resolver_timeout: Duration,
    enforce_subject_exists: bool,
}

impl RequestGate {
    pub fn new(
        jwt: Arc<JwtManager>,
        resolver: Arc<dyn IdentityResolver>,
        policy: Arc<PathPolicy>,
    ) -> Self {
        Self {
            jwt,
            resolver,
            policy,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            enforce_subject_exists: false,
        }
    }

    pub fn with_resolver_timeout(mut self, timeout: Duration) -> Self {
        self.resolver_timeout = timeout;
        self
    }

    /// Refuse to bind principals for subjects the resolver does not know
    pub fn with_enforce_subject_exists(mut self, enforce: bool) -> Self {
        self.enforce_subject_exists = enforce;
        self
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Run one gate pass, binding a principal into `extensions` on success
    ///
    /// Safe to call more than once per request: an existing principal is
    /// never replaced.
    pub async fn authenticate(&self, headers: &HeaderMap, extensions: &mut Extensions) -> GateOutcome {
        let outcome = self.authenticate_inner(headers, extensions).await;
        metrics::counter!("todo_auth_gate_total", "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    async fn authenticate_inner(&self, headers: &HeaderMap, extensions: &mut Extensions) -> GateOutcome {
        if extensions.get::<Principal>().is_some() {
            return GateOutcome::AlreadyAuthenticated;
        }

        let token = match extract_bearer_token(headers) {
            Ok(token) => token,
            Err(e) => {
                debug!("No bearer credential: {}", e);
                return GateOutcome::NoCredential;
            }
        };

        let claims = match self.jwt.verify(token) {
            Ok(claims) => claims,
            Err(e) => return GateOutcome::Rejected(e.category()),
        };

        let Some(principal) = self.resolve_principal(&claims).await else {
            return GateOutcome::UnknownSubject;
        };

        debug!(
            "Authenticated {} with {} authorities",
            principal.subject,
            principal.authorities.len()
        );
        extensions.insert(principal);

        GateOutcome::Authenticated
    }

    /// Resolve a subject, bounded by the resolver timeout
    ///
    /// A timeout is reported as [`AuthError::ResolverUnavailable`].
    pub async fn lookup_identity(&self, subject: &str) -> Result<Identity, AuthError> {
        tokio::time::timeout(self.resolver_timeout, self.resolver.resolve(subject))
            .await
            .unwrap_or_else(|_| {
                Err(AuthError::ResolverUnavailable(format!(
                    "lookup timed out after {:?}",
                    self.resolver_timeout
                )))
            })
    }

    /// Build the principal for verified claims
    ///
    /// Resolver failures and timeouts degrade to a baseline principal.
    async fn resolve_principal(&self, claims: &Claims) -> Option<Principal> {
        match self.lookup_identity(&claims.sub).await {
            Ok(identity) => {
                Some(Principal::new(claims.sub.clone(), identity.authorities).with_name(identity.name))
            }
            Err(AuthError::UserNotFound) if self.enforce_subject_exists => {
                debug!("Subject {} not found, not binding principal", claims.sub);
                None
            }
            Err(AuthError::UserNotFound) => {
                debug!("Subject {} not found, using token identity", claims.sub);
                Some(Principal::from_subject(claims.sub.clone()))
            }
            Err(e) => {
                warn!("Identity lookup failed for {}: {}", claims.sub, e);
                Some(Principal::from_subject(claims.sub.clone()))
            }
        }
    }
}

/// Authentication middleware (request gate)
///
/// Public paths pass straight through without touching the token. On
/// protected paths the gate runs and the request always continues.
pub async fn auth_middleware(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    if gate
        .policy()
        .classify_request(request.method(), request.uri().path())
        .is_public()
    {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let outcome = gate.authenticate(&parts.headers, &mut parts.extensions).await;
    debug!("Gate outcome for {}: {}", parts.uri.path(), outcome.as_str());

    next.run(Request::from_parts(parts, body)).await
}

/// Middleware to require a bound principal on protected paths
pub async fn require_auth(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let access = gate
        .policy()
        .classify_request(request.method(), request.uri().path());

    if !access.is_public() && request.extensions().get::<Principal>().is_none() {
        debug!("Rejecting unauthenticated request to {}", request.uri().path());
        return Err(AuthError::Unauthenticated);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyMode, SigningKey};
    use crate::principal::Authority;
    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
    };
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Resolver with scripted behavior and a call counter
    struct TestResolver {
        mode: ResolverMode,
        calls: AtomicUsize,
    }

    enum ResolverMode {
        Known,
        Unknown,
        Failing,
        Slow,
    }

    impl TestResolver {
        fn new(mode: ResolverMode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityResolver for TestResolver {
        async fn resolve(&self, subject: &str) -> Result<Identity, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                ResolverMode::Known => Ok(Identity {
                    subject: subject.to_string(),
                    name: Some("Known User".to_string()),
                    authorities: vec![Authority::new("ROLE_USER"), Authority::new("todo:write")],
                }),
                ResolverMode::Unknown => Err(AuthError::UserNotFound),
                ResolverMode::Failing => Err(AuthError::ResolverUnavailable("db down".to_string())),
                ResolverMode::Slow => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(AuthError::UserNotFound)
                }
            }
        }
    }

    fn jwt() -> Arc<JwtManager> {
        let key = SigningKey::derive(Some("middleware-test-secret-0123456789abcdef"), KeyMode::Strict)
            .unwrap();
        Arc::new(JwtManager::new(&key, 3600))
    }

    fn gate(jwt: Arc<JwtManager>, resolver: Arc<TestResolver>) -> RequestGate {
        RequestGate::new(jwt, resolver, Arc::new(PathPolicy::default()))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&bearer("abc")).unwrap(), "abc");

        assert!(matches!(
            extract_bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(extract_bearer_token(&basic), Err(AuthError::InvalidAuthHeader)));

        let mut lowercase = HeaderMap::new();
        lowercase.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert!(matches!(extract_bearer_token(&lowercase), Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn test_valid_token_binds_principal() {
        let jwt = jwt();
        let resolver = TestResolver::new(ResolverMode::Known);
        let gate = gate(jwt.clone(), resolver.clone());
        let token = jwt.issue("x@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        let outcome = gate.authenticate(&bearer(&token), &mut extensions).await;

        assert_eq!(outcome, GateOutcome::Authenticated);
        let principal = extensions.get::<Principal>().unwrap();
        assert_eq!(principal.subject, "x@y.com");
        assert_eq!(principal.name.as_deref(), Some("Known User"));
        assert!(principal.has_authority("todo:write"));
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_gate_is_idempotent() {
        let jwt = jwt();
        let resolver = TestResolver::new(ResolverMode::Known);
        let gate = gate(jwt.clone(), resolver.clone());
        let first = jwt.issue("x@y.com", None).unwrap();
        let second = jwt.issue("other@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&first), &mut extensions).await,
            GateOutcome::Authenticated
        );
        assert_eq!(
            gate.authenticate(&bearer(&second), &mut extensions).await,
            GateOutcome::AlreadyAuthenticated
        );

        assert_eq!(extensions.get::<Principal>().unwrap().subject, "x@y.com");
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_garbage_token_leaves_request_unauthenticated() {
        let resolver = TestResolver::new(ResolverMode::Known);
        let gate = gate(jwt(), resolver.clone());

        let mut extensions = Extensions::new();
        let outcome = gate.authenticate(&bearer("garbage"), &mut extensions).await;

        assert_eq!(outcome, GateOutcome::Rejected("malformed"));
        assert!(extensions.get::<Principal>().is_none());
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_header_is_no_credential() {
        let gate = gate(jwt(), TestResolver::new(ResolverMode::Known));

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&HeaderMap::new(), &mut extensions).await,
            GateOutcome::NoCredential
        );
        assert!(extensions.get::<Principal>().is_none());
    }

    #[tokio::test]
    async fn test_unknown_subject_uses_token_identity() {
        let jwt = jwt();
        let gate = gate(jwt.clone(), TestResolver::new(ResolverMode::Unknown));
        let token = jwt.issue("ghost@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut extensions).await,
            GateOutcome::Authenticated
        );

        let principal = extensions.get::<Principal>().unwrap();
        assert_eq!(principal.subject, "ghost@y.com");
        assert!(principal.name.is_none());
        assert!(principal.has_authority(crate::principal::BASELINE_AUTHORITY));
    }

    #[tokio::test]
    async fn test_unknown_subject_rejected_when_enforced() {
        let jwt = jwt();
        let gate = gate(jwt.clone(), TestResolver::new(ResolverMode::Unknown))
            .with_enforce_subject_exists(true);
        let token = jwt.issue("ghost@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut extensions).await,
            GateOutcome::UnknownSubject
        );
        assert!(extensions.get::<Principal>().is_none());
    }

    #[tokio::test]
    async fn test_failing_resolver_degrades_to_baseline() {
        let jwt = jwt();
        let gate = gate(jwt.clone(), TestResolver::new(ResolverMode::Failing))
            .with_enforce_subject_exists(true);
        let token = jwt.issue("x@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut extensions).await,
            GateOutcome::Authenticated
        );
        assert_eq!(
            extensions.get::<Principal>().unwrap(),
            &Principal::from_subject("x@y.com")
        );
    }

    #[tokio::test]
    async fn test_slow_resolver_times_out() {
        let jwt = jwt();
        let gate = gate(jwt.clone(), TestResolver::new(ResolverMode::Slow))
            .with_resolver_timeout(Duration::from_millis(100));
        let token = jwt.issue("x@y.com", None).unwrap();

        let mut extensions = Extensions::new();
        assert_eq!(
            gate.authenticate(&bearer(&token), &mut extensions).await,
            GateOutcome::Authenticated
        );
        assert_eq!(extensions.get::<Principal>().unwrap().subject, "x@y.com");
    }

    #[tokio::test]
    async fn test_lookup_identity_times_out() {
        let gate = gate(jwt(), TestResolver::new(ResolverMode::Slow))
            .with_resolver_timeout(Duration::from_millis(100));

        let result = tokio::time::timeout(Duration::from_secs(3), gate.lookup_identity("x@y.com"))
            .await
            .expect("lookup must finish within the resolver timeout");
        assert!(matches!(result, Err(AuthError::ResolverUnavailable(_))));
    }

    /// Handler reporting the bound subject, or "anonymous"
    async fn whoami(request: Request) -> String {
        request
            .extensions()
            .get::<Principal>()
            .map(|p| p.subject.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(gate: Arc<RequestGate>) -> Router {
        Router::new()
            .route("/api/me", get(whoami))
            .route("/api/auth/verify", get(whoami))
            .route("/health", get(whoami))
            .layer(from_fn_with_state(gate.clone(), require_auth))
            .layer(from_fn_with_state(gate, auth_middleware))
    }

    async fn call(app: Router, path: &str, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let resp = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_protected_path_with_valid_token() {
        let jwt = jwt();
        let gate = Arc::new(gate(jwt.clone(), TestResolver::new(ResolverMode::Known)));
        let token = jwt.issue("x@y.com", None).unwrap();

        let (status, body) = call(app(gate), "/api/me", Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "x@y.com");
    }

    #[tokio::test]
    async fn test_protected_path_with_garbage_token_is_401() {
        let gate = Arc::new(gate(jwt(), TestResolver::new(ResolverMode::Known)));

        let (status, body) = call(app(gate.clone()), "/api/me", Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Unauthorized"));

        let (status, _) = call(app(gate), "/api/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_path_skips_gate() {
        let jwt = jwt();
        let resolver = TestResolver::new(ResolverMode::Known);
        let gate = Arc::new(gate(jwt.clone(), resolver.clone()));
        let token = jwt.issue("x@y.com", None).unwrap();

        // A valid token on a public path is not even looked at
        let (status, body) =
            call(app(gate.clone()), "/api/auth/verify", Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, body) = call(app(gate.clone()), "/health", Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, _) = call(app(gate), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolver.calls(), 0);
    }
}
