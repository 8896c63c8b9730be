/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWTs issued at login carry the user id, profile and role
 * descriptions. `auth_middleware` turns a valid token into an [`AuthUser`],
 * the typed caller identity handed to every service call.
 * `permission_middleware` gates routes on permission strings resolved from
 * the token's roles.
 */

use crate::entities::{user, UserProfile};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod password;
pub mod permissions;
pub mod rbac;

pub use permissions::consts;
pub use rbac::{permission_matches, permissions_for_roles};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub email: String,
    pub profile: UserProfile,
    pub roles: Vec<String>, // Role descriptions
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated caller, built from a validated token.
///
/// Services never read the token; they receive this value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub profile: UserProfile,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let permissions = permissions_for_roles(&claims.roles);
        Ok(Self {
            user_id,
            email: claims.email,
            profile: claims.profile,
            roles: claims.roles,
            permissions,
            token_id: claims.jti,
        })
    }

    /// Check if any granted permission covers `permission`
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|granted| permission_matches(granted, permission))
    }

    pub fn is_admin(&self) -> bool {
        self.profile == UserProfile::Admin
    }

    /// ADMIN, or the user identified by `user_id`
    pub fn is_admin_or_self(&self, user_id: Uuid) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_audience.clone(),
            cfg.jwt_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Generate a JWT for a user. Roles follow the user's profile.
    pub fn generate_token(&self, user: &user::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            profile: user.profile,
            roles: vec![user.profile.role_name().to_string()],
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        Ok(data.claims)
    }

    /// Validate a bearer `Authorization` header into a caller identity
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        let claims = self.validate_token(token)?;
        AuthUser::from_claims(claims)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Authentication token has expired".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::TokenCreation(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for crate::errors::ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => Self::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                Self::InternalError(msg)
            }
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

/// Makes the [`AuthService`] reachable from `auth_middleware`
pub async fn provide_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    match auth_service.authenticate_headers(request.headers()) {
        Ok(user) => {
            debug!(user_id = %user.user_id, profile = %user.profile, "authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_permission(&required_permission) {
        debug!(
            user_id = %user.user_id,
            required = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "k8Jd2mQ9vLx4Rt7Wz1Np6Hs3Fy5Bc0Ge-branchflow-unit-test-secret-with-enough-entropy"
                .into(),
            "branchflow-clients".into(),
            "branchflow-api".into(),
            Duration::from_secs(3600),
        ))
    }

    fn user(profile: UserProfile) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            name: "Ana Souza".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            profile,
            status: true,
            avatar: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips_into_caller_identity() {
        let svc = service();
        let u = user(UserProfile::Driver);
        let token = svc.generate_token(&u).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.access_token)).unwrap(),
        );
        let caller = svc.authenticate_headers(&headers).unwrap();
        assert_eq!(caller.user_id, u.id);
        assert_eq!(caller.roles, vec!["DRIVER".to_string()]);
        assert!(caller.has_permission(consts::MOVEMENTS_DELIVER));
        assert!(!caller.has_permission(consts::MOVEMENTS_CREATE));
    }

    #[test]
    fn token_from_other_secret_rejected() {
        let token = service().generate_token(&user(UserProfile::Admin)).unwrap();
        let mut other = service();
        other.config.jwt_secret =
            "Zz9Yy8Xx7Ww6Vv5Uu4Tt3Ss2Rr1Qq0Pp-another-secret-that-is-long-enough-to-pass".into();
        assert!(matches!(
            other.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn missing_bearer_prefix_is_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(
            service().authenticate_headers(&headers),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn admin_covers_every_permission() {
        let svc = service();
        let claims = svc
            .validate_token(&svc.generate_token(&user(UserProfile::Admin)).unwrap().access_token)
            .unwrap();
        let caller = AuthUser::from_claims(claims).unwrap();
        for permission in permissions::all() {
            assert!(caller.has_permission(permission));
        }
    }
}
