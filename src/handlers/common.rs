use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input, reporting every violation at once
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// JSON request body. Malformed or incomplete bodies are rejected as a
/// `ServiceError::ValidationError` (400 with the usual error body) instead of
/// axum's plain-text 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Transfer {
        quantity: i32,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let JsonBody(transfer) =
            JsonBody::<Transfer>::from_request(json_request(r#"{"quantity": 3}"#), &())
                .await
                .unwrap();
        assert_eq!(transfer.quantity, 3);
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let err = JsonBody::<Transfer>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            ServiceError::ValidationError(msg) => assert!(msg.contains("quantity"), "{}", msg),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_type_and_broken_syntax_are_validation_errors() {
        for body in [r#"{"quantity": "three"}"#, "{\"quantity\": "] {
            let err = JsonBody::<Transfer>::from_request(json_request(body), &())
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::ValidationError(_)), "{}", body);
        }
    }
}
