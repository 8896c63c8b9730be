use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::{
        common::{created_response, JsonBody},
        AppState,
    },
    services::products::{NewProduct, ProductChanges, ProductView},
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub amount: i32,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub url_cover: Option<String>,
    /// Owning branch id
    pub branch: Option<Uuid>,
}

/// `POST /products`
pub async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let product = state
        .services
        .products
        .create_product(
            &caller,
            NewProduct {
                name: payload.name,
                amount: payload.amount,
                description: payload.description,
                avatar: payload.avatar,
                url_cover: payload.url_cover,
                branch_id: payload.branch,
            },
        )
        .await?;
    Ok(created_response(ProductView::from(product)))
}

/// `GET /products`
pub async fn list_products(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<ProductView>>, ServiceError> {
    let products = state.services.products.list_products(&caller).await?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProductResponse {
    pub message: String,
    pub product: ProductView,
}

/// `PATCH /products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateProductRequest>,
) -> Result<Json<UpdateProductResponse>, ServiceError> {
    let product = state
        .services
        .products
        .update_product(
            &caller,
            id,
            ProductChanges {
                name: payload.name,
                avatar: payload.avatar,
            },
        )
        .await?;
    Ok(Json(UpdateProductResponse {
        message: "Product updated".to_string(),
        product: product.into(),
    }))
}
