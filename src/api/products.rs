//! Product listing endpoints.
//!
//! - POST `/add` - List a new product (authenticated)
//! - GET `/{uuid}` - Get a product and count the view
//! - DELETE `/{uuid}` - Delete one of your own products (authenticated)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, validate_length, validate_uuid};
use crate::auth::{SessionAuth, SessionAuthenticator, SessionUser};
use crate::db::{Database, NewProduct, Product, User};
use crate::impl_has_auth_backend;

const MAX_PRICE: i64 = 200_000;

#[derive(Clone)]
pub struct ProductsState {
    pub db: Database,
    pub auth: SessionAuthenticator<Database>,
}

impl_has_auth_backend!(ProductsState);

pub fn router(state: ProductsState) -> Router {
    Router::new()
        .route("/add", post(add_product))
        .route("/{uuid}", get(get_product).delete(delete_product))
        .with_state(state)
}

#[derive(Deserialize)]
struct AddProductRequest {
    brand: String,
    size: String,
    price: i64,
    description: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    #[serde(rename = "_id")]
    id: String,
    writer: String,
    brand: String,
    size: String,
    price: i64,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    sold: bool,
    views: i64,
    likes: i64,
    created_at: String,
    updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.uuid,
            writer: p.writer,
            brand: p.brand,
            size: p.size,
            price: p.price,
            description: p.description,
            kind: p.kind,
            sold: p.sold,
            views: p.views,
            likes: p.likes,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
struct DeletedResponse {
    general: &'static str,
}

fn validate_product(req: &AddProductRequest) -> Result<NewProduct, ApiError> {
    let brand = req.brand.trim();
    let size = req.size.trim();
    let description = req.description.trim();
    let kind = req.kind.trim();

    validate_length("Brand", brand, 1, 64)?;
    validate_length("Size", size, 1, 48)?;
    validate_length("Description", description, 3, 100)?;
    validate_length("Type", kind, 3, 50)?;

    if !(0..=MAX_PRICE).contains(&req.price) {
        return Err(ApiError::bad_request(format!(
            "Price must be between 0 and {}",
            MAX_PRICE
        )));
    }

    Ok(NewProduct {
        brand: brand.to_string(),
        size: size.to_string(),
        price: req.price,
        description: description.to_string(),
        kind: kind.to_string(),
    })
}

/// Resolve the session's user record.
async fn session_owner(db: &Database, session: &SessionUser) -> Result<User, ApiError> {
    db.users()
        .get_by_uuid(session.user_uuid())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("User not found"))
}

async fn add_product(
    State(state): State<ProductsState>,
    SessionAuth(session): SessionAuth,
    Json(payload): Json<AddProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_product = validate_product(&payload)?;
    let owner = session_owner(&state.db, &session).await?;

    let product = state
        .db
        .products()
        .create(owner.id, &new_product)
        .await
        .db_err("Failed to create product")?;

    info!(product = %product.uuid, user = %owner.uuid, "Product listed");

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

async fn get_product(
    State(state): State<ProductsState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let product = state
        .db
        .products()
        .record_view(&uuid)
        .await
        .db_err("Failed to get product")?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(ProductResponse::from(product)))
}

async fn delete_product(
    State(state): State<ProductsState>,
    SessionAuth(session): SessionAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;
    let owner = session_owner(&state.db, &session).await?;

    // Products owned by someone else are indistinguishable from missing ones
    let deleted = state
        .db
        .products()
        .delete(&uuid, owner.id)
        .await
        .db_err("Failed to delete product")?;
    if !deleted {
        return Err(ApiError::not_found("Product not found"));
    }

    info!(product = %uuid, user = %owner.uuid, "Product deleted");

    Ok(Json(DeletedResponse {
        general: "Product deleted",
    }))
}
