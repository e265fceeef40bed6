//! Product catalog.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockbook_core::aggregation::{loss_report, LossReport};
use stockbook_core::{NewProduct, Product, ProductPatch};
use stockbook_db::ProductFilter;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::{ok, ok_with, Envelope};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/low-stock", get(low_stock))
        .route("/products/problematic", get(problematic))
        .route("/products/barcode/{code}", get(by_barcode))
        .route("/products/{id}", get(get_one).put(update).delete(deactivate))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Envelope<Vec<Product>>>> {
    let filter = ProductFilter {
        query: params.query,
        category_id: params.category_id,
        limit: params.limit,
    };
    Ok(ok(state.db.products().list(&filter).await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Envelope<Product>>)> {
    let product = state.db.products().create(&input).await?;
    Ok((StatusCode::CREATED, ok_with(product, "Product created")))
}

async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<Product>>>> {
    Ok(ok(state.db.products().low_stock().await?))
}

/// Products priced below cost, with the loss each one carries in stock.
async fn problematic(State(state): State<AppState>) -> ApiResult<Json<Envelope<LossReport>>> {
    let products = state.db.products().problematic().await?;
    Ok(ok(loss_report(&products)))
}

async fn by_barcode(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Envelope<Product>>> {
    state
        .db
        .products()
        .find_by_barcode(&code)
        .await?
        .map(ok)
        .ok_or_else(|| ApiError::not_found("Product", &code))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<Product>>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(ok)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> ApiResult<Json<Envelope<Product>>> {
    let product = state.db.products().update(&id, &patch).await?;
    Ok(ok_with(product, "Product updated"))
}

/// Soft delete; past sales keep their snapshots.
async fn deactivate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<()>>> {
    state.db.products().deactivate(&id).await?;
    Ok(ok_with((), "Product deleted"))
}
