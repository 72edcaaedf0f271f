use std::sync::RwLockWriteGuard;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use url::form_urlencoded;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use homely_harvest::assets::LOGO_PLACEHOLDER;
use homely_harvest::order::{EMPTY_CART_MESSAGE, added_message};
use homely_harvest::{
    ImageData, ImageSource, OrderSummary, SessionId, SharedStorefront, StoreError, Storefront,
};

const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

// === API Documentation ===

#[derive(OpenApi)]
#[openapi(
    paths(
        list_catalog,
        get_item_image,
        create_session,
        end_session,
        get_cart,
        add_item,
        set_item_quantity,
        clear_cart,
        place_order,
    ),
    components(
        schemas(
            CatalogResponse,
            CatalogItemResponse,
            SessionResponse,
            AddItemRequest,
            SetQuantityRequest,
            CartResponse,
            CartLineResponse,
            AddItemResponse,
            OrderResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "catalog", description = "Product catalog"),
        (name = "sessions", description = "Shopper sessions"),
        (name = "cart", description = "Per-session cart and checkout")
    )
)]
struct ApiDoc;

// === Request/Response Types ===

#[derive(Debug, Serialize, ToSchema)]
struct CatalogItemResponse {
    /// Item name, also its identifier
    name: String,
    /// Unit price
    price: u64,
    /// Either this server's image route or a placeholder URL
    image_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct CatalogResponse {
    store_name: String,
    tagline: String,
    /// Currency symbol prices are given in
    currency: String,
    /// Store logo
    logo_url: String,
    items: Vec<CatalogItemResponse>,
    count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
struct AddItemRequest {
    /// Catalog item name
    item: String,
    /// Quantity to add; zero or negative adds one (default: 1)
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
struct SetQuantityRequest {
    /// New quantity; zero or negative removes the item
    quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
struct CartLineResponse {
    item: String,
    quantity: u32,
    unit_price: u64,
    line_total: u64,
}

#[derive(Debug, Serialize, ToSchema)]
struct CartResponse {
    session_id: String,
    lines: Vec<CartLineResponse>,
    total: u64,
    /// Total formatted with the currency symbol
    total_display: String,
    /// Hint shown when there is nothing in the cart
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct AddItemResponse {
    message: String,
    cart: CartResponse,
}

#[derive(Debug, Serialize, ToSchema)]
struct OrderResponse {
    /// Checkout acknowledgment
    message: String,
    /// Plain-text order summary, one line per item
    summary: String,
    /// The order as it was before the cart was cleared
    order: CartResponse,
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    /// Error message
    error: String,
}

// === Helper Functions ===

enum ApiError {
    Store(StoreError),
    /// Request body the extractor refused, with the status it chose
    Rejected(StatusCode, String),
    Lock(String),
    Join(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::UnknownItem(_) | StoreError::SessionNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    StoreError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::Rejected(status, e) => (status, e),
            ApiError::Lock(e) | ApiError::Join(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };

        if status.is_server_error() {
            tracing::error!(%error, "request failed");
        }

        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn write_store(shop: &SharedStorefront) -> Result<RwLockWriteGuard<'_, Storefront>, ApiError> {
    shop.write()
        .map_err(|e| ApiError::Lock(format!("Lock error: {}", e)))
}

/// Run `f` under the read lock on the blocking pool
async fn with_store<T, F>(shop: SharedStorefront, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Storefront) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = shop
            .read()
            .map_err(|e| ApiError::Lock(format!("Lock error: {}", e)))?;
        f(&guard)
    })
    .await
    .map_err(|e| ApiError::Join(format!("Task join error: {}", e)))?
}

/// Run `f` under the write lock on the blocking pool
async fn with_store_mut<T, F>(shop: SharedStorefront, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Storefront) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = write_store(&shop)?;
        f(&mut guard)
    })
    .await
    .map_err(|e| ApiError::Join(format!("Task join error: {}", e)))?
}

/// Percent-encode an item name for use as a path segment
fn encode_segment(name: &str) -> String {
    form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn image_url(source: ImageSource, name: &str) -> String {
    match source {
        ImageSource::File(_) => format!("/catalog/{}/image", encode_segment(name)),
        ImageSource::Placeholder(url) => url,
    }
}

fn cart_response(session: &SessionId, summary: OrderSummary, currency: &str) -> CartResponse {
    CartResponse {
        session_id: session.to_string(),
        total_display: format!("{}{}", currency, summary.total),
        total: summary.total,
        message: summary
            .is_empty()
            .then(|| EMPTY_CART_MESSAGE.to_string()),
        lines: summary
            .lines
            .into_iter()
            .map(|l| CartLineResponse {
                item: l.item,
                quantity: l.quantity,
                unit_price: l.unit_price,
                line_total: l.line_total,
            })
            .collect(),
    }
}

/// Current cart of `session`, rendered for a response
fn current_cart(shop: &Storefront, session: &SessionId) -> Result<CartResponse, ApiError> {
    let summary = shop.cart(session)?;
    Ok(cart_response(session, summary, shop.currency()))
}

fn session_ttl() -> Duration {
    let secs = std::env::var("SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SESSION_TTL_SECS);
    Duration::from_secs(secs)
}

/// How often to look for idle sessions; never zero
fn sweep_period(ttl: Duration) -> Duration {
    ttl.min(MAX_SWEEP_PERIOD).max(Duration::from_secs(1))
}

fn sweep_idle_sessions(shop: &SharedStorefront, ttl: Duration) -> Result<usize, ApiError> {
    Ok(write_store(shop)?.expire_idle_sessions(ttl))
}

// === Handlers ===

/// List the catalog
#[utoipa::path(
    get,
    path = "/catalog",
    tag = "catalog",
    responses(
        (status = 200, description = "All catalog items", body = CatalogResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
async fn list_catalog(State(shop): State<SharedStorefront>) -> Result<Json<CatalogResponse>, ApiError> {
    let response = with_store(shop, |shop| {
        let catalog = shop.catalog();
        let items = catalog
            .entries()
            .iter()
            .map(|entry| -> Result<CatalogItemResponse, StoreError> {
                Ok(CatalogItemResponse {
                    image_url: image_url(shop.resolve_image(&entry.name)?, &entry.name),
                    name: entry.name.clone(),
                    price: entry.price,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CatalogResponse {
            store_name: catalog.store_name().to_string(),
            tagline: catalog.tagline().to_string(),
            currency: catalog.currency().to_string(),
            logo_url: LOGO_PLACEHOLDER.to_string(),
            count: items.len(),
            items,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Fetch an item's picture, or be redirected to its placeholder
#[utoipa::path(
    get,
    path = "/catalog/{item}/image",
    tag = "catalog",
    params(
        ("item" = String, Path, description = "Catalog item name (URL-encoded)")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 307, description = "Redirect to a placeholder image"),
        (status = 404, description = "Unknown item", body = ErrorResponse),
    )
)]
async fn get_item_image(
    State(shop): State<SharedStorefront>,
    Path(item): Path<String>,
) -> Result<Response, ApiError> {
    let image = with_store(shop, move |shop| Ok(shop.load_image(&item)?)).await?;

    Ok(match image {
        ImageData::Bytes { content_type, data } => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        ImageData::Placeholder(url) => Redirect::temporary(&url).into_response(),
    })
}

/// Start a session with an empty cart
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
async fn create_session(State(shop): State<SharedStorefront>) -> Result<impl IntoResponse, ApiError> {
    let session = with_store_mut(shop, |shop| Ok(shop.create_session())).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.to_string(),
        }),
    ))
}

/// End a session, discarding its cart
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 204, description = "Session ended"),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
async fn end_session(
    State(shop): State<SharedStorefront>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session: SessionId = session_id.parse()?;
    with_store_mut(shop, move |shop| Ok(shop.end_session(&session)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Show the session's cart
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/cart",
    tag = "cart",
    params(
        ("session_id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Current cart", body = CartResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
async fn get_cart(
    State(shop): State<SharedStorefront>,
    Path(session_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let session: SessionId = session_id.parse()?;
    let cart = with_store(shop, move |shop| current_cart(shop, &session)).await?;
    Ok(Json(cart))
}

/// Add an item to the cart
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/cart/items",
    tag = "cart",
    params(
        ("session_id" = String, Path, description = "Session id")
    ),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Item added", body = AddItemResponse),
        (status = 400, description = "Malformed session id or body", body = ErrorResponse),
        (status = 404, description = "Unknown session or item", body = ErrorResponse),
        (status = 422, description = "Body does not match the schema", body = ErrorResponse),
    )
)]
async fn add_item(
    State(shop): State<SharedStorefront>,
    Path(session_id): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<AddItemResponse>, ApiError> {
    let session: SessionId = session_id.parse()?;
    let Json(req) = payload?;

    let response = with_store_mut(shop, move |shop| {
        let added = shop.add_to_cart(&session, &req.item, req.quantity)?;
        Ok(AddItemResponse {
            message: added_message(added, &req.item),
            cart: current_cart(shop, &session)?,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Change the quantity of an item in the cart
#[utoipa::path(
    put,
    path = "/sessions/{session_id}/cart/items/{item}",
    tag = "cart",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("item" = String, Path, description = "Catalog item name (URL-encoded)")
    ),
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = CartResponse),
        (status = 400, description = "Malformed session id or body", body = ErrorResponse),
        (status = 404, description = "Unknown session or item", body = ErrorResponse),
        (status = 422, description = "Body does not match the schema", body = ErrorResponse),
    )
)]
async fn set_item_quantity(
    State(shop): State<SharedStorefront>,
    Path((session_id, item)): Path<(String, String)>,
    payload: Result<Json<SetQuantityRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let session: SessionId = session_id.parse()?;
    let Json(req) = payload?;

    let cart = with_store_mut(shop, move |shop| {
        shop.set_quantity(&session, &item, req.quantity)?;
        current_cart(shop, &session)
    })
    .await?;

    Ok(Json(cart))
}

/// Empty the cart
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}/cart",
    tag = "cart",
    params(
        ("session_id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Cart cleared", body = CartResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
async fn clear_cart(
    State(shop): State<SharedStorefront>,
    Path(session_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let session: SessionId = session_id.parse()?;

    let cart = with_store_mut(shop, move |shop| {
        shop.clear_cart(&session)?;
        current_cart(shop, &session)
    })
    .await?;

    Ok(Json(cart))
}

/// Check out: summarize the cart, then empty it
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/orders",
    tag = "cart",
    params(
        ("session_id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
async fn place_order(
    State(shop): State<SharedStorefront>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session: SessionId = session_id.parse()?;

    let response = with_store_mut(shop, move |shop| {
        let receipt = shop.place_order(&session)?;
        Ok(OrderResponse {
            order: cart_response(&session, receipt.summary, shop.currency()),
            message: receipt.message,
            summary: receipt.text,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

// === Main ===

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000u16);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let ttl = session_ttl();

    let storefront = Storefront::open()?;
    tracing::info!(
        store = storefront.catalog().store_name(),
        items = storefront.catalog().len(),
        currency = storefront.currency(),
        session_ttl_secs = ttl.as_secs(),
        "storefront ready"
    );

    let shared: SharedStorefront = storefront.into_shared();

    let sweeper = shared.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_period(ttl));
        loop {
            interval.tick().await;
            if sweep_idle_sessions(&sweeper, ttl).is_err() {
                tracing::error!("session sweep failed: storefront lock poisoned");
            }
        }
    });

    let swagger = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let app = Router::new()
        .merge(swagger)
        .route("/", get(|| async { Redirect::permanent("/swagger-ui") }))
        .route("/catalog", get(list_catalog))
        .route("/catalog/{item}/image", get(get_item_image))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", delete(end_session))
        .route("/sessions/{session_id}/cart", get(get_cart).delete(clear_cart))
        .route("/sessions/{session_id}/cart/items", post(add_item))
        .route("/sessions/{session_id}/cart/items/{item}", put(set_item_quantity))
        .route("/sessions/{session_id}/orders", post(place_order))
        .with_state(shared)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    tracing::info!("Server running at http://{}:{}", bind_addr, port);
    tracing::info!("Swagger UI available at http://{}:{}/swagger-ui/", bind_addr, port);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use axum::body::to_bytes;
    use homely_harvest::{AssetResolver, Catalog};

    fn shared_shop() -> SharedStorefront {
        Storefront::new(
            Catalog::default_menu(),
            AssetResolver::new(PathBuf::from("/nonexistent")),
        )
        .into_shared()
    }

    fn new_session(shop: &SharedStorefront) -> String {
        shop.write().unwrap().create_session().to_string()
    }

    /// Status and parsed JSON body of an error response
    async fn error_parts(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let shop = shared_shop();
        let session = new_session(&shop);
        let req = AddItemRequest {
            item: "Mango Pickle".to_string(),
            quantity: 1,
        };

        let err = add_item(State(shop), Path(session), Ok(Json(req)))
            .await
            .err()
            .unwrap();
        let (status, body) = error_parts(err).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown item: Mango Pickle");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let shop = shared_shop();
        let missing = SessionId::new().to_string();

        let err = get_cart(State(shop), Path(missing)).await.err().unwrap();
        let (status, body) = error_parts(err).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().starts_with("Session not found"));
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_bad_request() {
        let shop = shared_shop();

        let err = clear_cart(State(shop), Path("not-a-session".to_string()))
            .await
            .err()
            .unwrap();
        let (status, body) = error_parts(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid session id: not-a-session");
    }

    #[tokio::test]
    async fn test_rejected_body_is_json_error() {
        let shop = shared_shop();
        let session = new_session(&shop);

        let missing_field = Json::<SetQuantityRequest>::from_bytes(b"{}");
        let err = set_item_quantity(
            State(shop.clone()),
            Path((session.clone(), "Besan Ladoo".to_string())),
            missing_field,
        )
        .await
        .err()
        .unwrap();
        let (status, body) = error_parts(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());

        let malformed = Json::<SetQuantityRequest>::from_bytes(b"{\"quantity\": lots}");
        let err = set_item_quantity(
            State(shop),
            Path((session, "Besan Ladoo".to_string())),
            malformed,
        )
        .await
        .err()
        .unwrap();
        let (status, body) = error_parts(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_empty_cart_carries_hint() {
        let shop = shared_shop();
        let session = new_session(&shop);

        let Ok(Json(cart)) = get_cart(State(shop), Path(session)).await else {
            panic!("cart lookup failed");
        };

        assert!(cart.lines.is_empty());
        assert_eq!(cart.message.as_deref(), Some(EMPTY_CART_MESSAGE));
    }

    #[tokio::test]
    async fn test_add_then_order() {
        let shop = shared_shop();
        let session = new_session(&shop);
        let req = AddItemRequest {
            item: "Dry Coconut (Sukha Khobra)".to_string(),
            quantity: 0,
        };

        let Ok(Json(added)) = add_item(State(shop.clone()), Path(session.clone()), Ok(Json(req))).await
        else {
            panic!("add failed");
        };
        assert_eq!(added.message, "Added 1 x Dry Coconut (Sukha Khobra) to cart");
        assert_eq!(added.cart.total_display, "₹80");
        assert_eq!(added.cart.message, None);

        let placed = place_order(State(shop.clone()), Path(session.clone())).await;
        let response = placed.ok().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let order: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(order["summary"], "Dry Coconut (Sukha Khobra) x1 = ₹80");

        let Ok(Json(cart)) = get_cart(State(shop), Path(session)).await else {
            panic!("cart lookup failed");
        };
        assert!(cart.lines.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_lists_store_details() {
        let Ok(Json(catalog)) = list_catalog(State(shared_shop())).await else {
            panic!("catalog listing failed");
        };

        assert_eq!(catalog.store_name, "Homely Harvest");
        assert_eq!(catalog.count, 7);
        assert!(catalog.items[0].image_url.starts_with("https://via.placeholder.com/"));
    }

    #[test]
    fn test_sweep_period_bounds() {
        assert_eq!(sweep_period(Duration::from_secs(1800)), MAX_SWEEP_PERIOD);
        assert_eq!(sweep_period(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(sweep_period(Duration::ZERO), Duration::from_secs(1));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("Poha (Beaten Rice)"), "Poha%20%28Beaten%20Rice%29");
    }
}
