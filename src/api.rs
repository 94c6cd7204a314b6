//! REST API for the loading service.
//!
//! Provides HTTP endpoints for packing one box type into a container, streaming
//! the pipeline progress, evaluating batches and listing the container catalog.
//! Uses Axum as the web framework and supports CORS.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::batch::{BatchRow, BatchRowResult, BatchRunner};
use crate::catalog::{ContainerCatalog, ContainerRecord};
use crate::config::{ApiConfig, OptimizerConfig};
use crate::model::{BoxSpec, ContainerSpec, PackResult, ValidationError};
use crate::optimizer::{PackEvent, PackingConfig, Stage, pack_with_config, pack_with_progress};
use crate::units::LengthUnit;

#[derive(Clone)]
struct ApiState {
    packing: PackingConfig,
    catalog: Arc<ContainerCatalog>,
    batch: BatchRunner,
}

impl ApiState {
    fn new(packing: PackingConfig, catalog: Arc<ContainerCatalog>, cache_capacity: usize) -> Self {
        let batch = BatchRunner::new(Arc::clone(&catalog), packing, cache_capacity);
        Self {
            packing,
            catalog,
            batch,
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>load-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// The box type to load.
///
/// `dims` are (length, width, height) in the request's input unit.
#[derive(Deserialize, Clone, ToSchema)]
pub struct BoxRequest {
    #[schema(value_type = [f64; 3], example = json!([79.4, 49.1, 87.0]))]
    pub dims: (f64, f64, f64),
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub value: Option<f64>,
}

/// An ad-hoc container; `dims` are (length, width, height) in the input unit.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ContainerRequest {
    #[schema(value_type = [f64; 3], example = json!([1203.0, 234.0, 270.0]))]
    pub dims: (f64, f64, f64),
    pub max_load: f64,
}

/// Request structure for the packing endpoints.
///
/// Exactly one of `container_id` (catalog entry) and `container` (inline) must be given.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "box": { "dims": [79.4, 49.1, 87.0], "weight": 12.5 },
        "container_id": "40ft-hc",
        "input_unit": "cm",
        "output_unit": "m"
    })
)]
pub struct PackRequest {
    #[serde(rename = "box")]
    pub item: BoxRequest,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container_id: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container: Option<ContainerRequest>,
    #[serde(default)]
    pub input_unit: LengthUnit,
    #[serde(default = "default_output_unit")]
    pub output_unit: LengthUnit,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

fn default_output_unit() -> LengthUnit {
    LengthUnit::Meter
}

#[derive(Debug)]
struct ValidatedPackRequest {
    item: BoxSpec,
    container: ContainerSpec,
    container_id: Option<String>,
    output_unit: LengthUnit,
    allow_rotation: Option<bool>,
}

impl ValidatedPackRequest {
    /// Applies the request-level overrides to the service configuration.
    fn packing_config(&self, base: PackingConfig) -> PackingConfig {
        let mut config = base;
        if let Some(allow_rotation) = self.allow_rotation {
            config.allow_rotation = allow_rotation;
        }
        config
    }
}

#[derive(Debug)]
enum PackRequestValidationError {
    MissingContainer,
    AmbiguousContainer,
    UnknownContainer(String),
    InvalidContainer(ValidationError),
    InvalidBox(ValidationError),
}

impl PackRequest {
    fn into_validated(
        self,
        catalog: &ContainerCatalog,
    ) -> Result<ValidatedPackRequest, PackRequestValidationError> {
        let unit = self.input_unit;
        let container = match (&self.container_id, self.container) {
            (Some(_), Some(_)) => return Err(PackRequestValidationError::AmbiguousContainer),
            (None, None) => return Err(PackRequestValidationError::MissingContainer),
            (Some(id), None) => catalog
                .get(id)
                .ok_or_else(|| PackRequestValidationError::UnknownContainer(id.clone()))?
                .to_spec(),
            (None, Some(inline)) => {
                let (length, width, height) = inline.dims;
                ContainerSpec::new(
                    unit.to_mm(length),
                    unit.to_mm(width),
                    unit.to_mm(height),
                    inline.max_load,
                )
            }
        }
        .map_err(PackRequestValidationError::InvalidContainer)?;

        let (length, width, height) = self.item.dims;
        let mut item = BoxSpec::new(unit.to_mm(length), unit.to_mm(width), unit.to_mm(height))
            .map_err(PackRequestValidationError::InvalidBox)?;
        if let Some(weight) = self.item.weight {
            item = item.with_weight(weight);
        }
        if let Some(value) = self.item.value {
            item = item.with_value(value);
        }
        item.validate().map_err(PackRequestValidationError::InvalidBox)?;

        Ok(ValidatedPackRequest {
            item,
            container,
            container_id: self.container_id,
            output_unit: self.output_unit,
            allow_rotation: self.allow_rotation,
        })
    }
}

/// The container a response refers to, in the output unit.
#[derive(Serialize, ToSchema)]
pub struct PackedContainer {
    pub id: Option<String>,
    /// (length, width, height)
    #[schema(value_type = [f64; 3], example = json!([12.03, 2.34, 2.7]))]
    pub dims: (f64, f64, f64),
    pub max_load: f64,
}

/// Single placed box in the response.
///
/// # Fields
/// * `pos` - Anchor (x = length, y = height, z = width)
/// * `size` - Extents along the same axes
#[derive(Serialize, ToSchema)]
pub struct PackedBox {
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub pos: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([0.491, 0.87, 0.794]))]
    pub size: (f64, f64, f64),
}

/// Response of the packing endpoints. Lengths are in `unit`.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub unit: LengthUnit,
    pub container: PackedContainer,
    pub total_boxes: usize,
    /// Volumetric utilization in percent
    pub utilization: f64,
    pub loaded_weight: Option<f64>,
    pub loaded_value: Option<f64>,
    /// Set when the loaded weight exceeds the container's maximum load
    pub overweight: bool,
    pub placements: Vec<PackedBox>,
}

impl PackResponse {
    fn from_pack_result(
        result: &PackResult,
        container: &ContainerSpec,
        container_id: Option<String>,
        unit: LengthUnit,
    ) -> Self {
        let convert = |v: f64| unit.from_mm(v);
        let placements = result
            .placements
            .iter()
            .map(|p| PackedBox {
                pos: (convert(p.position.x), convert(p.position.y), convert(p.position.z)),
                size: (
                    convert(p.rotation.length),
                    convert(p.rotation.height),
                    convert(p.rotation.width),
                ),
            })
            .collect();

        Self {
            unit,
            container: PackedContainer {
                id: container_id,
                dims: (
                    convert(container.length),
                    convert(container.width),
                    convert(container.height),
                ),
                max_load: container.max_load,
            },
            total_boxes: result.total_boxes,
            utilization: result.volume_utilization(container),
            loaded_weight: result.loaded_weight,
            loaded_value: result.loaded_value,
            overweight: result.loaded_weight.is_some_and(|w| w > container.max_load),
            placements,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "rows": [
            { "length": 79.4, "width": 49.1, "height": 87.0, "unit_weight": 12.5, "quantity": 4, "container_id": "40ft" }
        ]
    })
)]
pub struct BatchRequest {
    pub rows: Vec<BatchRow>,
}

#[derive(Serialize, ToSchema)]
pub struct BatchResponse {
    pub results: Vec<BatchRowResult>,
    /// Rows that could not be evaluated
    pub failed_rows: usize,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn worker_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Packing worker failed",
        details,
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    catalog: &ContainerCatalog,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(catalog) {
        Ok(validated) => Ok(validated),
        Err(PackRequestValidationError::MissingContainer) => Err(container_config_error(
            "Either container_id or container must be specified",
        )),
        Err(PackRequestValidationError::AmbiguousContainer) => Err(container_config_error(
            "Specify either container_id or container, not both",
        )),
        Err(PackRequestValidationError::UnknownContainer(id)) => Err(container_config_error(
            format!("Unknown container '{}'", id),
        )),
        Err(PackRequestValidationError::InvalidContainer(err)) => {
            Err(container_config_error(err.to_string()))
        }
        Err(PackRequestValidationError::InvalidBox(err)) => Err(validation_error(err.to_string())),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream, handle_pack_batch, list_containers),
    components(
        schemas(
            PackRequest,
            BoxRequest,
            ContainerRequest,
            PackResponse,
            PackedContainer,
            PackedBox,
            BatchRequest,
            BatchResponse,
            BatchRow,
            BatchRowResult,
            ContainerRecord,
            ErrorResponse,
            PackEvent,
            Stage,
            LengthUnit
        )
    ),
    tags(
        (name = "packing", description = "Endpoints for container loading"),
        (name = "catalog", description = "Available containers")
    )
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // API endpoints
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/pack_batch", post(handle_pack_batch))
        .route("/containers", get(list_containers))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the frontend.
/// Runs until the server is terminated; fails if the address cannot be bound.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer: OptimizerConfig,
    catalog: ContainerCatalog,
) -> std::io::Result<()> {
    let state = ApiState::new(
        optimizer.packing_config(),
        Arc::new(catalog),
        optimizer.batch_cache_capacity(),
    );
    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        error!("❌ Could not bind API server to {}: {}", addr, err);
        err
    })?;

    let display_host = config.display_host().to_string();
    info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API Endpoints:");
    info!("   - POST /pack");
    info!("   - POST /pack_stream");
    info!("   - POST /pack_batch");
    info!("   - GET /containers");
    info!("📑 Documentation:");
    info!("   - GET /docs");
    info!("   - GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /pack endpoint.
///
/// Packs as many boxes of one type as possible into the container.
///
/// # Parameters
/// * `payload` - JSON payload with the box and the container (catalog id or inline)
///
/// # Returns
/// JSON response with every placement, converted to the requested output unit
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Successfully packed boxes", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Packing worker failed", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let request = match parse_pack_request(payload, &state.catalog) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "📥 New pack request: box {}×{}×{} mm, container {}×{}×{} mm",
        request.item.length,
        request.item.width,
        request.item.height,
        request.container.length,
        request.container.width,
        request.container.height
    );

    let config = request.packing_config(state.packing);
    let ValidatedPackRequest {
        item,
        container,
        container_id,
        output_unit,
        ..
    } = request;

    let job_container = container.clone();
    let outcome =
        tokio::task::spawn_blocking(move || pack_with_config(&item, &job_container, &config)).await;

    match outcome {
        Ok(Ok(result)) => {
            info!(
                "📦 Result: {} boxes, {:.1}% utilization",
                result.total_boxes,
                result.volume_utilization(&container)
            );
            let response =
                PackResponse::from_pack_result(&result, &container, container_id, output_unit);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(err)) => validation_error(err.to_string()),
        Err(err) => {
            error!("❌ Packing worker failed: {}", err);
            worker_error(err.to_string())
        }
    }
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams a `progress` event per pipeline stage, then a single `result`
/// (or `error`) event carrying the same body as POST /pack.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pipeline progress, then the result",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let request = match parse_pack_request(payload, &state.catalog) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let config = request.packing_config(state.packing);
    let ValidatedPackRequest {
        item,
        container,
        container_id,
        output_unit,
        ..
    } = request;

    let (tx, rx) = mpsc::channel::<(&'static str, String)>(32);

    tokio::task::spawn_blocking(move || {
        let progress = tx.clone();
        let outcome = pack_with_progress(&item, &container, &config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver discards the remaining events.
                let _ = progress.blocking_send(("progress", json));
            }
        });

        let message = match outcome {
            Ok(result) => serde_json::to_string(&PackResponse::from_pack_result(
                &result,
                &container,
                container_id,
                output_unit,
            ))
            .map(|json| ("result", json)),
            Err(err) => serde_json::to_string(&ErrorResponse::new("Packing failed", err.to_string()))
                .map(|json| ("error", json)),
        };
        if let Ok(message) = message {
            let _ = tx.blocking_send(message);
        }
    });

    let stream = ReceiverStream::new(rx).map(|(name, msg)| {
        Ok::<_, std::convert::Infallible>(Event::default().event(name).data(msg))
    });
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /pack_batch endpoint.
///
/// Evaluates every row against the catalog. Rows that fail carry an `error`
/// instead of failing the whole request.
#[utoipa::path(
    post,
    path = "/pack_batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "One result per row, in input order", body = BatchResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_pack_batch(
    State(state): State<ApiState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if request.rows.is_empty() {
        return validation_error("At least one row must be specified");
    }

    info!("📥 New batch request: {} rows", request.rows.len());
    let results = state.batch.run(&request.rows).await;
    let failed_rows = results.iter().filter(|r| r.error.is_some()).count();
    info!(
        "📦 Batch finished: {} rows, {} failed",
        results.len(),
        failed_rows
    );

    (
        StatusCode::OK,
        Json(BatchResponse {
            results,
            failed_rows,
        }),
    )
        .into_response()
}

/// Handler for GET /containers endpoint.
#[utoipa::path(
    get,
    path = "/containers",
    responses(
        (status = 200, description = "Catalog containers (cm, kg)", body = [ContainerRecord])
    ),
    tag = "catalog"
)]
async fn list_containers(State(state): State<ApiState>) -> Response {
    Json(state.catalog.records().to_vec()).into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PackCache;
    use serde_json::Value;

    fn state() -> ApiState {
        ApiState::new(
            PackingConfig::default(),
            Arc::new(ContainerCatalog::builtin()),
            PackCache::DEFAULT_CAPACITY,
        )
    }

    fn inline_request(edge: f64, container_edge: f64) -> PackRequest {
        PackRequest {
            item: BoxRequest {
                dims: (edge, edge, edge),
                weight: None,
                value: None,
            },
            container_id: None,
            container: Some(ContainerRequest {
                dims: (container_edge, container_edge, container_edge),
                max_load: 1000.0,
            }),
            input_unit: LengthUnit::Centimeter,
            output_unit: LengthUnit::Meter,
            allow_rotation: None,
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Body should be readable");
        serde_json::from_slice(&bytes).expect("Body should be JSON")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/pack", "/pack_stream", "/pack_batch", "/containers"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in [
            "PackRequest",
            "PackResponse",
            "BatchResponse",
            "ContainerRecord",
            "PackEvent",
            "ErrorResponse",
        ] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from the OpenAPI document",
                name
            );
        }
    }

    #[test]
    fn pack_request_uses_unit_defaults() {
        let json = r#"{
            "box": {"dims": [79.4, 49.1, 87.0]},
            "container_id": "40ft"
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.input_unit, LengthUnit::Centimeter);
        assert_eq!(request.output_unit, LengthUnit::Meter);
        assert_eq!(request.allow_rotation, None);
        assert!(request.container.is_none());
    }

    #[test]
    fn catalog_container_is_resolved_in_millimeters() {
        let json = r#"{
            "box": {"dims": [79.4, 49.1, 87.0], "weight": 12.5},
            "container_id": "40ft-hc"
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        let validated = request
            .into_validated(&ContainerCatalog::builtin())
            .expect("Should validate successfully");

        assert_eq!(validated.container.length, 12030.0);
        assert_eq!(validated.container.height, 2700.0);
        assert!((validated.item.length - 794.0).abs() < 1e-9);
        assert_eq!(validated.item.weight, Some(12.5));
        assert_eq!(validated.container_id.as_deref(), Some("40ft-hc"));
    }

    #[test]
    fn inline_container_uses_input_unit() {
        let mut request = inline_request(500.0, 1000.0);
        request.input_unit = LengthUnit::Millimeter;
        let validated = request
            .into_validated(&ContainerCatalog::builtin())
            .expect("Should validate successfully");
        assert_eq!(validated.container.length, 1000.0);
        assert_eq!(validated.item.height, 500.0);
    }

    #[test]
    fn container_selection_is_validated() {
        let catalog = ContainerCatalog::builtin();

        let mut missing = inline_request(10.0, 100.0);
        missing.container = None;
        assert!(matches!(
            missing.into_validated(&catalog),
            Err(PackRequestValidationError::MissingContainer)
        ));

        let mut both = inline_request(10.0, 100.0);
        both.container_id = Some("20ft".to_string());
        assert!(matches!(
            both.into_validated(&catalog),
            Err(PackRequestValidationError::AmbiguousContainer)
        ));

        let mut unknown = inline_request(10.0, 100.0);
        unknown.container = None;
        unknown.container_id = Some("45ft".to_string());
        assert!(matches!(
            unknown.into_validated(&catalog),
            Err(PackRequestValidationError::UnknownContainer(id)) if id == "45ft"
        ));

        assert!(matches!(
            inline_request(10.0, -1.0).into_validated(&catalog),
            Err(PackRequestValidationError::InvalidContainer(_))
        ));
        assert!(matches!(
            inline_request(0.0, 100.0).into_validated(&catalog),
            Err(PackRequestValidationError::InvalidBox(_))
        ));
    }

    #[test]
    fn request_level_allow_rotation_overrides_config() {
        let base = PackingConfig::builder().allow_rotation(false).build();
        let catalog = ContainerCatalog::builtin();

        let mut request = inline_request(10.0, 100.0);
        request.allow_rotation = Some(true);
        let validated = request.into_validated(&catalog).unwrap();
        assert!(validated.packing_config(base).allow_rotation);

        let validated = inline_request(10.0, 100.0).into_validated(&catalog).unwrap();
        assert!(!validated.packing_config(base).allow_rotation);
    }

    #[tokio::test]
    async fn pack_endpoint_returns_placements_in_output_unit() {
        let response = handle_pack(State(state()), Ok(Json(inline_request(50.0, 100.0)))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["total_boxes"], 8);
        assert_eq!(body["unit"], "m");
        assert_eq!(body["overweight"], false);
        assert_eq!(body["container"]["dims"][0], 1.0);
        let placements = body["placements"].as_array().unwrap();
        assert_eq!(placements.len(), 8);
        assert_eq!(placements[0]["size"][0], 0.5);
        assert!((body["utilization"].as_f64().unwrap() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pack_endpoint_rejects_invalid_box() {
        let response = handle_pack(State(state()), Ok(Json(inline_request(-5.0, 100.0)))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input data");
    }

    #[tokio::test]
    async fn oversized_box_is_not_an_error() {
        let response = handle_pack(State(state()), Ok(Json(inline_request(150.0, 100.0)))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_boxes"], 0);
    }

    #[tokio::test]
    async fn overweight_loads_are_flagged() {
        let mut request = inline_request(50.0, 100.0);
        request.item.weight = Some(200.0);
        let response = handle_pack(State(state()), Ok(Json(request))).await;
        let body = body_json(response).await;
        assert_eq!(body["loaded_weight"], 1600.0);
        assert_eq!(body["overweight"], true);
    }

    #[tokio::test]
    async fn stream_endpoint_sends_progress_then_result() {
        let response =
            handle_pack_stream(State(state()), Ok(Json(inline_request(50.0, 100.0)))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Stream should complete");
        let text = String::from_utf8_lossy(&bytes);
        let first_progress = text.find("progress").expect("progress events expected");
        let result = text.find("\"placements\"").expect("result event expected");
        assert!(first_progress < result);
        assert!(text.contains("\"type\":\"Finished\""));
        assert!(text.contains("\"total_boxes\":8"));
    }

    #[tokio::test]
    async fn batch_endpoint_reports_every_row() {
        let rows = vec![
            BatchRow {
                length: 79.4,
                width: 49.1,
                height: 87.0,
                unit_weight: None,
                quantity: 2,
                container_id: "40ft-hc".to_string(),
            },
            BatchRow {
                length: 10.0,
                width: 10.0,
                height: 10.0,
                unit_weight: None,
                quantity: 1,
                container_id: "missing".to_string(),
            },
        ];
        let response = handle_pack_batch(State(state()), Ok(Json(BatchRequest { rows }))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["failed_rows"], 1);
        assert_eq!(body["results"][0]["boxes"], 207);
        assert_eq!(body["results"][0]["total_units"], 414);
        assert!(body["results"][1]["error"].is_string());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let response =
            handle_pack_batch(State(state()), Ok(Json(BatchRequest { rows: Vec::new() }))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn containers_endpoint_lists_catalog() {
        let response = list_containers(State(state())).await;
        let body = body_json(response).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["20ft", "40ft", "40ft-hc"]);
    }
}
