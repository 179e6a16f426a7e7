use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use korjournal_core::LogbookError;
use korjournal_core::distance::{DistanceResolver, RouteDistanceTracker};
use korjournal_core::models::{
    Category, DistanceMode, DriveEntry, DriveEntryInput, NewVehicle, OdometerReading, Vehicle,
    amount_for, parse_date, route_distance,
};
use korjournal_core::report::{ReportFilter, csv_filename};

use crate::commands::Logbook;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<Logbook>>,
    distance: Arc<dyn DistanceResolver>,
    /// Address pair of the trip form being filled in; only its latest lookup counts.
    route: Arc<Mutex<RouteDistanceTracker>>,
}

impl AppState {
    fn new(svc: Logbook, distance: Arc<dyn DistanceResolver>) -> Self {
        Self {
            svc: Arc::new(Mutex::new(svc)),
            distance,
            route: Arc::new(Mutex::new(RouteDistanceTracker::new())),
        }
    }

    fn logbook(&self) -> MutexGuard<'_, Logbook> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self) -> MutexGuard<'_, RouteDistanceTracker> {
        self.route.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateVehicleRequest {
    license_plate: String,
    make: Option<String>,
    model: Option<String>,
    color: Option<String>,
    #[serde(default)]
    is_default: bool,
}

#[derive(Deserialize)]
struct CreateReadingRequest {
    car_id: Uuid,
    date: String,
    odometer: u64,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct ReadingQuery {
    car_id: Option<Uuid>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Deserialize)]
struct CreateTripRequest {
    date: String,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    end_time: String,
    start_odometer: Option<f64>,
    end_odometer: Option<f64>,
    #[serde(default)]
    from_address: String,
    #[serde(default)]
    to_address: String,
    #[serde(default)]
    roundtrip: bool,
    resolved_km: Option<f64>,
    #[serde(default)]
    purpose: String,
    vehicle_type: Option<String>,
    category: Option<Category>,
    license_plate: Option<String>,
    distance_mode: Option<DistanceMode>,
}

impl CreateTripRequest {
    /// Without an explicit mode, any odometer value selects odometer mode.
    fn into_input(self) -> Result<DriveEntryInput, ApiError> {
        let date = parse_date(&self.date)?;
        let mode = self.distance_mode.unwrap_or(
            if self.start_odometer.is_none() && self.end_odometer.is_none() {
                DistanceMode::Route
            } else {
                DistanceMode::Odometer
            },
        );
        let mut input = match mode {
            DistanceMode::Odometer => DriveEntryInput::odometer(
                date,
                self.start_odometer.unwrap_or_default(),
                self.end_odometer.unwrap_or_default(),
            ),
            DistanceMode::Route => DriveEntryInput::route(
                date,
                &self.from_address,
                &self.to_address,
                self.roundtrip,
                self.resolved_km,
            ),
        };
        input.start_time = self.start_time;
        input.end_time = self.end_time;
        input.purpose = self.purpose;
        if let Some(vt) = self.vehicle_type {
            input.vehicle_type = vt;
        }
        if let Some(c) = self.category {
            input.category = c;
        }
        input.license_plate = self.license_plate;
        if mode == DistanceMode::Odometer {
            input.from_address = self.from_address;
            input.to_address = self.to_address;
            input.roundtrip = self.roundtrip;
        }
        Ok(input)
    }
}

#[derive(Deserialize)]
struct ReportQuery {
    from: Option<String>,
    to: Option<String>,
    car: Option<String>,
    category: Option<String>,
}

impl ReportQuery {
    fn into_filter(self) -> Result<ReportFilter, ApiError> {
        let date = |s: Option<String>| s.as_deref().map(parse_date).transpose();
        Ok(ReportFilter {
            from: date(self.from)?,
            to: date(self.to)?,
            license_plate: self.car.filter(|c| !c.trim().is_empty()),
            category: self
                .category
                .as_deref()
                .map(str::parse::<Category>)
                .transpose()?,
        })
    }
}

#[derive(Deserialize)]
struct DuplicateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct DistanceQuery {
    origin: String,
    destination: String,
    #[serde(default)]
    roundtrip: bool,
}

#[derive(Serialize)]
struct DistanceResponse {
    origin: String,
    destination: String,
    one_way_km: f64,
    distance: f64,
    amount: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<LogbookError> for ApiError {
    fn from(err: LogbookError) -> Self {
        match err {
            LogbookError::Validation(_) => Self::BadRequest(err.to_string()),
            LogbookError::OdometerRegression { .. } => Self::Conflict(err.to_string()),
            LogbookError::DistanceResolution(_) => Self::BadGateway(err.to_string()),
            LogbookError::Storage(_) | LogbookError::Serialization(_) | LogbookError::Export(_) => {
                Self::Internal(err.into())
            }
        }
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

// --- Handlers ---

async fn get_distance(
    State(state): State<AppState>,
    Query(q): Query<DistanceQuery>,
) -> Result<Json<DistanceResponse>, ApiError> {
    let origin = q.origin.trim().to_string();
    let destination = q.destination.trim().to_string();
    if origin.is_empty() || destination.is_empty() {
        return Err(ApiError::BadRequest(
            "origin and destination are required".to_string(),
        ));
    }

    let ticket = state.route().begin(&origin, &destination);
    let resolver = Arc::clone(&state.distance);
    let (o, d) = (origin.clone(), destination.clone());
    let result = tokio::task::spawn_blocking(move || resolver.resolve(&o, &d))
        .await
        .context("distance lookup task failed")?
        .map_err(|e| format!("Could not calculate distance: {e:#}"));

    let applied = state.route().complete(&ticket, result.clone());
    if !applied {
        return Err(ApiError::Conflict(format!(
            "Lookup for '{origin}' to '{destination}' was replaced by a newer one"
        )));
    }
    let one_way_km = result.map_err(ApiError::BadGateway)?;

    let distance = route_distance(one_way_km, q.roundtrip);
    Ok(Json(DistanceResponse {
        origin,
        destination,
        one_way_km,
        distance,
        amount: amount_for(distance),
    }))
}

async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<Vehicle>> {
    Json(state.logbook().list_vehicles().to_vec())
}

async fn create_vehicle(
    State(state): State<AppState>,
    Json(req): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    let vehicle = state.logbook().add_vehicle(NewVehicle {
        license_plate: req.license_plate,
        make: req.make,
        model: req.model,
        color: req.color,
        is_default: req.is_default,
    })?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn set_default_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, ApiError> {
    let mut svc = state.logbook();
    if !svc.set_default_vehicle(id)? {
        return Err(ApiError::NotFound(format!("Vehicle {id} not found")));
    }
    let vehicle = svc
        .get_vehicle(id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Vehicle {id} not found")))?;
    Ok(Json(vehicle))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.logbook().delete_vehicle(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Vehicle {id} not found")))
    }
}

async fn list_readings(
    State(state): State<AppState>,
    Query(q): Query<ReadingQuery>,
) -> Result<Json<Vec<OdometerReading>>, ApiError> {
    let from = q.from.as_deref().map(parse_date).transpose()?;
    let to = q.to.as_deref().map(parse_date).transpose()?;

    let svc = state.logbook();
    let mut readings = match q.car_id {
        Some(car_id) => svc.readings_for(car_id),
        None => svc.list_readings().to_vec(),
    };
    readings.retain(|r| from.is_none_or(|f| r.date >= f) && to.is_none_or(|t| r.date <= t));
    Ok(Json(readings))
}

async fn create_reading(
    State(state): State<AppState>,
    Json(req): Json<CreateReadingRequest>,
) -> Result<(StatusCode, Json<OdometerReading>), ApiError> {
    let date = parse_date(&req.date)?;
    let reading = state
        .logbook()
        .add_reading(req.car_id, date, req.odometer, req.notes)?;
    Ok((StatusCode::CREATED, Json(reading)))
}

async fn list_trips(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> Result<Json<Vec<DriveEntry>>, ApiError> {
    let filter = q.into_filter()?;
    let svc = state.logbook();
    let entries: Vec<DriveEntry> = svc.filtered_entries(&filter).into_iter().cloned().collect();
    Ok(Json(entries))
}

async fn create_trip(
    State(state): State<AppState>,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<DriveEntry>), ApiError> {
    let input = req.into_input()?;

    let entry = if input.distance_mode == DistanceMode::Route && input.resolved_km.is_none() {
        // The lookup blocks, so run it with the logbook on the blocking pool.
        let svc = Arc::clone(&state.svc);
        let resolver = Arc::clone(&state.distance);
        tokio::task::spawn_blocking(move || {
            svc.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .resolve_and_add_entry(input, resolver.as_ref())
        })
        .await
        .context("distance lookup task failed")??
    } else {
        let mut svc = state.logbook();
        svc.add_entry(input)?
    };
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.logbook().delete_entry(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Trip {id} not found")))
    }
}

async fn duplicate_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<DuplicateQuery>,
) -> Result<(StatusCode, Json<DriveEntry>), ApiError> {
    let date = match q.date {
        Some(d) => parse_date(&d)?,
        None => Local::now().date_naive(),
    };
    let copy = state
        .logbook()
        .duplicate_entry(id, date)?
        .ok_or_else(|| ApiError::NotFound(format!("Trip {id} not found")))?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn get_report(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = q.into_filter()?;
    let svc = state.logbook();
    let value = serde_json::json!({
        "summary": svc.report_summary(&filter),
        "monthly": svc.monthly_totals(&filter),
        "yearly": svc.yearly_totals(&filter),
        "vehicles": svc.vehicle_totals(&filter),
        "filter": filter,
    });
    Ok(Json(value))
}

async fn export_csv(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let filter = q.into_filter()?;
    let csv = state.logbook().export_csv(&filter)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        csv_filename(Local::now().date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/distance", get(get_distance))
        .route("/api/vehicles", get(list_vehicles).post(create_vehicle))
        .route("/api/vehicles/{id}", delete(delete_vehicle))
        .route("/api/vehicles/{id}/default", put(set_default_vehicle))
        .route("/api/odometer", get(list_readings).post(create_reading))
        .route("/api/trips", get(list_trips).post(create_trip))
        .route("/api/trips/{id}", delete(delete_trip))
        .route("/api/trips/{id}/duplicate", post(duplicate_trip))
        .route("/api/report", get(get_report))
        .route("/api/export/csv", get(export_csv))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: Logbook,
    distance: Arc<dyn DistanceResolver>,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let app = build_router(AppState::new(svc, distance));

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind}. Any device on your network can read and change the logbook."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(bind, port, "server started");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use korjournal_core::LogbookService;
    use korjournal_core::store::SqliteStore;
    use std::sync::mpsc;
    use tower::ServiceExt;

    struct FixedDistance(Option<f64>);

    impl DistanceResolver for FixedDistance {
        fn resolve(&self, _origin: &str, _destination: &str) -> anyhow::Result<f64> {
            self.0.ok_or_else(|| anyhow::anyhow!("ZERO_RESULTS"))
        }
    }

    /// Answers 10 km at once, except for origin "slow", which reports that it
    /// started and then waits to be released.
    struct GatedDistance {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl DistanceResolver for GatedDistance {
        fn resolve(&self, origin: &str, _destination: &str) -> anyhow::Result<f64> {
            if origin == "slow" {
                self.started.lock().unwrap().send(())?;
                self.release.lock().unwrap().recv()?;
                return Ok(99.0);
            }
            Ok(10.0)
        }
    }

    fn logbook() -> Logbook {
        LogbookService::open(SqliteStore::open_in_memory().unwrap()).unwrap()
    }

    fn test_state(km: Option<f64>) -> AppState {
        AppState::new(logbook(), Arc::new(FixedDistance(km)))
    }

    async fn send(
        app: Router,
        request: axum::http::Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn odometer_trip(date: chrono::NaiveDate, start: f64, end: f64) -> DriveEntryInput {
        DriveEntryInput::odometer(date, start, end)
            .with_purpose("Kundmöte")
    }

    fn add_vehicle(state: &AppState, plate: &str) -> Uuid {
        state
            .logbook()
            .add_vehicle(NewVehicle {
                license_plate: plate.to_string(),
                ..NewVehicle::default()
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_list_vehicles_empty() {
        let app = build_router(test_state(None));
        let (status, json) = send(app, get("/api/vehicles")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_create_vehicle() {
        let state = test_state(None);
        let app = build_router(state.clone());
        let body = serde_json::json!({
            "license_plate": "abc123",
            "make": "Volvo",
            "is_default": true,
        });
        let (status, json) = send(app, post_json("/api/vehicles", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["license_plate"], "ABC123");
        assert_eq!(json["is_default"], true);
        assert_eq!(state.logbook().list_vehicles().len(), 1);
    }

    #[tokio::test]
    async fn test_create_vehicle_invalid_plate_returns_400() {
        let app = build_router(test_state(None));
        let (status, json) = send(
            app,
            post_json("/api/vehicles", &serde_json::json!({ "license_plate": "12ABC" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("license plate"));
    }

    #[tokio::test]
    async fn test_set_default_vehicle() {
        let state = test_state(None);
        let id = add_vehicle(&state, "ABC123");
        let app = build_router(state);
        let request = axum::http::Request::put(format!("/api/vehicles/{id}/default"))
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_default"], true);
    }

    #[tokio::test]
    async fn test_delete_unknown_vehicle_returns_404() {
        let app = build_router(test_state(None));
        let request = axum::http::Request::delete(format!("/api/vehicles/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_odometer_regression_returns_409() {
        let state = test_state(None);
        let car_id = add_vehicle(&state, "ABC123");

        let reading = |date: &str, odometer: u64| {
            post_json(
                "/api/odometer",
                &serde_json::json!({ "car_id": car_id, "date": date, "odometer": odometer }),
            )
        };

        let (status, _) = send(build_router(state.clone()), reading("2024-01-10", 15000)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = send(build_router(state.clone()), reading("2024-01-11", 14900)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("15000"));

        let uri = format!("/api/odometer?car_id={car_id}");
        let (status, json) = send(build_router(state), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_odometer_unknown_car_returns_400() {
        let app = build_router(test_state(None));
        let body = serde_json::json!({
            "car_id": Uuid::new_v4(),
            "date": "2024-01-10",
            "odometer": 100,
        });
        let (status, _) = send(app, post_json("/api/odometer", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_odometer_trip() {
        let app = build_router(test_state(None));
        let body = serde_json::json!({
            "date": "2024-03-01",
            "start_odometer": 1000,
            "end_odometer": 1042.5,
            "purpose": "Kundmöte",
        });
        let (status, json) = send(app, post_json("/api/trips", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["distance"], 42.5);
        assert_eq!(json["distance_mode"], "odometer");
        assert_eq!(json["category"], "Tjänsteresa");
    }

    #[tokio::test]
    async fn test_create_trip_without_purpose_returns_400() {
        let state = test_state(None);
        let body = serde_json::json!({
            "date": "2024-03-01",
            "start_odometer": 1000,
            "end_odometer": 1010,
            "purpose": "  ",
        });
        let (status, json) =
            send(build_router(state.clone()), post_json("/api/trips", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("purpose"));
        assert!(state.logbook().list_entries().is_empty());
    }

    #[tokio::test]
    async fn test_create_route_trip_resolves_distance() {
        let app = build_router(test_state(Some(64.25)));
        let body = serde_json::json!({
            "date": "2024-03-01",
            "from_address": "Göteborg",
            "to_address": "Borås",
            "roundtrip": true,
            "purpose": "Leverans",
        });
        let (status, json) = send(app, post_json("/api/trips", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["distance_mode"], "route");
        assert_eq!(json["distance"], 128.5);
    }

    #[tokio::test]
    async fn test_create_route_trip_lookup_failure_returns_502() {
        let state = test_state(None);
        let body = serde_json::json!({
            "date": "2024-03-01",
            "from_address": "Göteborg",
            "to_address": "Nowhere",
            "purpose": "Leverans",
        });
        let (status, json) =
            send(build_router(state.clone()), post_json("/api/trips", &body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].as_str().unwrap().contains("ZERO_RESULTS"));
        assert!(state.logbook().list_entries().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_and_delete_trip() {
        let state = test_state(None);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let id = state
            .logbook()
            .add_entry(odometer_trip(date, 100.0, 110.0))
            .unwrap()
            .id;

        let request =
            axum::http::Request::post(format!("/api/trips/{id}/duplicate?date=2024-03-08"))
                .body(Body::empty())
                .unwrap();
        let (status, json) = send(build_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["date"], "2024-03-08");
        assert_ne!(json["id"], serde_json::json!(id));

        let request = axum::http::Request::delete(format!("/api/trips/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(build_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.logbook().list_entries().len(), 1);

        let request = axum::http::Request::delete(format!("/api/trips/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(build_router(state), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_totals() {
        let state = test_state(None);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        state
            .logbook()
            .add_entry(odometer_trip(date, 1000.0, 1100.0))
            .unwrap();

        let (status, json) = send(
            build_router(state),
            get("/api/report?from=2024-03-01&to=2024-03-31"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["summary"]["entry_count"], 1);
        assert_eq!(json["summary"]["total_distance"], 100.0);
        assert_eq!(json["summary"]["total_amount"], 250.0);
        assert_eq!(json["monthly"][0]["period"], "2024-03");
    }

    #[tokio::test]
    async fn test_report_invalid_category_returns_400() {
        let app = build_router(test_state(None));
        let (status, _) = send(app, get("/api/report?category=privat")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let app = build_router(test_state(None));
        let response = app.oneshot(get("/api/export/csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("\u{feff}Datum;"));
    }

    #[tokio::test]
    async fn test_distance_endpoint() {
        let app = build_router(test_state(Some(12.34)));
        let (status, json) = send(
            app,
            get("/api/distance?origin=A&destination=B&roundtrip=true"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["one_way_km"], 12.34);
        assert_eq!(json["distance"], 24.7);
    }

    #[tokio::test]
    async fn test_distance_endpoint_failure_returns_502() {
        let app = build_router(test_state(None));
        let (status, _) = send(app, get("/api/distance?origin=A&destination=B")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_distance_endpoint_discards_superseded_lookup() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let resolver = GatedDistance {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let state = AppState::new(logbook(), Arc::new(resolver));
        let app = build_router(state.clone());

        let slow = tokio::spawn(send(
            app.clone(),
            get("/api/distance?origin=slow&destination=Bor%C3%A5s"),
        ));
        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();

        let (status, json) = send(
            app,
            get("/api/distance?origin=fast&destination=Bor%C3%A5s"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["one_way_km"], 10.0);

        release_tx.send(()).unwrap();
        let (status, json) = slow.await.unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("newer"));
        assert_eq!(state.route().resolved_km(), Some(10.0));
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = build_router(test_state(None));
        let response = app.oneshot(get("/api/vehicles")).await.unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_body_size_limit_rejects_oversized() {
        let app = build_router(test_state(None));
        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/trips")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_internal_error_does_not_leak_details() {
        let error = ApiError::from(LogbookError::Storage(
            "disk I/O error at /home/user/db".to_string(),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
