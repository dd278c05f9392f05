//! Axum surface for the three read-only routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use wheel_core::api::{GREETING, Route, Status};
use wheel_core::config::WheelConfig;
use wheel_core::query::{AnalogError, QueryInterface, SpeedReading, Voltage};

use crate::analog::HostAnalog;
use crate::clock::HostInstant;
use crate::sync::{HostTelemetry, StdRawMutex};

/// Shared handles every handler needs.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<HostTelemetry>,
    pub analog: Arc<HostAnalog>,
    pub wheel: WheelConfig,
}

impl AppState {
    pub fn new(
        telemetry: Arc<HostTelemetry>,
        analog: Arc<HostAnalog>,
        wheel: WheelConfig,
    ) -> Self {
        Self {
            telemetry,
            analog,
            wheel,
        }
    }

    pub fn query(&self) -> QueryInterface<'_, StdRawMutex, HostInstant, &HostAnalog> {
        QueryInterface::new(&*self.telemetry, &*self.analog, self.wheel)
    }

    /// Fresh potentiometer reading, taken on the blocking pool since the IIO
    /// source reads sysfs files.
    pub async fn read_potentiometer(&self) -> Result<Voltage, AnalogError> {
        let app = self.clone();
        tokio::task::spawn_blocking(move || app.query().get_analog_reading())
            .await
            .unwrap_or_else(|err| {
                warn!(%err, "potentiometer read task failed");
                Err(AnalogError::SensorUnavailable)
            })
    }
}

/// `{"speed_level": 3}` or `{"speed_level": -2.5}`.
#[derive(Debug, Serialize)]
pub struct SpeedBody {
    speed_level: SpeedValue,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SpeedValue {
    Level(u8),
    Sentinel(f32),
}

impl SpeedBody {
    pub fn new(reading: SpeedReading, sentinel: f32) -> Self {
        let speed_level = match reading {
            SpeedReading::Level(level) => SpeedValue::Level(level),
            SpeedReading::Reverse => SpeedValue::Sentinel(sentinel),
        };
        Self { speed_level }
    }
}

#[derive(Debug, Serialize)]
pub struct PotentiometerBody {
    potentiometer_voltage: f32,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("potentiometer read failed: {0}")]
    Analog(#[from] AnalogError),
    #[error("no such route")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::Analog(_) => Status::ServiceUnavailable,
            ApiError::NotFound => Status::NotFound,
            ApiError::MethodNotAllowed => Status::MethodNotAllowed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(code = status.code(), error = %self, "request failed");
        let code = StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (code, Json(json!({ "error": status.reason() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(Route::Index.path(), get(index).fallback(method_not_allowed))
        .route(Route::Speed.path(), get(speed).fallback(method_not_allowed))
        .route(
            Route::Potentiometer.path(),
            get(potentiometer).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn index() -> &'static str {
    GREETING
}

async fn speed(State(app): State<AppState>) -> Json<SpeedBody> {
    let reading = app.query().get_speed_at(HostInstant::now());
    Json(SpeedBody::new(reading, app.wheel.reverse_sentinel))
}

async fn potentiometer(State(app): State<AppState>) -> Result<Json<PotentiometerBody>, ApiError> {
    let potentiometer_voltage = app.read_potentiometer().await?;
    Ok(Json(PotentiometerBody {
        potentiometer_voltage,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
