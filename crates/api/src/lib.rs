//! Driver Drowsiness Monitor API Server
//!
//! REST API over the driver monitoring core: frames and sensor events in,
//! driver state and alert history out.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod clock;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod settings;

pub use clock::SystemClock;
pub use error::ApiError;
pub use rate_limit::RateLimitConfig;
pub use settings::Settings;

use alerting::{EmergencyNotifier, Notification};
use dms::{AlertRecord, AlertRecorder, Clock, DmsModule, FrameReport};

/// Application state shared across handlers
pub struct AppState {
    /// Driver monitoring session
    pub dms: DmsModule,
    /// Delivery sink attached to the alert recorder
    pub notifier: Arc<EmergencyNotifier>,
    /// Time source for requests without a timestamp
    pub clock: Arc<dyn Clock>,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create application state with an injected clock
    pub fn with_clock(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self, ApiError> {
        let notifier = Arc::new(EmergencyNotifier::new(
            EmergencyNotifier::default_contacts(),
            settings.alerts.clone(),
        ));
        let recorder = Arc::new(
            AlertRecorder::new(settings.dms.location.clone()).with_sink(notifier.clone()),
        );
        let dms = DmsModule::with_recorder(settings.dms.clone(), recorder)?;

        Ok(Self {
            dms,
            notifier,
            clock,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }

    /// Attach a Prometheus handle for /metrics
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Caller timestamp, or the clock when absent
    pub fn now(&self, timestamp_ms: Option<u64>) -> u64 {
        timestamp_ms.unwrap_or_else(|| self.clock.now_ms())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.sent()
    }

    /// Count a processed frame and its alert
    pub fn observe(&self, report: &FrameReport) {
        metrics::counter!("dms_frames_total").increment(1);
        if !report.measurement.face_detected {
            metrics::counter!("dms_frames_without_face_total").increment(1);
        }
        for alert in report.alert.iter().chain(report.escalation.iter()) {
            self.observe_alert(alert);
        }
    }

    pub fn observe_alert(&self, alert: &AlertRecord) {
        metrics::counter!("dms_alerts_total", "status" => alert.status.as_str()).increment(1);
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub aggregator: ComponentHealth,
    pub sensors: ComponentHealth,
    pub alerts: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub last_activity_ms: Option<u64>,
}

impl ComponentHealth {
    fn from_result<T>(result: &Result<T, dms::DmsError>, last_activity_ms: Option<u64>) -> Self {
        Self {
            status: if result.is_ok() { "ok" } else { "error" }.to_string(),
            last_activity_ms,
        }
    }
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub alert_count: usize,
    pub notifications_sent: usize,
    pub total_blinks: u64,
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = state.clock.now_ms();
    let signal = state.dms.signal();
    let sensors = state.dms.snapshot(now);
    let alerts = state.dms.alerts();

    let last_frame = signal
        .as_ref()
        .ok()
        .filter(|s| s.updated_at_ms > 0)
        .map(|s| now.saturating_sub(s.updated_at_ms));
    let last_alert = alerts.last().map(|a| now.saturating_sub(a.timestamp_ms));

    let healthy = signal.is_ok() && sensors.is_ok();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: now / 1000,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            aggregator: ComponentHealth::from_result(&signal, last_frame),
            sensors: ComponentHealth::from_result(&sensors, None),
            alerts: ComponentHealth {
                status: "ok".to_string(),
                last_activity_ms: last_alert,
            },
        },
        metrics: SystemMetrics {
            alert_count: alerts.len(),
            notifications_sent: state.notifications().len(),
            total_blinks: signal.map(|s| s.total_blinks).unwrap_or(0),
        },
    };

    Json(response)
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ApiError::NotFound("metrics exporter not installed"))
}

fn base_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/frames", post(routes::frames::post_frame))
        .route("/api/v1/measurements", post(routes::frames::post_measurement))
        .route("/api/v1/sensors", get(routes::sensors::get_status))
        .route("/api/v1/state", get(routes::state::get_state))
        .route("/api/v1/decide", post(routes::state::post_decide))
        .route("/api/v1/reset", post(routes::state::post_reset))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/notifications", get(routes::alerts::get_notifications))
        .route("/metrics", get(metrics_handler))
}

fn sensor_event_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/sensors/:sensor", post(routes::sensors::activate))
}

fn finish(router: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    finish(base_routes().merge(sensor_event_routes()), state)
}

/// Create the application router with sensor events rate limited per peer IP
pub fn create_rate_limited_router(
    state: Arc<AppState>,
    config: &RateLimitConfig,
) -> Result<Router, ApiError> {
    let governor = rate_limit::create_governor_config(config)?;
    let sensor_events = sensor_event_routes().layer(GovernorLayer { config: governor });
    Ok(finish(base_routes().merge(sensor_events), state))
}

/// Initialize logging
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("Tracing subscriber already set");
    }
}

/// Run the server
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = AppState::new(&settings)?;
    if settings.server.metrics {
        state = state.with_metrics(PrometheusBuilder::new().install_recorder()?);
    }
    let state = Arc::new(state);

    let app = if settings.rate_limit.enabled {
        create_rate_limited_router(state, &settings.rate_limit)?
    } else {
        create_router(state)
    };

    info!("Starting API server on {}", settings.server.addr);

    let listener = tokio::net::TcpListener::bind(&settings.server.addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::ManualClock;

    #[test]
    fn test_now_prefers_caller_timestamp() {
        let clock = Arc::new(ManualClock::new(5_000));
        let state = AppState::with_clock(&Settings::default(), clock.clone()).unwrap();
        assert_eq!(state.now(Some(42)), 42);
        assert_eq!(state.now(None), 5_000);
        clock.advance(10);
        assert_eq!(state.now(None), 5_010);
    }

    #[test]
    fn test_invalid_dms_config_is_reported() {
        let mut settings = Settings::default();
        settings.dms.aggregator.blink_consecutive_frames = 0;
        assert!(matches!(AppState::new(&settings), Err(ApiError::Dms(dms::DmsError::Config(_)))));
    }
}
