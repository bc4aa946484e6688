//! credo-gw library interface
//!
//! Exposes the router, state, and domain modules for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use credo_common::config::GatewayConfig;
use credo_common::events::EventBus;

use crate::pipeline::Pipeline;
use crate::services::generator::SimulatedGenerator;
use crate::services::handoff::{HandoffHandle, HandoffSettings, HandoffWorker};
use crate::services::report_source::SimulatedReportSource;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Gateway configuration (token, timeouts, handoff window)
    pub config: Arc<GatewayConfig>,
    /// Synchronous internal processing pipeline
    pub pipeline: Pipeline,
    /// Enqueue handle for the external handoff worker
    pub handoff: HandoffHandle,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire up the default collaborators: simulated generator and report
    /// source, and a freshly spawned handoff worker pool.
    pub fn new(db: SqlitePool, event_bus: EventBus, config: GatewayConfig) -> Self {
        let pipeline = Pipeline::new(
            Arc::new(SimulatedGenerator),
            Arc::new(SimulatedReportSource),
            Duration::from_secs(config.generation_timeout_secs),
        );
        let handoff = HandoffWorker::spawn(
            HandoffSettings::from(&config),
            db.clone(),
            event_bus.clone(),
        );
        Self::with_collaborators(db, event_bus, config, pipeline, handoff)
    }

    /// Wire up explicit collaborators (tests substitute their own)
    pub fn with_collaborators(
        db: SqlitePool,
        event_bus: EventBus,
        config: GatewayConfig,
        pipeline: Pipeline,
        handoff: HandoffHandle,
    ) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            pipeline,
            handoff,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Record the most recent error for the health endpoint
    pub async fn record_error(&self, message: &str) {
        let mut guard = self.last_error.write().await;
        *guard = Some(message.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::initiate_routes())
        .merge(api::callback_routes(state.clone()))
        .merge(api::report_routes())
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes())
        .with_state(state)
}
