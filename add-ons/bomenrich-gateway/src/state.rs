//! Process-wide state shared across axum handlers: the wired-up workflow
//! engine plus the database pool the health check pings.

use std::sync::Arc;

use sqlx::PgPool;

use bomenrich_workflow::WorkflowEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub db: PgPool,
}
