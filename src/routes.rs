use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::{interval_at, Instant, MissedTickBehavior}};
use uuid::Uuid;

use crate::{
    error::ApiError,
    inference::ImageGenerator,
    models::{AvatarRequest, Field, PromptPreview, SelectOption, SessionSnapshot, CUSTOMER_TYPES, FACE_SHAPES, GENDERS},
    prompt::build_prompt,
    session::{Session, COOLDOWN_TICKS, GENERATE_LABEL, REGENERATE_LABEL, TICK, TOAST_DURATION},
    validation::validate,
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
    pub generator: Arc<dyn ImageGenerator>,
}

impl AppState {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self { sessions: Arc::default(), generator }
    }

    fn session(&self, id: Uuid) -> Result<Arc<Session>, ApiError> {
        let session = self.sessions.read().get(&id).cloned().ok_or(ApiError::SessionNotFound(id))?;
        session.touch();
        Ok(session)
    }

    /// Drops sessions nobody has looked at for `ttl`, keeping any with a request or cooldown pending.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(ttl));
        before - sessions.len()
    }
}

pub fn spawn_session_sweeper(state: AppState, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle(ttl);
            if evicted > 0 {
                tracing::info!("🧹 Evicted {} idle session(s)", evicted);
            }
        }
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/options", get(form_options))
        .route("/api/validate", post(validate_request))
        .route("/api/prompt", post(preview_prompt))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/form", put(update_form))
        .route("/api/sessions/:id/submit", post(submit))
        .route("/api/sessions/:id/image", get(get_image))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct FormOptions {
    pub fields: Vec<Field>,
    pub face_shapes: Vec<SelectOption>,
    pub genders: Vec<SelectOption>,
    pub customer_types: Vec<SelectOption>,
    pub generate_label: String,
    pub regenerate_label: String,
    pub cooldown_seconds: u64,
    pub toast_seconds: u64,
}

pub async fn form_options() -> Json<FormOptions> {
    Json(FormOptions {
        fields: Field::ALL.to_vec(),
        face_shapes: FACE_SHAPES.to_vec(),
        genders: GENDERS.to_vec(),
        customer_types: CUSTOMER_TYPES.to_vec(),
        generate_label: GENERATE_LABEL.to_string(),
        regenerate_label: REGENERATE_LABEL.to_string(),
        cooldown_seconds: TICK.as_secs() * COOLDOWN_TICKS as u64,
        toast_seconds: TOAST_DURATION.as_secs(),
    })
}

pub async fn validate_request(Json(body): Json<AvatarRequest>) -> Result<Json<AvatarRequest>, ApiError> {
    validate(&body).map(Json).map_err(ApiError::Validation)
}

// No validation here: empty fields show their stock phrases.
pub async fn preview_prompt(Json(body): Json<AvatarRequest>) -> Json<PromptPreview> {
    Json(PromptPreview { prompt: build_prompt(&body) })
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let session = Session::new(Uuid::new_v4(), state.generator.clone());
    state.sessions.write().insert(session.id(), session.clone());
    tracing::info!("🎯 Created session {}", session.id());
    (StatusCode::CREATED, Json(session.snapshot()))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session(id)?.snapshot()))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.sessions.write().remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    tracing::info!("🗑️ Dropped session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_form(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AvatarRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session(id)?.update_form(body)))
}

pub async fn submit(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AvatarRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let snapshot = state.session(id)?.submit(body)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    #[default]
    Raw,
    Base64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub encoding: ImageEncoding,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageDataUrl {
    pub content_type: String,
    pub data_url: String,
}

pub async fn get_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let image = state.session(id)?.image().ok_or(ApiError::NoImage)?;
    let response = match query.encoding {
        ImageEncoding::Raw => (
            [(header::CONTENT_TYPE, image.content_type), (header::CACHE_CONTROL, "no-store")],
            image.bytes,
        )
            .into_response(),
        ImageEncoding::Base64 => Json(ImageDataUrl {
            content_type: image.content_type.to_string(),
            data_url: image.to_data_url(),
        })
        .into_response(),
    };
    Ok(response)
}
