//! Contact form API handler

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::{Contact, NewContact},
    AppState,
};

/// POST /api/contact response
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub contact: Contact,
}

/// POST /api/contact
///
/// Validate and store a contact form submission. A validation failure
/// reports every offending field and stores nothing.
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(form): Json<NewContact>,
) -> ApiResult<Json<ContactResponse>> {
    form.validate().map_err(ApiError::Validation)?;

    let contact = state.store.create_contact(form);
    info!(contact_id = contact.id, "contact form submission stored");

    Ok(Json(ContactResponse {
        message: "Message sent successfully".to_string(),
        contact,
    }))
}

/// Build contact routes
pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit_contact))
}
