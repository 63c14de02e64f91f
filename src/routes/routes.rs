//! Defines routes for the animal actions.
//!
//! ## Structure
//! - `GET  /animals`                 — list
//! - `GET  /animals/details/{id}`    — details
//! - `GET  /animals/create`          — empty create form
//! - `POST /animals/create`          — create (multipart, optional `photo`)
//! - `GET  /animals/edit/{id}`       — edit form
//! - `POST /animals/edit/{id}`       — save edit (multipart, optional `photo`)
//! - `GET  /animals/delete/{id}`     — delete confirmation
//! - `POST /animals/delete/{id}`     — delete record and photo
//!
//! Successful submissions redirect (303) to `/animals`. Request bodies are
//! capped at `max_upload_bytes` so photos fit in the multipart forms.

use crate::{
    handlers::{
        animal_handlers::{
            create, create_form, delete_confirmed, delete_form, details, edit, edit_form, index,
        },
        health_handlers::{healthz, readyz},
    },
    services::animal_service::AnimalService,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Build and return the router for all routes.
///
/// The router carries shared state (`AnimalService`) to all handlers.
pub fn routes(max_upload_bytes: usize) -> Router<AnimalService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/animals", get(index))
        .route("/animals/details/{id}", get(details))
        .route("/animals/create", get(create_form).post(create))
        .route("/animals/edit/{id}", get(edit_form).post(edit))
        .route(
            "/animals/delete/{id}",
            get(delete_form).post(delete_confirmed),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
