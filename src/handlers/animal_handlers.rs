//! HTTP handlers for the animal actions.
//! JSON bodies stand in for views. Submissions arrive as multipart forms so
//! a photo can ride along with the record fields.

use crate::{
    errors::AppError,
    models::animal::{Animal, AnimalForm, PhotoUpload},
    services::animal_service::{AnimalService, SubmitOutcome},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

const INDEX_PATH: &str = "/animals";

/// `GET /animals`
pub async fn index(State(service): State<AnimalService>) -> Result<Json<Vec<Animal>>, AppError> {
    Ok(Json(service.list().await?))
}

/// `GET /animals/details/{id}`
pub async fn details(
    State(service): State<AnimalService>,
    Path(id): Path<i64>,
) -> Result<Json<Animal>, AppError> {
    Ok(Json(service.get_one(id).await?))
}

/// `GET /animals/create` — an empty form.
pub async fn create_form() -> Json<AnimalForm> {
    Json(AnimalForm::default())
}

/// `POST /animals/create`
pub async fn create(
    State(service): State<AnimalService>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = bind_form(multipart).await?;
    Ok(submit_response(service.create(form).await?))
}

/// `GET /animals/edit/{id}`
pub async fn edit_form(
    State(service): State<AnimalService>,
    Path(id): Path<i64>,
) -> Result<Json<Animal>, AppError> {
    Ok(Json(service.edit(id).await?))
}

/// `POST /animals/edit/{id}`
pub async fn edit(
    State(service): State<AnimalService>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = bind_form(multipart).await?;
    Ok(submit_response(service.update(id, form).await?))
}

/// `GET /animals/delete/{id}` — confirmation view.
pub async fn delete_form(
    State(service): State<AnimalService>,
    Path(id): Path<i64>,
) -> Result<Json<Animal>, AppError> {
    Ok(Json(service.delete(id).await?))
}

/// `POST /animals/delete/{id}`
pub async fn delete_confirmed(
    State(service): State<AnimalService>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    service.delete_confirmed(id).await?;
    Ok(Redirect::to(INDEX_PATH))
}

fn submit_response(outcome: SubmitOutcome) -> Response {
    match outcome {
        SubmitOutcome::Saved(_) => Redirect::to(INDEX_PATH).into_response(),
        SubmitOutcome::Invalid { form, errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "form": form, "errors": errors })),
        )
            .into_response(),
    }
}

/// Bind the multipart fields onto an [`AnimalForm`].
///
/// Text is kept as submitted. Unparseable numbers bind as missing and are
/// caught by validation. A photo
/// part without a file name or content counts as no photo.
async fn bind_form(mut multipart: Multipart) -> Result<AnimalForm, AppError> {
    let mut form = AnimalForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid multipart: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "photo" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(format!("Failed to read photo: {}", e)))?;

            if !file_name.is_empty() && !content.is_empty() {
                tracing::debug!(
                    "Photo received: filename={}, size={} bytes, content_type={}",
                    file_name,
                    content.len(),
                    content_type
                );
                form.photo = Some(PhotoUpload {
                    file_name,
                    content_type,
                    content,
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid field `{}`: {}", field_name, e)))?;
        match field_name.as_str() {
            "id" => form.id = value.trim().parse().ok(),
            "name" => form.name = value,
            "age" => form.age = value.trim().parse().ok(),
            "stored_url" => form.stored_url = Some(value).filter(|v| !v.is_empty()),
            "stored_file_key" => form.stored_file_key = Some(value).filter(|v| !v.is_empty()),
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    Ok(form)
}
