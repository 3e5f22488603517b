use crate::{
    AppState,
    auth::{RequireAdmin, RequireAuth},
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tv_catalog::{
    app::{self, AppError, CreateShowCommand},
    model::{DeleteResult, Show, ShowDetail},
    query::{Page, PageRequest},
    schema::{FieldError, ShowInput},
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    offset: Option<String>,
    limit: Option<String>,
}

pub async fn list_shows(
    State(state): State<AppState>,
    RequireAuth(_): RequireAuth,
    Query(params): Query<ListQuery>,
) -> Result<Json<Page<Show>>, ShowError> {
    let request = PageRequest::parse(params.offset.as_deref(), params.limit.as_deref())
        .map_err(AppError::Validation)?;

    let page = app::list_shows(&state.db, request, &state.config.base_url, "/tv").await?;

    Ok(Json(page))
}

pub async fn post_show(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<Show>, ShowError> {
    let mut input = ShowInput::default();
    let mut image = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "image" => {
                let mut data = BytesMut::new();
                while let Some(chunk) = field.chunk().await? {
                    data.extend_from_slice(&chunk);
                }
                image = Some(data.freeze().to_vec());
            }
            _ => {
                let text = field.text().await?;
                input.set(&name, text);
            }
        }
    }

    tracing::debug!(user = user.id, has_image = image.is_some(), "creating show");

    let cmd = CreateShowCommand::new(input);
    let cmd = match image {
        Some(bytes) => cmd.with_image(bytes),
        None => cmd,
    };

    let show = cmd.execute(&state.db, &state.storage).await?;

    Ok(Json(show))
}

pub async fn get_show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<ShowDetail>, ShowError> {
    let detail = app::find_show(&state.db, &id, user.id).await?;

    Ok(Json(detail))
}

pub async fn patch_show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<ShowInput>, JsonRejection>,
) -> Result<Json<Option<Show>>, ShowError> {
    let Json(input) = payload?;
    let show = app::update_show(&state.db, &id, &input).await?;

    Ok(Json(show))
}

pub async fn delete_show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ShowError> {
    let result = app::remove_show(&state.db, &id).await?;

    Ok(Json(result))
}

#[derive(Debug)]
pub enum ShowError {
    App(AppError),

    Multipart(MultipartError),

    Json(JsonRejection),
}

impl From<AppError> for ShowError {
    fn from(value: AppError) -> Self {
        ShowError::App(value)
    }
}

impl From<MultipartError> for ShowError {
    fn from(value: MultipartError) -> Self {
        ShowError::Multipart(value)
    }
}

impl From<JsonRejection> for ShowError {
    fn from(value: JsonRejection) -> Self {
        ShowError::Json(value)
    }
}

impl IntoResponse for ShowError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        #[derive(Serialize)]
        struct ValidationResponse {
            errors: Vec<FieldError>,
        }

        let (status, error) = match self {
            ShowError::App(AppError::Validation(errors)) => {
                return (StatusCode::BAD_REQUEST, Json(ValidationResponse { errors }))
                    .into_response();
            }
            ShowError::App(AppError::ShowNotFound { id }) => {
                tracing::debug!(id, "show not found");
                (StatusCode::NOT_FOUND, "Sjónvarpsþáttur fannst ekki".to_string())
            }
            ShowError::App(e) => {
                tracing::error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Villa kom upp".to_string())
            }
            ShowError::Multipart(e) => (e.status(), e.body_text()),
            ShowError::Json(e) => {
                tracing::debug!(error = %e.body_text(), "rejected json body");
                let errors = vec![FieldError::new("body", "Gögn þurfa að vera JSON hlutur")];
                return (StatusCode::BAD_REQUEST, Json(ValidationResponse { errors }))
                    .into_response();
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
