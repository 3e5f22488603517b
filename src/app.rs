//! # Show Catalog Module
//!
//! This module provides the operations behind every catalog endpoint. Each write
//! runs the same fixed pipeline, and every stage short-circuits on failure:
//!
//! ```text
//! extract -> validate -> sanitize -> resolve image (create only) -> persist
//! ```
//!
//! ## Provided Structures
//!
//! - **CreateShowCommand**: builder for creating a show from form fields and an
//!   uploaded image.
//!
//! ## Core Asynchronous Functions
//!
//! - **list_shows**: one page of shows, wrapped in a [`Page`] envelope.
//! - **find_show**: a show with its genres, seasons, ratings and the caller's
//!   own status, loaded concurrently.
//! - **update_show**: full-row update of an existing show.
//! - **remove_show**: deletes a show and the rows referencing it.
//!
//! ## Error Handling
//!
//! [`AppError`] separates caller mistakes (`Validation`, `ShowNotFound`) from
//! infrastructure failures (`Database`, `Storage`, `Task`).

use crate::{
    database::{Database, DatabaseError},
    model::{DeleteResult, Show, ShowDetail},
    query::{Page, PageRequest},
    schema::{FieldError, Operation, ShowInput, ValidShow, validate, validate_id},
    storage::{Storage, StorageError, StoredImage},
};

/// Represents a command for adding a show to the catalog.
///
/// Holds the raw form fields and the uploaded image bytes. Use `with_image`
/// before calling `execute()`.
pub struct CreateShowCommand {
    /// Raw form fields.
    pub input: ShowInput,
    /// Uploaded image file, if the request carried one.
    pub image: Option<Vec<u8>>,
}

impl CreateShowCommand {
    pub fn new(input: ShowInput) -> Self {
        CreateShowCommand { input, image: None }
    }

    /// Attaches the uploaded image bytes.
    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = Some(bytes);
        self
    }

    /// Validates, sanitizes, stores the image and inserts the show.
    ///
    /// When the insert fails after a new image file was written, that file is
    /// removed again before the error is returned.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for field errors (including `image` errors), and the
    /// infrastructure variants for everything else.
    pub async fn execute(self, db: &Database, storage: &Storage) -> Result<Show, AppError> {
        let record = validate(Operation::Create, &self.input)
            .and_then(ValidShow::sanitize)
            .map_err(AppError::Validation)?;

        let bytes = self
            .image
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::Validation(vec![FieldError::new("image", "Mynd vantar")]))?;

        let stored = resolve_image(storage, bytes).await?;
        let record = record.with_image(storage.url_for(&stored.path));

        match db.insert_show(&record).await {
            Ok(show) => {
                tracing::info!(id = show.id, title = %show.title, "show created");
                Ok(show)
            }
            Err(e) => {
                if stored.fresh {
                    if let Err(cleanup) = storage.ensure_deleted(&stored.path) {
                        tracing::warn!(error = %cleanup, path = %stored.path.display(), "failed to remove orphaned image");
                    }
                }
                Err(e.into())
            }
        }
    }
}

/// Stores an upload on the blocking pool, mapping bad uploads to `image` field errors.
async fn resolve_image(storage: &Storage, bytes: Vec<u8>) -> Result<StoredImage, AppError> {
    let storage = storage.clone();
    let result = tokio::task::spawn_blocking(move || storage.create_file(&bytes)).await?;

    match result {
        Ok(stored) => Ok(stored),
        Err(StorageError::UnsupportedFile { mime }) => {
            tracing::debug!(?mime, "rejected upload");
            Err(AppError::Validation(vec![FieldError::new(
                "image",
                "Mynd verður að vera á jpg, png eða gif formi",
            )]))
        }
        Err(StorageError::Image(e)) => {
            tracing::debug!(error = %e, "undecodable upload");
            Err(AppError::Validation(vec![FieldError::new(
                "image",
                "Ekki tókst að lesa mynd",
            )]))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns one page of shows ordered by ascending id.
///
/// # Arguments
///
/// * `base_url` - Prefix for the pagination links.
/// * `path` - Request path the links point back to, e.g. `/tv`.
pub async fn list_shows(
    db: &Database,
    request: PageRequest,
    base_url: &str,
    path: &str,
) -> Result<Page<Show>, AppError> {
    let items = db.list_shows(request.offset, request.limit).await?;

    Ok(Page::new(items, request, base_url, path))
}

/// Retrieves a show with everything the detail view shows around it.
///
/// `user` is the id of the requesting user; their own status and rating are
/// included when they have one.
pub async fn find_show(db: &Database, id: &str, user: i64) -> Result<ShowDetail, AppError> {
    let id = validate_id(id).map_err(|e| AppError::Validation(vec![e]))?;

    let show = db
        .get_show(id)
        .await?
        .ok_or(AppError::ShowNotFound { id })?;

    let (genres, seasons, ratings, user) = futures::try_join!(
        db.get_genres(id),
        db.get_seasons(id),
        db.get_rating_summary(id),
        db.get_user_show(user, id),
    )?;

    Ok(ShowDetail {
        show,
        genres,
        seasons,
        ratings,
        user,
    })
}

/// Overwrites every field of the show with `id`.
///
/// Path id and payload errors are reported together. Returns `Ok(None)` when no
/// show has that id.
pub async fn update_show(
    db: &Database,
    id: &str,
    input: &ShowInput,
) -> Result<Option<Show>, AppError> {
    let (id, fields) = (
        validate_id(id),
        validate(Operation::Update, input).and_then(ValidShow::sanitize),
    );

    let (id, record) = match (id, fields) {
        (Ok(id), Ok(record)) => (id, record),
        (id, fields) => {
            let mut errors = fields.err().unwrap_or_default();
            errors.extend(id.err());
            return Err(AppError::Validation(errors));
        }
    };

    let updated = db.update_show(id, &record).await?;
    match &updated {
        Some(show) => tracing::info!(id = show.id, "show updated"),
        None => tracing::debug!(id, "update matched no show"),
    }

    Ok(updated)
}

/// Deletes the show with `id` and every row that references it.
pub async fn remove_show(db: &Database, id: &str) -> Result<DeleteResult, AppError> {
    let id = validate_id(id).map_err(|e| AppError::Validation(vec![e]))?;

    let result = db.delete_show(id).await?;
    tracing::info!(id, rows_affected = result.rows_affected, "show deleted");

    Ok(result)
}

/// Error types within the application, encapsulating storage, database, and other custom errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("show not found: {id}")]
    ShowNotFound { id: i64 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use crate::{
        app::{AppError, CreateShowCommand, find_show, list_shows, remove_show, update_show},
        database::tests::{get_db, record, seed_details},
        query::PageRequest,
        schema::ShowInput,
        storage::{Storage, tests::image_bytes},
    };
    use image::ImageFormat;
    use tempfile::TempDir;

    fn get_storage(tmp_dir: &TempDir) -> Storage {
        Storage::new(tmp_dir.path().to_path_buf(), "http://localhost:3000/images")
    }

    fn input() -> ShowInput {
        ShowInput {
            title: Some("<b>Dark</b><script>alert(1)</script>".to_string()),
            first_aired: Some("2017-12-01".to_string()),
            in_production: Some("false".to_string()),
            description: Some("A missing child <i>sets</i> four families on a hunt.".to_string()),
            language: Some("de".to_string()),
            network: Some("Netflix".to_string()),
            webpage: Some("https://www.netflix.com/title/80100172".to_string()),
            ..Default::default()
        }
    }

    fn field_errors(result: Result<impl std::fmt::Debug, AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("Expected validation error, but got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_show() {
        let db = get_db().await;
        let tmp_dir = TempDir::new().unwrap();
        let storage = get_storage(&tmp_dir);

        let show = CreateShowCommand::new(input())
            .with_image(image_bytes(ImageFormat::Png, [10, 20, 30, 255]))
            .execute(&db, &storage)
            .await
            .unwrap();

        assert_eq!("Dark", show.title);
        assert_eq!(Some("de".to_string()), show.language);
        assert_eq!(Some(false), show.in_production);
        assert_eq!(
            Some("A missing child sets four families on a hunt.".to_string()),
            show.description
        );

        let image = show.image.unwrap();
        assert!(image.starts_with("http://localhost:3000/images/"));
        let relative = image.trim_start_matches("http://localhost:3000/images/");
        assert!(tmp_dir.path().join(relative).exists());
    }

    #[tokio::test]
    async fn test_create_validates_before_touching_storage() {
        let db = get_db().await;
        let tmp_dir = TempDir::new().unwrap();
        let storage = get_storage(&tmp_dir);

        let bad = ShowInput {
            title: Some("".to_string()),
            language: Some("deu".to_string()),
            ..input()
        };
        let result = CreateShowCommand::new(bad)
            .with_image(image_bytes(ImageFormat::Png, [1, 2, 3, 255]))
            .execute(&db, &storage)
            .await;

        assert_eq!(vec!["title", "language"], field_errors(result));
        assert_eq!(0, std::fs::read_dir(tmp_dir.path()).unwrap().count());
        assert!(db.list_shows(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_a_valid_image() {
        let db = get_db().await;
        let tmp_dir = TempDir::new().unwrap();
        let storage = get_storage(&tmp_dir);

        let missing = CreateShowCommand::new(input()).execute(&db, &storage).await;
        assert_eq!(vec!["image"], field_errors(missing));

        let text = CreateShowCommand::new(input())
            .with_image(b"not an image".to_vec())
            .execute(&db, &storage)
            .await;
        assert_eq!(vec!["image"], field_errors(text));
    }

    #[tokio::test]
    async fn test_create_rejects_markup_only_title() {
        let db = get_db().await;
        let tmp_dir = TempDir::new().unwrap();
        let storage = get_storage(&tmp_dir);

        let bad = ShowInput {
            title: Some("<script>alert(1)</script>".to_string()),
            ..input()
        };
        let result = CreateShowCommand::new(bad)
            .with_image(image_bytes(ImageFormat::Png, [4, 5, 6, 255]))
            .execute(&db, &storage)
            .await;

        assert_eq!(vec!["title"], field_errors(result));
        assert_eq!(0, std::fs::read_dir(tmp_dir.path()).unwrap().count());
        assert!(db.list_shows(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_markup_only_title() {
        let db = get_db().await;
        let show = db.insert_show(&record("Dark")).await.unwrap();

        let patch = ShowInput {
            title: Some("<b></b>".to_string()),
            ..Default::default()
        };
        let result = update_show(&db, &show.id.to_string(), &patch).await;

        assert_eq!(vec!["title"], field_errors(result));
        assert_eq!(Some(show.clone()), db.get_show(show.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_new_image() {
        let db = get_db().await;
        let tmp_dir = TempDir::new().unwrap();
        let storage = get_storage(&tmp_dir);
        sqlx::query("DROP TABLE shows").execute(db.pool()).await.unwrap();

        let bytes = image_bytes(ImageFormat::Png, [9, 9, 9, 255]);
        let result = CreateShowCommand::new(input())
            .with_image(bytes.clone())
            .execute(&db, &storage)
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let stored = storage.create_file(&bytes).unwrap();
        assert!(stored.fresh, "the orphaned file should have been removed");
    }

    #[tokio::test]
    async fn test_list_shows() {
        let db = get_db().await;
        for title in ["a", "b", "c", "d", "e"] {
            db.insert_show(&record(title)).await.unwrap();
        }

        let page = list_shows(&db, PageRequest::new(0, 2), "http://localhost:3000", "/tv")
            .await
            .unwrap();

        assert_eq!(2, page.items.len());
        assert!(page.items[0].id < page.items[1].id);
        assert!(page.links.next.is_some());
        assert_eq!("", page.links.prev.href);

        let last = list_shows(&db, PageRequest::new(4, 2), "http://localhost:3000", "/tv")
            .await
            .unwrap();
        assert_eq!(1, last.items.len());
        assert!(last.links.next.is_none());
    }

    #[tokio::test]
    async fn test_find_show() {
        let db = get_db().await;
        let show = db.insert_show(&record("The Wire")).await.unwrap();
        seed_details(&db, show.id).await;

        let detail = find_show(&db, &show.id.to_string(), 2).await.unwrap();

        assert_eq!(show, detail.show);
        assert_eq!(vec!["Drama", "Crime"], detail.genres);
        assert_eq!(2, detail.seasons.len());
        assert_eq!(Some(4.5), detail.ratings.rating);
        assert_eq!(Some(5), detail.user.and_then(|u| u.rating));

        let stranger = find_show(&db, &show.id.to_string(), 99).await.unwrap();
        assert_eq!(None, stranger.user);
    }

    #[tokio::test]
    async fn test_find_show_errors() {
        let db = get_db().await;

        assert!(matches!(
            find_show(&db, "404", 1).await,
            Err(AppError::ShowNotFound { id: 404 })
        ));
        assert_eq!(vec!["id"], field_errors(find_show(&db, "abc", 1).await));
    }

    #[tokio::test]
    async fn test_update_show() {
        let db = get_db().await;
        let show = db.insert_show(&record("Dark")).await.unwrap();

        let patch = ShowInput {
            title: Some("Dark <em>Season 3</em>".to_string()),
            language: Some("de".to_string()),
            ..Default::default()
        };
        let updated = update_show(&db, &show.id.to_string(), &patch)
            .await
            .unwrap()
            .unwrap();

        assert_eq!("Dark Season 3", updated.title);
        assert_eq!(Some("de".to_string()), updated.language);
    }

    #[tokio::test]
    async fn test_update_missing_show_changes_nothing() {
        let db = get_db().await;
        let show = db.insert_show(&record("Dark")).await.unwrap();

        let patch = ShowInput {
            title: Some("Other".to_string()),
            ..Default::default()
        };
        assert_eq!(None, update_show(&db, "999", &patch).await.unwrap());
        assert_eq!(Some(show.clone()), db.get_show(show.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_reports_id_and_field_errors_together() {
        let db = get_db().await;

        let patch = ShowInput {
            title: Some("t".repeat(129)),
            ..Default::default()
        };
        let result = update_show(&db, "x1", &patch).await;

        assert_eq!(vec!["title", "id"], field_errors(result));
    }

    #[tokio::test]
    async fn test_remove_show() {
        let db = get_db().await;
        let show = db.insert_show(&record("Dark")).await.unwrap();

        assert_eq!(
            1,
            remove_show(&db, &show.id.to_string()).await.unwrap().rows_affected
        );
        assert_eq!(None, db.get_show(show.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_show_rejects_injection() {
        let db = get_db().await;
        db.insert_show(&record("a")).await.unwrap();
        db.insert_show(&record("b")).await.unwrap();

        let result = remove_show(&db, "1 OR 1=1").await;

        assert_eq!(vec!["id"], field_errors(result));
        assert_eq!(2, db.list_shows(0, 10).await.unwrap().len());
    }
}
