//! # TV Show Catalog
//!
//! This crate provides the storage and business rules of a TV-series catalog:
//! shows with their genres, seasons and per-user ratings, plus the images
//! uploaded for them. The HTTP surface lives in the `web` binary and
//! administrative commands in the `cli` binary; both sit on top of the
//! operations in [`app`].
//!
//! ## Features
//!
//! - **Validation**: one declarative rule table drives create and update checks,
//!   and every failing field is reported at once.
//! - **Sanitization**: text fields are stripped of markup before they are stored.
//! - **Image Storage**: uploads are sniffed, decoded and stored once per distinct
//!   picture.
//! - **Parameterized SQL**: every statement binds its values; SQLite is the
//!   default backend and PostgreSQL is available behind the `postgres` feature.
//!
//! ## Usage
//!
//! ```no_run
//! use tv_catalog::app::CreateShowCommand;
//! use tv_catalog::database::Database;
//! use tv_catalog::schema::ShowInput;
//! use tv_catalog::storage::Storage;
//!
//! async fn add_show(db: &Database, storage: &Storage, poster: Vec<u8>) {
//!     let mut input = ShowInput::default();
//!     input.set("title", "Twin Peaks".to_string());
//!     input.set("language", "en".to_string());
//!
//!     match CreateShowCommand::new(input).with_image(poster).execute(db, storage).await {
//!         Ok(show) => println!("Created show {}", show.id),
//!         Err(error) => eprintln!("Failed to create show: {}", error),
//!     }
//! }
//! ```

pub mod app;
pub mod auth;
pub mod database;
mod dialect;
pub mod model;
pub mod query;
pub mod sanitize;
pub mod schema;
pub mod storage;
