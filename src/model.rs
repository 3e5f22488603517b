//! Row types read from and written to the catalog tables.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// A TV-series catalog entry as stored in the `shows` table.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Show {
    pub id: i64,
    pub title: String,
    pub first_aired: Option<NaiveDate>,
    pub in_production: Option<bool>,
    pub tagline: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub network: Option<String>,
    pub webpage: Option<String>,
}

/// A season belonging to a show.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Season {
    pub id: i64,
    pub name: String,
    pub number: i32,
    pub air_date: Option<NaiveDate>,
    pub overview: Option<String>,
    pub poster: Option<String>,
    pub show: i64,
}

/// The requesting user's own watch status and rating for a show.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserShow {
    pub status: Option<String>,
    pub rating: Option<i32>,
}

/// Aggregate of all user ratings recorded for a show.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RatingSummary {
    /// Mean rating, `None` while nobody has rated the show.
    pub rating: Option<f64>,
    pub rating_count: i64,
}

/// A show together with everything the detail endpoint aggregates around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowDetail {
    #[serde(flatten)]
    pub show: Show,
    pub genres: Vec<String>,
    pub seasons: Vec<Season>,
    #[serde(flatten)]
    pub ratings: RatingSummary,
    pub user: Option<UserShow>,
}

/// Outcome of a delete statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub rows_affected: u64,
}
