use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rating::{RatingSummary, STAR_SLOTS, Star};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct GenreRef {
    pub id: i32,
    pub name: String,
}

/// A movie as loaded for one request, with its rating already aggregated.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieSnapshot {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub release_date: Date,
    pub duration: Option<i32>,
    pub genre: GenreRef,
    pub featured: bool,
    pub created_at: i64,
    pub rating: RatingSummary,
}

/// Display form of a movie: what list rows, detail pages and the API render.
#[derive(Clone, Debug, Serialize)]
pub struct MovieCard {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub release_date: Date,
    pub duration: Option<i32>,
    pub genre: GenreRef,
    pub featured: bool,
    pub avg_rating: f64,
    pub review_count: usize,
    pub stars: [Star; STAR_SLOTS],
}

impl MovieCard {
    pub fn from_snapshot(movie: &MovieSnapshot) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            description: movie.description.clone(),
            release_date: movie.release_date,
            duration: movie.duration,
            genre: movie.genre.clone(),
            featured: movie.featured,
            avg_rating: movie.rating.average,
            review_count: movie.rating.count,
            stars: movie.rating.stars(),
        }
    }

    pub fn has_rating(&self) -> bool {
        self.avg_rating > 0.0
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewView {
    pub id: i32,
    pub user: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    pub movie: MovieCard,
    pub reviews: Vec<ReviewView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HomeRails {
    pub featured: Vec<MovieCard>,
    pub latest: Vec<MovieCard>,
    pub trending: Vec<MovieCard>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteStatus {
    Added,
    Removed,
}

/// Catalog maintenance input.
#[derive(Clone, Debug)]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub release_date: Date,
    pub duration: Option<i32>,
    pub genre_id: i32,
    pub featured: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub genre: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Accepts a rating as a number or a numeric string, the way form posts and JSON
/// clients send it. Anything else reads as 0 and fails the 1..=5 range check.
fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let rating = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(rating.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating_of(body: &str) -> i64 {
        serde_json::from_str::<ReviewForm>(body).unwrap().rating
    }

    #[test]
    fn rating_accepts_numbers_and_numeric_strings() {
        assert_eq!(rating_of(r#"{"rating": 4}"#), 4);
        assert_eq!(rating_of(r#"{"rating": "5"}"#), 5);
        assert_eq!(rating_of(r#"{"rating": 3.0}"#), 3);
    }

    #[test]
    fn unusable_rating_reads_as_zero() {
        for body in [
            r#"{"rating": "abc"}"#,
            r#"{"rating": 3.5}"#,
            r#"{"rating": null}"#,
            r#"{"rating": [1]}"#,
            r#"{"comment": "no rating"}"#,
        ] {
            assert_eq!(rating_of(body), 0, "{body}");
        }
    }
}
