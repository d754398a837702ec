//! Average ratings and their five-slot star rendering.
//!
//! Everything here is pure: callers hand in the ratings they loaded and get a
//! value back. Nothing is written onto entities.

use std::collections::HashMap;

use serde::Serialize;

pub const STAR_SLOTS: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Star {
    Full,
    Half,
    Empty,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RatingSummary {
    /// Mean of all ratings, `0.0` when there are none.
    pub average: f64,
    pub count: usize,
}

impl RatingSummary {
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        let (sum, count) =
            ratings.into_iter().fold((0i64, 0usize), |(sum, n), r| (sum + r.into(), n + 1));
        let average = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
        Self { average, count }
    }

    pub fn stars(&self) -> [Star; STAR_SLOTS] {
        stars(self.average)
    }
}

/// Slot `i` (1-based) is full when `i <= avg`, half when it is the first slot
/// past `avg` by less than one, empty otherwise.
pub fn stars(avg: f64) -> [Star; STAR_SLOTS] {
    std::array::from_fn(|slot| {
        let i = (slot + 1) as f64;
        if i <= avg {
            Star::Full
        } else if i - avg < 1.0 {
            Star::Half
        } else {
            Star::Empty
        }
    })
}

/// Groups `(movie_id, rating)` rows into one summary per movie.
pub fn summarize_by_movie<I>(rows: I) -> HashMap<i32, RatingSummary>
where
    I: IntoIterator<Item = (i32, i16)>,
{
    let mut grouped: HashMap<i32, Vec<i16>> = HashMap::new();
    for (movie_id, rating) in rows {
        grouped.entry(movie_id).or_default().push(rating);
    }
    grouped
        .into_iter()
        .map(|(movie_id, ratings)| (movie_id, RatingSummary::from_ratings(ratings)))
        .collect()
}
