use std::{cmp::Ordering, str::FromStr};

use serde::Serialize;

use crate::models::{GenreRef, HomeRails, ListParams, MovieCard, MovieSnapshot};

const FEATURED_RAIL: usize = 6;
const LATEST_RAIL: usize = 4;
const TRENDING_RAIL: usize = 4;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortMode {
    /// Release date, newest first.
    #[default]
    Default,
    /// Catalog insertion time, newest first.
    Latest,
    TopRated,
    /// Average rating, then catalog insertion time.
    Trending,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown sort mode: {0}")]
pub struct UnknownSortMode(String);

impl FromStr for SortMode {
    type Err = UnknownSortMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "default" => Ok(SortMode::Default),
            "latest" => Ok(SortMode::Latest),
            "top-rated" => Ok(SortMode::TopRated),
            "trending" => Ok(SortMode::Trending),
            other => Err(UnknownSortMode(other.to_string())),
        }
    }
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Default => "default",
            SortMode::Latest => "latest",
            SortMode::TopRated => "top-rated",
            SortMode::Trending => "trending",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Default => "All movies",
            SortMode::Latest => "Latest",
            SortMode::TopRated => "Top rated",
            SortMode::Trending => "Trending",
        }
    }

    fn compare(self, a: &MovieSnapshot, b: &MovieSnapshot) -> Ordering {
        match self {
            SortMode::Default => b.release_date.cmp(&a.release_date),
            SortMode::Latest => b.created_at.cmp(&a.created_at),
            SortMode::TopRated => b.rating.average.total_cmp(&a.rating.average),
            SortMode::Trending => b
                .rating
                .average
                .total_cmp(&a.rating.average)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenreFilter {
    Id(i32),
    /// Matched case-insensitively against the genre name.
    Name(String),
}

impl GenreFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<i32>() {
            Ok(id) => GenreFilter::Id(id),
            Err(_) => GenreFilter::Name(raw.to_lowercase()),
        })
    }

    fn matches(&self, genre: &GenreRef) -> bool {
        match self {
            GenreFilter::Id(id) => genre.id == *id,
            GenreFilter::Name(name) => genre.name.to_lowercase() == *name,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MovieQuery {
    /// Lowercased substring matched against title, description and genre name.
    pub text: Option<String>,
    pub genre: Option<GenreFilter>,
    pub featured_only: bool,
    pub sort: SortMode,
}

impl MovieQuery {
    /// Builds a query from request parameters; unknown sort names fall back to the default order.
    pub fn from_params(params: &ListParams) -> Self {
        let text = params
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let genre = params.genre.as_deref().and_then(GenreFilter::parse);
        let sort = match params.sort.as_deref().map(str::parse::<SortMode>) {
            Some(Ok(sort)) => sort,
            Some(Err(err)) => {
                tracing::debug!(error = %err, "ignoring sort parameter");
                SortMode::Default
            },
            None => SortMode::Default,
        };
        Self { text, genre, featured_only: false, sort }
    }

    pub fn sorted_by(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn in_genre(mut self, genre: GenreFilter) -> Self {
        self.genre = Some(genre);
        self
    }

    pub fn matches(&self, movie: &MovieSnapshot) -> bool {
        if self.featured_only && !movie.featured {
            return false;
        }
        if let Some(genre) = &self.genre {
            if !genre.matches(&movie.genre) {
                return false;
            }
        }
        match &self.text {
            Some(needle) => {
                movie.title.to_lowercase().contains(needle)
                    || movie.description.to_lowercase().contains(needle)
                    || movie.genre.name.to_lowercase().contains(needle)
            },
            None => true,
        }
    }

    /// Filters and orders the collection. Ties fall back to ascending id.
    pub fn apply(&self, movies: Vec<MovieSnapshot>) -> Vec<MovieSnapshot> {
        let mut out: Vec<MovieSnapshot> = movies.into_iter().filter(|m| self.matches(m)).collect();
        out.sort_by(|a, b| self.sort.compare(a, b).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total: self.total,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Parses a 1-based page number. Missing or malformed input means page 1.
pub fn page_number(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(1)
}

/// Slices out page `requested`, clamped into `1..=num_pages`. An empty
/// collection still has one (empty) page.
pub fn paginate<T>(items: Vec<T>, per_page: usize, requested: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let num_pages = total.div_ceil(per_page).max(1);
    let number = requested.clamp(1, num_pages);

    let start = (number - 1) * per_page;
    let items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        number,
        num_pages,
        per_page,
        total,
        has_next: number < num_pages,
        has_previous: number > 1,
    }
}

pub fn home_rails(movies: &[MovieSnapshot]) -> HomeRails {
    let featured = MovieQuery { featured_only: true, ..MovieQuery::default() };
    let latest = MovieQuery::default();
    let trending = MovieQuery::default().sorted_by(SortMode::Trending);

    HomeRails {
        featured: rail(&featured, movies, FEATURED_RAIL),
        latest: rail(&latest, movies, LATEST_RAIL),
        trending: rail(&trending, movies, TRENDING_RAIL),
    }
}

fn rail(query: &MovieQuery, movies: &[MovieSnapshot], len: usize) -> Vec<MovieCard> {
    query.apply(movies.to_vec()).iter().take(len).map(MovieCard::from_snapshot).collect()
}
