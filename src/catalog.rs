use std::collections::HashMap;

use anyhow::Context;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use tracing::{debug, info, warn};

use crate::{
    db::now_sec,
    entities::{favorite, genre, movie, review, user},
    error::{AppError, AppResult},
    models::{GenreRef, MovieCard, MovieDetail, MovieSnapshot, NewMovie, ReviewView},
    rating::{self, RatingSummary},
};

type DemoMovie = (&'static str, &'static str, (i16, i8, i8), i32, bool);

const DEMO_CATALOG: &[(&str, &[DemoMovie])] = &[
    (
        "Drama",
        &[
            ("Heat", "Thieves and the detective chasing them.", (1995, 12, 15), 170, true),
            ("Past Lives", "Childhood friends meet decades later.", (2023, 6, 2), 106, true),
        ],
    ),
    (
        "Horror",
        &[
            ("Alien", "A towing ship answers a distress call.", (1979, 5, 25), 117, true),
            ("The Thing", "A shapeshifter in Antarctica.", (1982, 6, 25), 109, false),
        ],
    ),
    (
        "Comedy",
        &[
            ("Airplane!", "An ex-pilot lands a stricken airliner.", (1980, 7, 2), 88, false),
            ("Paddington 2", "A bear is framed for theft.", (2017, 11, 10), 104, true),
        ],
    ),
];

/// Read side of the catalog plus the maintenance writes for movies and genres.
#[derive(Clone)]
pub struct CatalogStore {
    db: DatabaseConnection,
}

impl CatalogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn create_genre(&self, name: &str) -> AppResult<genre::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("genre name is required"));
        }

        let lowered = name.to_lowercase();
        if self.genres().await?.iter().any(|g| g.name.to_lowercase() == lowered) {
            return Err(AppError::validation(format!("genre {name} already exists")));
        }

        let genre = genre::ActiveModel { id: Default::default(), name: Set(name.to_string()) }
            .insert(&self.db)
            .await?;
        debug!(genre_id = genre.id, name = %genre.name, "created genre");
        Ok(genre)
    }

    pub async fn create_movie(&self, new: NewMovie) -> AppResult<movie::Model> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }
        if matches!(new.duration, Some(d) if d <= 0) {
            return Err(AppError::validation("duration must be positive"));
        }
        self.genre(new.genre_id).await?;

        let movie = movie::ActiveModel {
            id: Default::default(),
            title: Set(title.to_string()),
            description: Set(new.description),
            release_date: Set(new.release_date.to_string()),
            duration: Set(new.duration),
            genre_id: Set(new.genre_id),
            featured: Set(new.featured),
            created_at: Set(now_sec()),
        }
        .insert(&self.db)
        .await?;
        debug!(movie_id = movie.id, title = %movie.title, "created movie");
        Ok(movie)
    }

    /// Fills an empty catalog with a handful of genres and movies for local runs.
    /// Returns the number of movies created; a non-empty catalog is left alone.
    pub async fn seed_demo(&self) -> AppResult<usize> {
        if !self.genres().await?.is_empty() {
            return Ok(0);
        }

        let mut created = 0;
        for (genre_name, movies) in DEMO_CATALOG {
            let genre = self.create_genre(genre_name).await?;
            for &(title, description, (y, m, d), duration, featured) in *movies {
                self.create_movie(NewMovie {
                    title: title.to_string(),
                    description: description.to_string(),
                    release_date: jiff::civil::date(y, m, d),
                    duration: Some(duration),
                    genre_id: genre.id,
                    featured,
                })
                .await?;
                created += 1;
            }
        }
        info!(movies = created, "seeded demo catalog");
        Ok(created)
    }

    pub async fn genres(&self) -> AppResult<Vec<genre::Model>> {
        Ok(genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await?)
    }

    pub async fn genre(&self, id: i32) -> AppResult<genre::Model> {
        genre::Entity::find_by_id(id).one(&self.db).await?.ok_or(AppError::NotFound("genre"))
    }

    /// Every movie with its genre and rating, in id order.
    pub async fn snapshots(&self) -> AppResult<Vec<MovieSnapshot>> {
        let ratings = self.ratings(None).await?;
        self.load(movie::Entity::find(), ratings).await
    }

    /// The user's favorite movies, most recently added first.
    pub async fn favorite_snapshots(&self, user_id: i32) -> AppResult<Vec<MovieSnapshot>> {
        let movie_ids: Vec<i32> = favorite::Entity::find()
            .select_only()
            .column(favorite::Column::MovieId)
            .filter(favorite::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        let ratings = self.ratings(Some(movie_ids)).await?;

        let select = movie::Entity::find()
            .inner_join(favorite::Entity)
            .filter(favorite::Column::UserId.eq(user_id))
            .order_by_desc(favorite::Column::AddedAt)
            .order_by_desc(favorite::Column::Id);

        self.load(select, ratings).await
    }

    pub async fn movie_detail(&self, id: i32) -> AppResult<MovieDetail> {
        let (movie, genre) = movie::Entity::find_by_id(id)
            .find_also_related(genre::Entity)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("movie"))?;
        let genre = genre.ok_or(AppError::NotFound("genre"))?;

        let reviews = review::Entity::find()
            .filter(review::Column::MovieId.eq(id))
            .find_also_related(user::Entity)
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .all(&self.db)
            .await?;

        let summary = RatingSummary::from_ratings(reviews.iter().map(|(r, _)| r.rating));
        let snapshot = snapshot(movie, genre, summary)?;

        let reviews = reviews
            .into_iter()
            .map(|(r, author)| -> AppResult<ReviewView> {
                Ok(ReviewView {
                    id: r.id,
                    user: author.map(|u| u.username).unwrap_or_else(|| "unknown".to_string()),
                    rating: r.rating,
                    comment: r.comment,
                    created_at: jiff::Timestamp::from_second(r.created_at)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(MovieDetail { movie: MovieCard::from_snapshot(&snapshot), reviews })
    }

    pub async fn is_favorite(&self, user_id: i32, movie_id: i32) -> AppResult<bool> {
        let found = favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::MovieId.eq(movie_id))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    async fn ratings(
        &self,
        movie_ids: Option<Vec<i32>>,
    ) -> AppResult<HashMap<i32, RatingSummary>> {
        let mut select = review::Entity::find()
            .select_only()
            .column(review::Column::MovieId)
            .column(review::Column::Rating);
        if let Some(ids) = movie_ids {
            select = select.filter(review::Column::MovieId.is_in(ids));
        }
        let rows = select.into_tuple::<(i32, i16)>().all(&self.db).await?;
        Ok(rating::summarize_by_movie(rows))
    }

    async fn load(
        &self,
        select: Select<movie::Entity>,
        mut ratings: HashMap<i32, RatingSummary>,
    ) -> AppResult<Vec<MovieSnapshot>> {
        let rows = select
            .find_also_related(genre::Entity)
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (movie, genre) in rows {
            let Some(genre) = genre else {
                warn!(movie_id = movie.id, genre_id = movie.genre_id, "movie without genre");
                continue;
            };
            let summary = ratings.remove(&movie.id).unwrap_or_default();
            out.push(snapshot(movie, genre, summary)?);
        }

        debug!(movies = out.len(), "loaded catalog snapshot");
        Ok(out)
    }
}

fn snapshot(
    movie: movie::Model,
    genre: genre::Model,
    rating: RatingSummary,
) -> AppResult<MovieSnapshot> {
    let release_date: jiff::civil::Date = movie
        .release_date
        .parse()
        .with_context(|| format!("movie {} has a malformed release date", movie.id))?;

    Ok(MovieSnapshot {
        id: movie.id,
        title: movie.title,
        description: movie.description,
        release_date,
        duration: movie.duration,
        genre: GenreRef { id: genre.id, name: genre.name },
        featured: movie.featured,
        created_at: movie.created_at,
        rating,
    })
}
