use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::OnConflict,
};
use tracing::debug;

use crate::{
    db::now_sec,
    entities::{favorite, movie, review},
    error::{AppError, AppResult},
    models::FavoriteStatus,
};

pub const MAX_COMMENT_CHARS: usize = 500;

/// End-user writes: favorite membership and one review per (movie, user).
///
/// Both rely on the unique indexes for (user, movie) rather than on
/// read-then-write checks, so concurrent callers converge on a single row.
#[derive(Clone)]
pub struct Mutator {
    db: DatabaseConnection,
}

impl Mutator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn toggle_favorite(
        &self,
        user_id: Option<i32>,
        movie_id: i32,
    ) -> AppResult<FavoriteStatus> {
        let user_id = user_id.ok_or_else(AppError::login_required)?;

        let txn = self.db.begin().await?;
        ensure_movie(&txn, movie_id).await?;

        let removed = favorite::Entity::delete_many()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::MovieId.eq(movie_id))
            .exec(&txn)
            .await?;

        let status = if removed.rows_affected > 0 {
            FavoriteStatus::Removed
        } else {
            let model = favorite::ActiveModel {
                id: Default::default(),
                user_id: Set(user_id),
                movie_id: Set(movie_id),
                added_at: Set(now_sec()),
            };
            favorite::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([favorite::Column::UserId, favorite::Column::MovieId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
            FavoriteStatus::Added
        };

        txn.commit().await?;

        debug!(user_id = user_id, movie_id = movie_id, status = ?status, "toggled favorite");
        Ok(status)
    }

    /// Creates or overwrites the caller's review. An existing review keeps its
    /// id and `created_at`; only rating and comment change.
    pub async fn submit_review(
        &self,
        movie_id: i32,
        user_id: Option<i32>,
        rating: i64,
        comment: &str,
    ) -> AppResult<review::Model> {
        let user_id = user_id.ok_or_else(AppError::login_required)?;
        ensure_movie(&self.db, movie_id).await?;

        let rating = validate_rating(rating)?;
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }

        let model = review::ActiveModel {
            id: Default::default(),
            movie_id: Set(movie_id),
            user_id: Set(user_id),
            rating: Set(rating),
            comment: Set(comment.to_string()),
            created_at: Set(now_sec()),
        };

        review::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([review::Column::MovieId, review::Column::UserId])
                    .update_columns([review::Column::Rating, review::Column::Comment])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let stored = review::Entity::find()
            .filter(review::Column::MovieId.eq(movie_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Conflict("review was not stored".to_string()))?;

        debug!(
            review_id = stored.id,
            movie_id = movie_id,
            user_id = user_id,
            rating = rating,
            "stored review"
        );
        Ok(stored)
    }
}

fn validate_rating(rating: i64) -> AppResult<i16> {
    match rating {
        1..=5 => Ok(rating as i16),
        _ => Err(AppError::validation("rating must be between 1 and 5")),
    }
}

async fn ensure_movie<C: ConnectionTrait>(conn: &C, movie_id: i32) -> AppResult<()> {
    movie::Entity::find_by_id(movie_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("movie"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{memory_db, register_user, seed_movie};

    #[tokio::test]
    async fn toggling_twice_restores_membership() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let user = register_user(&db, "alice").await;
        let mutator = Mutator::new(db.clone());

        assert_eq!(
            mutator.toggle_favorite(Some(user.id), movie.id).await.unwrap(),
            FavoriteStatus::Added
        );
        assert_eq!(favorite::Entity::find().all(&db).await.unwrap().len(), 1);

        assert_eq!(
            mutator.toggle_favorite(Some(user.id), movie.id).await.unwrap(),
            FavoriteStatus::Removed
        );
        assert!(favorite::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn anonymous_toggle_is_rejected() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let err = Mutator::new(db).toggle_favorite(None, movie.id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn toggle_on_missing_movie_is_not_found() {
        let db = memory_db().await;
        let user = register_user(&db, "alice").await;
        let err = Mutator::new(db).toggle_favorite(Some(user.id), 404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("movie")));
    }

    #[tokio::test]
    async fn rating_bounds() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let user = register_user(&db, "alice").await;
        let mutator = Mutator::new(db);

        for bad in [0, 6, -1] {
            let err = mutator.submit_review(movie.id, Some(user.id), bad, "").await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "rating {bad}");
        }
        let ok = mutator.submit_review(movie.id, Some(user.id), 3, "").await.unwrap();
        assert_eq!(ok.rating, 3);
    }

    #[tokio::test]
    async fn long_comment_is_rejected() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let user = register_user(&db, "alice").await;
        let mutator = Mutator::new(db);

        let exact = "é".repeat(MAX_COMMENT_CHARS);
        assert!(mutator.submit_review(movie.id, Some(user.id), 4, &exact).await.is_ok());

        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        let err = mutator.submit_review(movie.id, Some(user.id), 4, &long).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn comment_is_stored_verbatim() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let user = register_user(&db, "alice").await;
        let mutator = Mutator::new(db);

        let padded = format!(" {} ", "x".repeat(MAX_COMMENT_CHARS - 1));
        let err = mutator.submit_review(movie.id, Some(user.id), 4, &padded).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = mutator.submit_review(movie.id, Some(user.id), 4, "  tense  ").await.unwrap();
        assert_eq!(stored.comment, "  tense  ");
    }

    #[tokio::test]
    async fn resubmitting_overwrites_in_place() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let user = register_user(&db, "alice").await;
        let mutator = Mutator::new(db.clone());

        let first = mutator.submit_review(movie.id, Some(user.id), 2, "slow").await.unwrap();
        let second = mutator.submit_review(movie.id, Some(user.id), 5, "grew on me").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.rating, 5);
        assert_eq!(second.comment, "grew on me");

        let all = review::Entity::find().all(&db).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rating, 5);
    }

    #[tokio::test]
    async fn anonymous_review_is_rejected() {
        let db = memory_db().await;
        let movie = seed_movie(&db, "Heat").await;
        let err = Mutator::new(db).submit_review(movie.id, None, 3, "").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
