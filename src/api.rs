//! JSON surface, mounted under `/api`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::Viewer,
    error::AppError,
    listing::{self, MovieQuery, Page},
    models::{
        FavoriteStatus, HomeRails, ListParams, LoginForm, MovieCard, MovieDetail, RegisterForm,
        ReviewForm, ReviewView,
    },
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/home", get(home))
        .route("/movies", get(movies))
        .route("/movies/{id}", get(movie))
        .route("/movies/{id}/favorite", post(toggle_favorite))
        .route("/movies/{id}/review", post(review))
        .route("/favorites", get(favorites))
        .route("/favorites/toggle/{id}", post(toggle_favorite))
        .route("/register", post(register))
        .route("/token", post(token))
}

/// [`AppError`] rendered as `{"error": ...}` instead of an HTML page.
#[derive(Debug)]
pub struct ApiError(AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// [`Viewer`] for API routes, so session lookup failures also answer in JSON.
#[derive(Clone, Debug)]
pub struct ApiViewer(pub Viewer);

impl FromRequestParts<Arc<AppState>> for ApiViewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(Viewer::from_request_parts(parts, state).await?))
    }
}

pub async fn home(State(state): State<Arc<AppState>>) -> ApiResult<Json<HomeRails>> {
    let movies = state.catalog.snapshots().await?;
    Ok(Json(listing::home_rails(&movies)))
}

pub async fn movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<MovieCard>>> {
    let movies = MovieQuery::from_params(&params).apply(state.catalog.snapshots().await?);
    let page = listing::paginate(
        movies,
        state.config.page_size,
        listing::page_number(params.page.as_deref()),
    );
    Ok(Json(page.map(|m| MovieCard::from_snapshot(&m))))
}

pub async fn movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MovieDetail>> {
    Ok(Json(state.catalog.movie_detail(id).await?))
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    ApiViewer(viewer): ApiViewer,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    let status: FavoriteStatus = state.mutator.toggle_favorite(viewer.id(), id).await?;
    Ok(Json(json!({ "status": status })))
}

pub async fn review(
    State(state): State<Arc<AppState>>,
    ApiViewer(viewer): ApiViewer,
    Path(id): Path<i32>,
    body: Result<Json<ReviewForm>, JsonRejection>,
) -> ApiResult<Json<ReviewView>> {
    let author = viewer.require()?;
    let Json(form) = body?;
    let stored =
        state.mutator.submit_review(id, Some(author.id), form.rating, &form.comment).await?;
    Ok(Json(ReviewView {
        id: stored.id,
        user: author.username.clone(),
        rating: stored.rating,
        comment: stored.comment,
        created_at: jiff::Timestamp::from_second(stored.created_at)?,
    }))
}

pub async fn favorites(
    State(state): State<Arc<AppState>>,
    ApiViewer(viewer): ApiViewer,
) -> ApiResult<Json<Vec<MovieCard>>> {
    let user = viewer.require()?;
    let movies = state.catalog.favorite_snapshots(user.id).await?;
    Ok(Json(movies.iter().map(MovieCard::from_snapshot).collect()))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterForm>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(form) = body?;
    let created = state.accounts.register(&form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created successfully",
            "id": created.id,
            "username": created.username,
        })),
    ))
}

pub async fn token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginForm>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(form) = body?;
    let token = state.accounts.login(&form.username, &form.password).await?;
    Ok(Json(json!({ "token": token })))
}
