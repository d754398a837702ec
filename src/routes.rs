use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};

use crate::{
    AppState, api,
    auth::{SESSION_COOKIE, Viewer},
    config::Config,
    error::{AppError, AppResult},
    listing::{self, GenreFilter, MovieQuery, SortMode},
    models::{ListParams, LoginForm, MovieCard, RegisterForm, ReviewForm},
    templates::{self, ListLinks},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout).post(logout))
        .route("/register", get(register_form).post(register))
        .route("/movies", get(movie_list))
        .route("/movies/latest", get(latest))
        .route("/movies/top-rated", get(top_rated))
        .route("/movies/trending", get(trending))
        .route("/movies/favorites", get(favorites))
        .route("/movies/genre/{genre_id}", get(movies_by_genre))
        .route("/movies/{id}", get(movie_detail))
        .route("/movies/{id}/favorite", post(toggle_favorite))
        .route("/movies/{id}/review", post(add_review))
        .nest("/api", api::router())
        .with_state(state)
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> AppResult<Html<String>> {
    let movies = state.catalog.snapshots().await?;
    let genres = state.catalog.genres().await?;
    let rails = listing::home_rails(&movies);
    Ok(Html(templates::home_page(viewer.user(), &rails, &genres)))
}

pub async fn movie_list(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let query = MovieQuery::from_params(&params);
    let sort = query.sort;
    let links = ListLinks {
        base_path: "/movies".to_string(),
        sort: (sort != SortMode::Default).then_some(sort),
        ..list_links(&params)
    };
    render_list(&state, &viewer, sort.label(), query, &params, links).await
}

pub async fn latest(
    state: State<Arc<AppState>>,
    viewer: Viewer,
    params: Query<ListParams>,
) -> AppResult<Html<String>> {
    sorted_list(state, viewer, params, SortMode::Latest).await
}

pub async fn top_rated(
    state: State<Arc<AppState>>,
    viewer: Viewer,
    params: Query<ListParams>,
) -> AppResult<Html<String>> {
    sorted_list(state, viewer, params, SortMode::TopRated).await
}

pub async fn trending(
    state: State<Arc<AppState>>,
    viewer: Viewer,
    params: Query<ListParams>,
) -> AppResult<Html<String>> {
    sorted_list(state, viewer, params, SortMode::Trending).await
}

async fn sorted_list(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(params): Query<ListParams>,
    sort: SortMode,
) -> AppResult<Html<String>> {
    let query = MovieQuery::from_params(&params).sorted_by(sort);
    let links =
        ListLinks { base_path: format!("/movies/{}", sort.as_str()), ..list_links(&params) };
    render_list(&state, &viewer, sort.label(), query, &params, links).await
}

pub async fn movies_by_genre(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(genre_id): Path<i32>,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let genre = state.catalog.genre(genre_id).await?;
    let query = MovieQuery::from_params(&params).in_genre(GenreFilter::Id(genre.id));
    let links = ListLinks {
        base_path: format!("/movies/genre/{}", genre.id),
        genre: None,
        ..list_links(&params)
    };
    render_list(&state, &viewer, &genre.name, query, &params, links).await
}

pub async fn favorites(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let user = viewer.require()?;
    let movies = state.catalog.favorite_snapshots(user.id).await?;
    let page = listing::paginate(
        movies,
        state.config.page_size,
        listing::page_number(params.page.as_deref()),
    )
    .map(|m| MovieCard::from_snapshot(&m));
    Ok(Html(templates::favorites_page(viewer.user(), &page)))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> AppResult<Html<String>> {
    let detail = state.catalog.movie_detail(id).await?;
    let is_favorite = match viewer.id() {
        Some(user_id) => state.catalog.is_favorite(user_id, id).await?,
        None => false,
    };
    Ok(Html(templates::movie_detail_page(viewer.user(), &detail, is_favorite)))
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.mutator.toggle_favorite(viewer.id(), id).await?;
    Ok(Redirect::to(&format!("/movies/{id}")))
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    state.mutator.submit_review(id, viewer.id(), form.rating, &form.comment).await?;
    Ok(Redirect::to(&format!("/movies/{id}")))
}

pub async fn login_form() -> Html<String> {
    Html(templates::login_page(None))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok(token) => {
            let jar = jar.add(session_cookie(token, &state.config));
            (jar, Redirect::to("/")).into_response()
        },
        Err(AppError::Unauthorized(msg)) => {
            (StatusCode::UNAUTHORIZED, Html(templates::login_page(Some(msg)))).into_response()
        },
        Err(err) => err.into_response(),
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.accounts.logout(cookie.value()).await?;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}

pub async fn register_form() -> Html<String> {
    Html(templates::register_page(None))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    match state.accounts.register(&form).await {
        Ok(_) => Redirect::to("/login").into_response(),
        Err(AppError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, Html(templates::register_page(Some(&msg)))).into_response()
        },
        Err(err) => err.into_response(),
    }
}

async fn render_list(
    state: &AppState,
    viewer: &Viewer,
    heading: &str,
    query: MovieQuery,
    params: &ListParams,
    links: ListLinks,
) -> AppResult<Html<String>> {
    let movies = query.apply(state.catalog.snapshots().await?);
    let page = listing::paginate(
        movies,
        state.config.page_size,
        listing::page_number(params.page.as_deref()),
    )
    .map(|m| MovieCard::from_snapshot(&m));
    let genres = state.catalog.genres().await?;
    Ok(Html(templates::movie_list_page(viewer.user(), heading, &page, &genres, &links)))
}

fn list_links(params: &ListParams) -> ListLinks {
    let nonblank = |s: &Option<String>| {
        s.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
    };
    ListLinks {
        base_path: String::new(),
        q: nonblank(&params.q),
        genre: nonblank(&params.genre),
        sort: None,
    }
}

fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::days(config.session_ttl_days))
        .build()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        mutator::Mutator,
        test_helpers::{memory_db, register_user, seed_movie, test_state},
    };

    async fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(test_state(memory_db().await));
        (router(state.clone()), state)
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn movie_list_renders_titles() {
        let (app, state) = app().await;
        seed_movie(state.catalog.db(), "Heat").await;

        let resp =
            app.oneshot(Request::get("/movies").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Heat"));
    }

    #[tokio::test]
    async fn unknown_movie_is_404() {
        let (app, _) = app().await;
        let resp =
            app.oneshot(Request::get("/movies/77").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_favorite_redirects_to_login() {
        let (app, state) = app().await;
        let movie = seed_movie(state.catalog.db(), "Heat").await;

        let req =
            Request::post(format!("/movies/{}/favorite", movie.id)).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn login_sets_cookie_and_review_form_posts() {
        let (app, state) = app().await;
        let movie = seed_movie(state.catalog.db(), "Heat").await;
        let form = RegisterForm {
            username: "ann".into(),
            email: "ann@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        state.accounts.register(&form).await.unwrap();

        let req = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=ann&password=pw"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("session="));
        assert!(set_cookie.contains("HttpOnly"));
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let req = Request::post(format!("/movies/{}/review", movie.id))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, &cookie)
            .body(Body::from("rating=4&comment=tense"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let req = Request::get(format!("/movies/{}", movie.id))
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let html = body_text(app.oneshot(req).await.unwrap()).await;
        assert!(html.contains("tense"));
        assert!(html.contains("4.0 (1)"));
    }

    #[tokio::test]
    async fn bad_login_rerenders_form() {
        let (app, state) = app().await;
        let form = RegisterForm {
            username: "ann".into(),
            email: "ann@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        state.accounts.register(&form).await.unwrap();
        let req = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=ann&password=nope"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(resp).await.contains("Invalid username or password"));
    }

    #[tokio::test]
    async fn register_mismatch_is_400() {
        let (app, _) = app().await;
        let req = Request::post("/register")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=ann&email=a%40b.io&password=x&confirm_password=y"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("Passwords do not match"));
    }

    async fn login_cookie(app: &Router, state: &AppState) -> String {
        let form = RegisterForm {
            username: "cat".into(),
            email: "cat@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        state.accounts.register(&form).await.unwrap();
        let req = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=cat&password=pw"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn unparseable_form_rating_is_400() {
        let (app, state) = app().await;
        let movie = seed_movie(state.catalog.db(), "Heat").await;
        let cookie = login_cookie(&app, &state).await;

        let req = Request::post(format!("/movies/{}/review", movie.id))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, &cookie)
            .body(Body::from("rating=abc&comment=hm"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("rating must be between 1 and 5"));
    }

    async fn seed_ranked(state: &AppState) {
        let db = state.catalog.db().clone();
        seed_movie(&db, "Heat").await;
        let rated = seed_movie(&db, "Ronin").await;
        let bob = register_user(&db, "bob").await;
        Mutator::new(db).submit_review(rated.id, Some(bob.id), 5, "").await.unwrap();
    }

    async fn titles_in_order(app: Router, uri: &str) -> (usize, usize) {
        let resp = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        (html.find("Ronin").unwrap(), html.find("Heat").unwrap())
    }

    #[tokio::test]
    async fn top_rated_page_puts_rated_first() {
        let (app, state) = app().await;
        seed_ranked(&state).await;
        let (ronin, heat) = titles_in_order(app, "/movies/top-rated").await;
        assert!(ronin < heat);
    }

    #[tokio::test]
    async fn trending_page_puts_rated_first() {
        let (app, state) = app().await;
        seed_ranked(&state).await;
        let (ronin, heat) = titles_in_order(app, "/movies/trending").await;
        assert!(ronin < heat);
    }
}
