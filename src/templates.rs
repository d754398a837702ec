use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, html};

use crate::{
    entities::{genre, user},
    listing::{Page, SortMode},
    models::{HomeRails, MovieCard, MovieDetail, ReviewView},
    mutator::MAX_COMMENT_CHARS,
    rating::Star,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Filters echoed back into pagination and sort links.
#[derive(Clone, Debug, Default)]
pub struct ListLinks {
    pub base_path: String,
    pub q: Option<String>,
    pub genre: Option<String>,
    pub sort: Option<SortMode>,
}

impl ListLinks {
    fn href(&self, page: usize) -> String {
        let mut params = Vec::new();
        if let Some(q) = &self.q {
            params.push(format!("q={}", urlencoding::encode(q)));
        }
        if let Some(genre) = &self.genre {
            params.push(format!("genre={}", urlencoding::encode(genre)));
        }
        if let Some(sort) = self.sort {
            params.push(format!("sort={}", sort.as_str()));
        }
        params.push(format!("page={page}"));
        format!("{}?{}", self.base_path, params.join("&"))
    }
}

pub fn home_page(
    viewer: Option<&user::Model>,
    rails: &HomeRails,
    genres: &[genre::Model],
) -> String {
    page(
        "Marquee",
        viewer,
        html! {
            div class="max-w-6xl mx-auto px-6 py-10 space-y-12" {
                (search_form("", None))
                (genre_nav(genres))
                (rail("Featured", &rails.featured, "/movies"))
                (rail("Latest releases", &rails.latest, "/movies"))
                (rail("Trending", &rails.trending, "/movies/trending"))
            }
        },
    )
}

pub fn movie_list_page(
    viewer: Option<&user::Model>,
    heading: &str,
    movies: &Page<MovieCard>,
    genres: &[genre::Model],
    links: &ListLinks,
) -> String {
    page(
        heading,
        viewer,
        html! {
            div class="max-w-6xl mx-auto px-6 py-10" {
                div class="flex items-start justify-between gap-6" {
                    div {
                        h1 class="text-3xl font-bold text-gray-900" { (heading) }
                        p class="mt-2 text-gray-600" { (movies.total) " movies" }
                    }
                    (sort_nav())
                }

                div class="mt-6" { (search_form(links.q.as_deref().unwrap_or(""), links.genre.as_deref())) }
                div class="mt-4" { (genre_nav(genres)) }

                @if movies.items.is_empty() {
                    div class="mt-10 bg-white shadow rounded-lg p-8" {
                        p class="text-gray-600" { "No movies found." }
                    }
                } @else {
                    div class="mt-8 grid gap-6 sm:grid-cols-2 lg:grid-cols-3" {
                        @for movie in &movies.items {
                            (movie_card(movie))
                        }
                    }
                }

                (pagination(movies, links))
            }
        },
    )
}

pub fn movie_detail_page(
    viewer: Option<&user::Model>,
    detail: &MovieDetail,
    is_favorite: bool,
) -> String {
    let movie = &detail.movie;
    page(
        &movie.title,
        viewer,
        html! {
            div class="max-w-4xl mx-auto px-6 py-10" {
                div class="bg-white shadow rounded-lg p-8" {
                    div class="flex items-start justify-between gap-4" {
                        div {
                            h1 class="text-3xl font-bold text-gray-900" { (movie.title) }
                            p class="mt-2 text-gray-600" {
                                a class="text-blue-600 hover:text-blue-800" href=(format!("/movies/genre/{}", movie.genre.id)) { (movie.genre.name) }
                                " · " (movie.release_date.strftime("%Y-%m-%d").to_string())
                                @if let Some(minutes) = movie.duration {
                                    " · " (minutes) " min"
                                }
                            }
                            div class="mt-3" { (star_row(movie)) }
                        }
                        @if viewer.is_some() {
                            form method="post" action=(format!("/movies/{}/favorite", movie.id)) {
                                button class="rounded-md border border-gray-300 px-4 py-2 text-sm font-medium hover:bg-gray-50" type="submit" {
                                    @if is_favorite { "♥ Remove from favorites" } @else { "♡ Add to favorites" }
                                }
                            }
                        }
                    }
                    p class="mt-6 text-gray-700 whitespace-pre-line" { (movie.description) }
                }

                div class="mt-10" {
                    h2 class="text-xl font-semibold text-gray-900" { "Reviews" }
                    @if viewer.is_some() {
                        (review_form(movie.id))
                    } @else {
                        p class="mt-2 text-sm text-gray-500" {
                            a class="text-blue-600 hover:text-blue-800" href="/login" { "Log in" } " to leave a review."
                        }
                    }
                    @if detail.reviews.is_empty() {
                        p class="mt-4 text-gray-600" { "No reviews yet." }
                    } @else {
                        ul class="mt-4 space-y-4" {
                            @for review in &detail.reviews {
                                (review_item(review))
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn favorites_page(viewer: Option<&user::Model>, movies: &Page<MovieCard>) -> String {
    let links = ListLinks { base_path: "/movies/favorites".to_string(), ..ListLinks::default() };
    page(
        "Favorites",
        viewer,
        html! {
            div class="max-w-6xl mx-auto px-6 py-10" {
                h1 class="text-3xl font-bold text-gray-900" { "Your favorites" }
                @if movies.items.is_empty() {
                    div class="mt-10 bg-white shadow rounded-lg p-8" {
                        p class="text-gray-600" { "Nothing here yet." }
                    }
                } @else {
                    div class="mt-8 grid gap-6 sm:grid-cols-2 lg:grid-cols-3" {
                        @for movie in &movies.items {
                            (movie_card(movie))
                        }
                    }
                }
                (pagination(movies, &links))
            }
        },
    )
}

pub fn login_page(error: Option<&str>) -> String {
    page(
        "Log in",
        None,
        html! {
            div class="max-w-md mx-auto px-6 py-12" {
                div class="bg-white shadow rounded-lg p-8" {
                    h1 class="text-2xl font-bold text-gray-900" { "Log in" }
                    (error_banner(error))
                    form class="mt-6 space-y-4" method="post" action="/login" {
                        (text_input("username", "Username", "text"))
                        (text_input("password", "Password", "password"))
                        button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Log in" }
                    }
                    p class="mt-4 text-sm text-gray-600" {
                        "No account? " a class="text-blue-600 hover:text-blue-800" href="/register" { "Register" }
                    }
                }
            }
        },
    )
}

pub fn register_page(error: Option<&str>) -> String {
    page(
        "Register",
        None,
        html! {
            div class="max-w-md mx-auto px-6 py-12" {
                div class="bg-white shadow rounded-lg p-8" {
                    h1 class="text-2xl font-bold text-gray-900" { "Create an account" }
                    (error_banner(error))
                    form class="mt-6 space-y-4" method="post" action="/register" {
                        (text_input("username", "Username", "text"))
                        (text_input("email", "Email", "email"))
                        (text_input("password", "Password", "password"))
                        (text_input("confirm_password", "Confirm password", "password"))
                        button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Register" }
                    }
                }
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    page(
        "Error",
        None,
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Error " (status.as_u16()) }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, viewer: Option<&user::Model>, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · Marquee" }
                script src=(TAILWIND_CDN) {}
            }
            body class="bg-gray-50" {
                nav class="bg-white shadow" {
                    div class="max-w-6xl mx-auto px-6 py-4 flex items-center justify-between" {
                        a class="text-xl font-bold text-gray-900" href="/" { "Marquee" }
                        div class="flex items-center gap-4 text-sm" {
                            a class="text-gray-700 hover:text-gray-900" href="/movies" { "Movies" }
                            @if let Some(user) = viewer {
                                a class="text-gray-700 hover:text-gray-900" href="/movies/favorites" { "Favorites" }
                                span class="text-gray-500" { (user.username) }
                                a class="text-blue-600 hover:text-blue-800" href="/logout" { "Log out" }
                            } @else {
                                a class="text-blue-600 hover:text-blue-800" href="/login" { "Log in" }
                                a class="text-blue-600 hover:text-blue-800" href="/register" { "Register" }
                            }
                        }
                    }
                }
                (body)
            }
        }
    }
    .into_string()
}

fn rail(label: &str, movies: &[MovieCard], more: &str) -> Markup {
    html! {
        section {
            div class="flex items-baseline justify-between" {
                h2 class="text-2xl font-semibold text-gray-900" { (label) }
                a class="text-sm text-blue-600 hover:text-blue-800" href=(more) { "See all" }
            }
            @if movies.is_empty() {
                p class="mt-4 text-gray-500" { "Nothing to show yet." }
            } @else {
                div class="mt-4 grid gap-6 sm:grid-cols-2 lg:grid-cols-4" {
                    @for movie in movies {
                        (movie_card(movie))
                    }
                }
            }
        }
    }
}

fn movie_card(movie: &MovieCard) -> Markup {
    html! {
        a class="block bg-white shadow rounded-lg p-5 hover:shadow-md" href=(format!("/movies/{}", movie.id)) {
            h3 class="text-lg font-semibold text-gray-900" { (movie.title) }
            p class="mt-1 text-sm text-gray-500" {
                (movie.genre.name) " · " (movie.release_date.year())
            }
            div class="mt-2" { (star_row(movie)) }
        }
    }
}

fn star_row(movie: &MovieCard) -> Markup {
    html! {
        span class="inline-flex items-center gap-1" {
            @for star in movie.stars {
                @match star {
                    Star::Full => span class="text-yellow-400" { "★" },
                    Star::Half => span class="text-yellow-300" { "⯪" },
                    Star::Empty => span class="text-gray-300" { "☆" },
                }
            }
            @if movie.has_rating() {
                span class="ml-2 text-sm text-gray-600" {
                    (format!("{:.1}", movie.avg_rating)) " (" (movie.review_count) ")"
                }
            } @else {
                span class="ml-2 text-sm text-gray-400" { "No ratings" }
            }
        }
    }
}

fn review_item(review: &ReviewView) -> Markup {
    html! {
        li class="bg-white shadow rounded-lg p-5" {
            div class="flex items-center justify-between" {
                span class="font-medium text-gray-900" { (review.user) }
                span class="text-sm text-yellow-500" { (("★").repeat(review.rating.max(0) as usize)) }
            }
            @if !review.comment.is_empty() {
                p class="mt-2 text-gray-700" { (review.comment) }
            }
            p class="mt-2 text-xs text-gray-400" { (review.created_at.strftime("%Y-%m-%d").to_string()) }
        }
    }
}

fn review_form(movie_id: i32) -> Markup {
    html! {
        form class="mt-4 bg-white shadow rounded-lg p-5 space-y-3" method="post" action=(format!("/movies/{movie_id}/review")) {
            label class="block text-sm font-medium text-gray-700" for="rating" { "Rating" }
            select class="rounded-md border border-gray-300 px-3 py-2" name="rating" id="rating" {
                @for r in (1..=5).rev() {
                    option value=(r) { (r) " ★" }
                }
            }
            textarea class="w-full rounded-md border border-gray-300 px-3 py-2" name="comment" rows="3" maxlength=(MAX_COMMENT_CHARS) placeholder="What did you think?" {}
            button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Submit review" }
        }
    }
}

fn search_form(q: &str, genre: Option<&str>) -> Markup {
    html! {
        form class="flex gap-2" method="get" action="/movies" {
            input class="flex-1 rounded-md border border-gray-300 px-3 py-2" type="search" name="q" value=(q) placeholder="Search titles, descriptions, genres";
            @if let Some(genre) = genre {
                input type="hidden" name="genre" value=(genre);
            }
            button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Search" }
        }
    }
}

fn genre_nav(genres: &[genre::Model]) -> Markup {
    html! {
        div class="flex flex-wrap gap-2" {
            @for genre in genres {
                a class="rounded-full bg-white border border-gray-200 px-3 py-1 text-sm text-gray-700 hover:bg-gray-100" href=(format!("/movies/genre/{}", genre.id)) { (genre.name) }
            }
        }
    }
}

fn sort_nav() -> Markup {
    html! {
        div class="flex gap-3 text-sm" {
            @for mode in [SortMode::Latest, SortMode::TopRated, SortMode::Trending] {
                a class="text-blue-600 hover:text-blue-800" href=(format!("/movies/{}", mode.as_str())) { (mode.label()) }
            }
        }
    }
}

fn pagination<T>(page: &Page<T>, links: &ListLinks) -> Markup {
    html! {
        @if page.num_pages > 1 {
            div class="mt-10 flex items-center justify-center gap-4 text-sm" {
                @if page.has_previous {
                    a class="text-blue-600 hover:text-blue-800" href=(links.href(page.number - 1)) { "← Previous" }
                }
                span class="text-gray-600" { "Page " (page.number) " of " (page.num_pages) }
                @if page.has_next {
                    a class="text-blue-600 hover:text-blue-800" href=(links.href(page.number + 1)) { "Next →" }
                }
            }
        }
    }
}

fn text_input(name: &str, label: &str, kind: &str) -> Markup {
    html! {
        div {
            label class="block text-sm font-medium text-gray-700" for=(name) { (label) }
            input class="mt-2 w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500" type=(kind) name=(name) id=(name) required;
        }
    }
}

fn error_banner(error: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = error {
            p class="mt-4 rounded-md bg-red-50 px-4 py-2 text-sm text-red-700" { (message) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_links_keep_filters() {
        let links = ListLinks {
            base_path: "/movies".into(),
            q: Some("star wars".into()),
            genre: Some("Sci-Fi".into()),
            sort: Some(SortMode::TopRated),
        };
        assert_eq!(links.href(2), "/movies?q=star%20wars&genre=Sci-Fi&sort=top-rated&page=2");
    }

    #[test]
    fn error_page_shows_status_and_escapes_message() {
        let html = error_page(StatusCode::NOT_FOUND, "<movie> not found");
        assert!(html.contains("Error 404"));
        assert!(html.contains("&lt;movie&gt; not found"));
    }
}
