use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    context::PageContext,
    csrf,
    form::{CsrfForm, Form, PageQuery, Query},
    redirect, views,
};
use axum::{
    Router,
    extract::State,
    response::{Html, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    follow::Follow,
    user::{User, Username},
};
use quill_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(profile)
        .typed_get(follow_redirect)
        .typed_post(follow_author)
        .typed_get(unfollow_redirect)
        .typed_post(unfollow_author)
        .typed_get(feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub struct ProfilePath {
    pub username: Username,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
pub struct FollowAuthorPath {
    pub username: Username,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
pub struct UnfollowAuthorPath {
    pub username: Username,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
pub struct FeedPath();

async fn fetch_author(store: &dyn Store, username: Username) -> Result<User> {
    store
        .fetch_user_by_username(&username)
        .await?
        .ok_or_else(|| ServerError::UserByUsernameNotFound(username.into_inner()))
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    context: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let author = fetch_author(&*store, username).await?;
    let post_count = store.count_author_posts(author.id).await?;

    let following = match context.viewer_user() {
        Some(viewer) if viewer.id != author.id => {
            Some(store.is_following(viewer.id, author.id).await?)
        }
        _ => None,
    };

    let page = store.list_author_posts(author.id, query.request()).await?;

    Ok(Html(views::posts::profile(
        &context,
        &views::posts::ProfileView {
            author: &author,
            post_count,
            following,
            page: &page,
        },
    )))
}

async fn follow_author(
    FollowAuthorPath { username }: FollowAuthorPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    context: PageContext,
    Form(form): Form<CsrfForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;
    let author = fetch_author(&*store, username).await?;

    match Follow::new(user.user_id(), author.id) {
        Ok(follow) => {
            if store.follow(follow).await? {
                info!(user = %user.user_id(), author = %author.id, "Started following");
            }
        }
        Err(err) => debug!(user = %user.user_id(), error = %err, "Ignoring follow request"),
    }

    Ok(redirect(&FeedPath().to_string()))
}

async fn unfollow_author(
    UnfollowAuthorPath { username }: UnfollowAuthorPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    context: PageContext,
    Form(form): Form<CsrfForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;
    let author = fetch_author(&*store, username).await?;

    if store.unfollow(user.user_id(), author.id).await? {
        info!(user = %user.user_id(), author = %author.id, "Stopped following");
    }

    Ok(redirect(&FeedPath().to_string()))
}

// Follow buttons only post; a GET arrives after a login redirect and goes back to the profile.
async fn follow_redirect(
    FollowAuthorPath { username }: FollowAuthorPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Response> {
    let author = fetch_author(&*store, username).await?;
    let profile = ProfilePath {
        username: author.username,
    };

    Ok(redirect(&profile.to_string()))
}

async fn unfollow_redirect(
    UnfollowAuthorPath { username }: UnfollowAuthorPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Response> {
    let author = fetch_author(&*store, username).await?;
    let profile = ProfilePath {
        username: author.username,
    };

    Ok(redirect(&profile.to_string()))
}

async fn feed(
    FeedPath(): FeedPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    context: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let page = store.list_feed(user.user_id(), query.request()).await?;

    Ok(Html(views::posts::feed(&context, &page)))
}
