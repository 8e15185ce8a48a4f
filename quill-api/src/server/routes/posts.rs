use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    cache::{PageCache, PageKey},
    context::PageContext,
    csrf,
    form::{CommentForm, FieldErrors, Form, PageQuery, PostDraft, PostSubmission, Query},
    media::MediaStore,
    redirect,
    routes::profiles::ProfilePath,
    views::{
        self,
        posts::{PostDetailView, PostFormView},
    },
};
use axum::{
    Router,
    extract::State,
    http::Uri,
    response::{Html, IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::{
    model::{
        Id,
        comment::CreateComment,
        post::{CreatePost, Post, PostMarker, UpdatePost},
    },
    util::NonBlankText,
};
use quill_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(index)
        .typed_get(post_detail)
        .typed_get(create_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_get(comment_form_redirect)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
pub struct IndexPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
pub struct PostDetailPath {
    pub id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
pub struct CreatePostPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
pub struct EditPostPath {
    pub id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
pub struct AddCommentPath {
    pub id: Id<PostMarker>,
}

async fn fetch_post(store: &dyn Store, id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

async fn store_image(media: &MediaStore, draft: &PostDraft) -> Result<Option<String>> {
    match &draft.image {
        Some((kind, bytes)) => Ok(Some(media.save_image(*kind, bytes).await?)),
        None => Ok(None),
    }
}

async fn index(
    IndexPath(): IndexPath,
    State(store): State<Arc<dyn Store>>,
    State(page_cache): State<Arc<PageCache>>,
    context: PageContext,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let key = PageKey {
        scope: context.cache_scope(),
        uri: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_owned(), ToString::to_string),
    };

    let (store, context, request) = (&store, &context, query.request());
    let body = page_cache
        .get_or_render(key, || async move {
            let page = store.list_posts(request).await?;
            Ok::<_, ServerError>(views::posts::index(context, &page))
        })
        .await?;

    Ok(Html(body))
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
    context: PageContext,
) -> Result<Html<String>> {
    let post = fetch_post(&*store, id).await?;
    let author_post_count = store.count_author_posts(post.author.id).await?;
    let comments = store.list_comments(post.id).await?;

    Ok(Html(views::posts::detail(
        &context,
        &PostDetailView {
            post: &post,
            author_post_count,
            comments: &comments,
        },
    )))
}

async fn create_post_form(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
    context: PageContext,
) -> Result<Html<String>> {
    let groups = store.list_groups().await?;

    Ok(Html(views::posts::post_form(
        &context,
        &PostFormView {
            editing: None,
            text: "",
            group: "",
            groups: &groups,
            errors: &FieldErrors::default(),
        },
    )))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    context: PageContext,
    submission: PostSubmission,
) -> Result<Response> {
    csrf::verify(&context.csrf, &submission.csrf_token)?;
    let groups = store.list_groups().await?;

    let draft = match submission.validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            debug!(user = %user.user_id(), ?errors, "Rejecting invalid post");
            let page = views::posts::post_form(
                &context,
                &PostFormView {
                    editing: None,
                    text: &submission.text,
                    group: &submission.group,
                    groups: &groups,
                    errors: &errors,
                },
            );
            return Ok(Html(page).into_response());
        }
    };

    let image = store_image(&media, &draft).await?;
    let post_id = store
        .create_post(&CreatePost {
            author: user.user_id(),
            text: draft.text,
            group: draft.group,
            image,
        })
        .await?;
    info!(post = %post_id, author = %user.user_id(), "Created post");

    let profile = ProfilePath {
        username: user.user().username.clone(),
    };
    Ok(redirect(&profile.to_string()))
}

async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    context: PageContext,
) -> Result<Response> {
    let post = fetch_post(&*store, id).await?;
    if post.author.id != user.user_id() {
        return Ok(redirect(&PostDetailPath { id }.to_string()));
    }

    let groups = store.list_groups().await?;
    let group = post
        .group
        .as_ref()
        .map(|group| group.id.to_string())
        .unwrap_or_default();

    let page = views::posts::post_form(
        &context,
        &PostFormView {
            editing: Some(id),
            text: &post.text,
            group: &group,
            groups: &groups,
            errors: &FieldErrors::default(),
        },
    );
    Ok(Html(page).into_response())
}

async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    context: PageContext,
    submission: PostSubmission,
) -> Result<Response> {
    csrf::verify(&context.csrf, &submission.csrf_token)?;
    let post = fetch_post(&*store, id).await?;
    if post.author.id != user.user_id() {
        debug!(post = %id, user = %user.user_id(), "Refusing edit by non-author");
        return Ok(redirect(&PostDetailPath { id }.to_string()));
    }

    let groups = store.list_groups().await?;
    let draft = match submission.validate(&groups) {
        Ok(draft) => draft,
        Err(errors) => {
            let page = views::posts::post_form(
                &context,
                &PostFormView {
                    editing: Some(id),
                    text: &submission.text,
                    group: &submission.group,
                    groups: &groups,
                    errors: &errors,
                },
            );
            return Ok(Html(page).into_response());
        }
    };

    let image = store_image(&media, &draft).await?;
    store
        .update_post(
            id,
            &UpdatePost {
                text: draft.text,
                group: draft.group,
                image,
            },
        )
        .await?;
    info!(post = %id, "Updated post");

    Ok(redirect(&PostDetailPath { id }.to_string()))
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    context: PageContext,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;
    let post = fetch_post(&*store, id).await?;

    if let Ok(text) = NonBlankText::new(&form.text) {
        let comment_id = store
            .create_comment(&CreateComment {
                post: post.id,
                author: user.user_id(),
                text,
            })
            .await?;
        debug!(comment = %comment_id, post = %post.id, "Added comment");
    }

    Ok(redirect(&PostDetailPath { id }.to_string()))
}

/// Lands on the post after a login that was triggered by the comment form.
async fn comment_form_redirect(
    AddCommentPath { id }: AddCommentPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Response> {
    let post = fetch_post(&*store, id).await?;

    Ok(redirect(&PostDetailPath { id: post.id }.to_string()))
}
