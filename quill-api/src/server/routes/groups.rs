use crate::server::{
    Result, ServerError, ServerRouter,
    context::PageContext,
    form::{PageQuery, Query},
    views,
};
use axum::{Router, extract::State, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::group::Slug;
use quill_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
pub struct GroupPath {
    pub slug: Slug,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(store): State<Arc<dyn Store>>,
    context: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::GroupBySlugNotFound(slug.to_string()))?;
    let page = store.list_group_posts(group.id, query.request()).await?;

    Ok(Html(views::posts::group(&context, &group, &page)))
}
