use crate::server::{ServerError, ServerRouter, context::PageContext, views};
use axum::{Router, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(author).typed_get(tech)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/author/", rejection(ServerError))]
pub struct AboutAuthorPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/tech/", rejection(ServerError))]
pub struct AboutTechPath();

async fn author(AboutAuthorPath(): AboutAuthorPath, context: PageContext) -> Html<String> {
    Html(views::about::author(&context))
}

async fn tech(AboutTechPath(): AboutTechPath, context: PageContext) -> Html<String> {
    Html(views::about::tech(&context))
}
