use crate::server::ServerRouter;
use axum::Router;

pub mod about;
pub mod auth;
pub mod groups;
pub mod posts;
pub mod profiles;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(auth::routes())
        .merge(about::routes())
}
