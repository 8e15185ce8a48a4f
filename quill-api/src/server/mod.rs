use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri, header},
    middleware,
    response::{IntoResponse, Response},
};
use cache::PageCache;
use media::{MediaError, MediaStore};
use quill_common::{
    model::{
        Id,
        auth::{AuthTokenHashError, PasswordHashError},
        post::PostMarker,
    },
    util::PositiveDuration,
};
use quill_db::store::{DbError, Store};
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::{debug, error};

mod auth;
pub mod cache;
mod context;
mod csrf;
mod form;
pub mod media;
mod routes;
mod views;


pub type ServerRouter = Router<ServerState>;

pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SessionTtl(pub Option<PositiveDuration>);

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub page_cache: Arc<PageCache>,
    pub media: Arc<MediaStore>,
    pub session_ttl: SessionTtl,
}

pub fn app(state: ServerState) -> Router {
    let media_service = ServeDir::new(state.media.root());

    routes::routes()
        .nest_service("/media", media_service)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(csrf::ensure_csrf_cookie))
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub(crate) fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart form failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("CSRF token missing or incorrect")]
    CsrfFailure,
    #[error("Login required to access {next}")]
    LoginRequired { next: String },
    #[error("The session token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User {0} was not found.")]
    UserByUsernameNotFound(String),
    #[error("Group {0} was not found.")]
    GroupBySlugNotFound(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByUsernameNotFound(_)
            | ServerError::GroupBySlugNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_) => StatusCode::BAD_REQUEST,
            ServerError::CsrfFailure => StatusCode::FORBIDDEN,
            ServerError::LoginRequired { .. } => StatusCode::FOUND,
            ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_)
            | ServerError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let page = match &self {
            ServerError::LoginRequired { next } => {
                return redirect(&routes::auth::login_url(Some(next)));
            }
            ServerError::CsrfFailure => views::errors::csrf_failure(),
            ServerError::UnknownRoute(uri) => views::errors::not_found(uri.path()),
            _ if status == StatusCode::NOT_FOUND => views::errors::not_found(""),
            _ if status == StatusCode::FORBIDDEN => views::errors::permission_denied(),
            _ if status.is_client_error() => views::errors::bad_request(),
            _ => views::errors::server_error(),
        };

        (status, page).into_response()
    }
}
