use crate::server::{ServerError, auth::AuthenticatedUser, cache::CacheScope};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use quill_common::{csrf::CsrfToken, model::user::User};
use quill_db::store::Store;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PageContext {
    pub viewer: Option<AuthenticatedUser>,
    pub csrf: CsrfToken,
}

impl PageContext {
    #[must_use]
    pub fn viewer_user(&self) -> Option<&User> {
        self.viewer.as_ref().map(AuthenticatedUser::user)
    }

    #[must_use]
    pub fn cache_scope(&self) -> CacheScope {
        self.viewer
            .as_ref()
            .map_or(CacheScope::Anonymous, |viewer| {
                CacheScope::User(viewer.user_id(), self.csrf.clone())
            })
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let viewer =
            <AuthenticatedUser as OptionalFromRequestParts<S>>::from_request_parts(parts, state)
                .await?;
        let csrf = parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .unwrap_or_else(CsrfToken::generate_random);

        Ok(Self { viewer, csrf })
    }
}
