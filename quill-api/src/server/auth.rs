use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderValue, request::Parts},
};
use headers::{Cookie, HeaderMapExt};
use quill_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::{User, UserMarker},
};
use quill_db::store::Store;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;

pub const SESSION_COOKIE_NAME: &str = "session";

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }

    /// Looks the session up once per request; later extractors reuse the result.
    async fn resolve<S>(parts: &mut Parts, state: &S) -> Result<Option<Self>, ServerError>
    where
        Arc<dyn Store>: FromRef<S>,
    {
        if let Some(ResolvedSession(resolved)) = parts.extensions.get::<ResolvedSession>() {
            return Ok(resolved.clone());
        }

        let resolved = Self::lookup(parts, state).await?;
        parts
            .extensions
            .insert(ResolvedSession(resolved.clone()));

        Ok(resolved)
    }

    async fn lookup<S>(parts: &Parts, state: &S) -> Result<Option<Self>, ServerError>
    where
        Arc<dyn Store>: FromRef<S>,
    {
        let Some(raw_token) = parts
            .headers
            .typed_get::<Cookie>()
            .and_then(|cookie| cookie.get(SESSION_COOKIE_NAME).map(str::to_owned))
        else {
            return Ok(None);
        };

        let request_token: AuthToken = match raw_token.parse() {
            Ok(token) => token,
            Err(err) => {
                debug!(error = %err, "Ignoring malformed session cookie");
                return Ok(None);
            }
        };

        let token_hash = request_token.hash()?;
        let store = Arc::<dyn Store>::from_ref(state);

        let Some(authentication) = store.fetch_auth(&token_hash).await? else {
            return Ok(None);
        };

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(UtcDateTime::now())
        {
            return Ok(None);
        }

        let user = store.fetch_user(authentication.user).await?;
        Ok(user.map(|user| Self { user, token_hash }))
    }
}

#[derive(Clone)]
struct ResolvedSession(Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Self::resolve(parts, state)
            .await?
            .ok_or_else(|| ServerError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string),
            })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Self::resolve(parts, state).await
    }
}

pub fn session_cookie(token: &AuthToken, max_age_seconds: Option<i64>) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax",
        token.as_token_str()
    );
    if let Some(max_age) = max_age_seconds {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }

    HeaderValue::from_str(&cookie).ok()
}

#[must_use]
pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
