use crate::server::{
    Result, ServerError, ServerRouter, SessionTtl,
    auth::{AuthenticatedUser, expired_session_cookie, session_cookie},
    context::PageContext,
    csrf,
    form::{CsrfForm, FieldErrors, Form, LoginForm, NextQuery, Query, SignupForm},
    redirect,
    routes::posts::IndexPath,
    views,
};
use axum::{
    Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    auth::{AuthToken, Authentication, PASSWORD_MIN_LEN, PasswordHash},
    user::{CreateUser, EMAIL_MAX_LEN, User, Username, is_plausible_email},
};
use quill_db::store::{DbError, Store};
use serde::Deserialize;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info, warn};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(signup_form)
        .typed_post(signup)
        .typed_post(logout)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(ServerError))]
pub struct LoginPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
pub struct SignupPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout/", rejection(ServerError))]
pub struct LogoutPath();

const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[must_use]
pub fn login_url(next: Option<&str>) -> String {
    match next {
        Some(next) => format!("{}?next={}", LoginPath(), urlencoding::encode(next)),
        None => LoginPath().to_string(),
    }
}

/// Only same-site absolute paths are followed after login.
fn local_redirect_target(next: Option<&str>) -> Option<&str> {
    next.filter(|next| {
        next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
    })
}

async fn start_session(
    store: &dyn Store,
    session_ttl: SessionTtl,
    user: &User,
    location: &str,
) -> Result<Response> {
    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: session_ttl.0,
    };
    store.create_auth(&authentication).await?;
    info!(user = %user.id, "Started session");

    let max_age = session_ttl
        .0
        .map(|ttl| ttl.get().whole_seconds());
    let mut response = redirect(location);
    match session_cookie(&token, max_age) {
        Some(cookie) => {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        None => warn!(user = %user.id, "Could not encode session cookie"),
    }

    Ok(response)
}

async fn login_form(
    LoginPath(): LoginPath,
    context: PageContext,
    Query(query): Query<NextQuery>,
) -> Html<String> {
    Html(views::auth::login(
        &context,
        "",
        query.next.as_deref(),
        &FieldErrors::default(),
    ))
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(session_ttl): State<SessionTtl>,
    context: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;

    let credentials = match Username::new(form.username.trim().to_owned()) {
        Ok(username) => store.fetch_credentials(&username).await?,
        Err(_) => None,
    };

    match credentials {
        Some((user, password_hash)) if password_hash.verify(&form.password) => {
            let location = local_redirect_target(form.next.as_deref())
                .map_or_else(|| IndexPath().to_string(), str::to_owned);
            start_session(&*store, session_ttl, &user, &location).await
        }
        _ => {
            debug!(username = %form.username, "Rejecting login");
            let mut errors = FieldErrors::default();
            errors.add(FieldErrors::NON_FIELD, INVALID_LOGIN_MESSAGE);

            let page = views::auth::login(&context, &form.username, form.next.as_deref(), &errors);
            Ok(Html(page).into_response())
        }
    }
}

async fn signup_form(SignupPath(): SignupPath, context: PageContext) -> Html<String> {
    Html(views::auth::signup(&context, "", "", &FieldErrors::default()))
}

async fn signup(
    SignupPath(): SignupPath,
    State(store): State<Arc<dyn Store>>,
    State(session_ttl): State<SessionTtl>,
    context: PageContext,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;
    let mut errors = FieldErrors::default();

    let username = Username::new(form.username.trim().to_owned())
        .inspect_err(|_| {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        })
        .ok();

    let email = form.email.trim();
    if email.len() > EMAIL_MAX_LEN || !is_plausible_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    if form.password1.chars().count() < PASSWORD_MIN_LEN {
        errors.add(
            "password1",
            format!("This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."),
        );
    }
    if form.password1 != form.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    if let (Some(username), true) = (username, errors.is_empty()) {
        let new_user = CreateUser {
            username,
            email: email.to_owned(),
            password_hash: PasswordHash::generate(&form.password1)?,
        };

        match store.create_user(&new_user).await {
            Ok(user) => {
                info!(user = %user.id, username = %user.username, "Signed up");
                return start_session(&*store, session_ttl, &user, &IndexPath().to_string()).await;
            }
            Err(DbError::UsernameTaken(_)) => {
                errors.add("username", "A user with that username already exists.");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let page = views::auth::signup(&context, &form.username, &form.email, &errors);
    Ok(Html(page).into_response())
}

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    context: PageContext,
    Form(form): Form<CsrfForm>,
) -> Result<Response> {
    csrf::verify(&context.csrf, &form.csrf_token)?;

    if let Some(user) = user {
        store.delete_auth(user.token_hash()).await?;
        info!(user = %user.user_id(), "Ended session");
    }

    let mut response = redirect(&IndexPath().to_string());
    response
        .headers_mut()
        .append(header::SET_COOKIE, expired_session_cookie());

    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::server::routes::auth::{local_redirect_target, login_url};

    #[test]
    fn login_urls_carry_the_return_target() {
        assert_eq!(login_url(None), "/auth/login/");
        assert_eq!(
            login_url(Some("/posts/3/edit/")),
            "/auth/login/?next=%2Fposts%2F3%2Fedit%2F"
        );
    }

    #[test]
    fn only_local_targets_are_followed() {
        assert_eq!(local_redirect_target(Some("/follow/")), Some("/follow/"));
        assert_eq!(local_redirect_target(Some("//evil.example")), None);
        assert_eq!(local_redirect_target(Some("https://evil.example")), None);
        assert_eq!(local_redirect_target(Some("/\\evil.example")), None);
        assert_eq!(local_redirect_target(None), None);
    }
}
