use crate::server::views::{Escaped, render};
use axum::response::Html;

fn error_page(title: &str, body: String) -> Html<String> {
    Html(render(title, None, body))
}

#[must_use]
pub fn not_found(path: &str) -> Html<String> {
    let detail = if path.is_empty() {
        String::new()
    } else {
        format!(" <code>{}</code>", Escaped(path))
    };

    error_page(
        "Page not found",
        format!("<h1>Error 404</h1>\n<p>The page{detail} was not found.</p>\n"),
    )
}

#[must_use]
pub fn permission_denied() -> Html<String> {
    error_page(
        "Access denied",
        "<h1>Error 403</h1>\n<p>You do not have permission to view this page.</p>\n".to_owned(),
    )
}

#[must_use]
pub fn csrf_failure() -> Html<String> {
    error_page(
        "CSRF check failed",
        "<h1>Error 403</h1>\n<p>CSRF verification failed. The request was aborted.</p>\n"
            .to_owned(),
    )
}

#[must_use]
pub fn bad_request() -> Html<String> {
    error_page(
        "Bad request",
        "<h1>Error 400</h1>\n<p>The request could not be understood.</p>\n".to_owned(),
    )
}

#[must_use]
pub fn server_error() -> Html<String> {
    error_page(
        "Server error",
        "<h1>Error 500</h1>\n<p>Something went wrong on our side.</p>\n".to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use crate::server::views::errors;

    #[test]
    fn error_pages_name_their_status() {
        assert!(errors::not_found("/missing/<x>/").0.contains("/missing/&lt;x&gt;/"));
        assert!(errors::permission_denied().0.contains("Error 403"));
        assert!(errors::csrf_failure().0.contains("CSRF verification failed"));
        assert!(errors::bad_request().0.contains("Error 400"));
        assert!(errors::server_error().0.contains("Error 500"));
    }
}
