use crate::server::{context::PageContext, views::render};

#[must_use]
pub fn author(context: &PageContext) -> String {
    render(
        "About the author",
        Some(context),
        "<h1>About the author</h1>\n\
         <p>Quill is written and maintained by a single developer who wanted a small, fast \
         place to write things down and follow a few friends doing the same.</p>\n",
    )
}

#[must_use]
pub fn tech(context: &PageContext) -> String {
    render(
        "Technologies",
        Some(context),
        "<h1>Technologies</h1>\n\
         <ul>\n\
         <li>Rust and the tokio runtime</li>\n\
         <li>axum for routing and request extraction</li>\n\
         <li>PostgreSQL through sqlx</li>\n\
         <li>argon2 for password and session hashing</li>\n\
         </ul>\n",
    )
}
