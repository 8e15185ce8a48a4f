use crate::server::{
    context::PageContext,
    routes::{
        about::{AboutAuthorPath, AboutTechPath},
        auth::{LoginPath, LogoutPath, SignupPath},
        groups::GroupPath,
        posts::{CreatePostPath, IndexPath, PostDetailPath},
        profiles::{FeedPath, ProfilePath},
    },
};
use quill_common::{
    csrf::{CSRF_FORM_FIELD, CsrfToken},
    model::post::Post,
    page::Page,
};
use std::fmt::{self, Display, Formatter, Write};
use time::{UtcDateTime, macros::format_description};

pub mod about;
pub mod auth;
pub mod errors;
pub mod posts;

#[derive(Copy, Clone, Debug)]
pub struct Escaped<T>(pub T);

struct EscapingWriter<'a, 'b>(&'a mut Formatter<'b>);

impl Write for EscapingWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            match c {
                '&' => self.0.write_str("&amp;")?,
                '<' => self.0.write_str("&lt;")?,
                '>' => self.0.write_str("&gt;")?,
                '"' => self.0.write_str("&quot;")?,
                '\'' => self.0.write_str("&#x27;")?,
                c => self.0.write_char(c)?,
            }
        }

        Ok(())
    }
}

impl<T: Display> Display for Escaped<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(EscapingWriter(f), "{}", self.0)
    }
}

pub struct Multiline<'a>(pub &'a str);

impl Display for Multiline<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, line) in self.0.lines().enumerate() {
            if i > 0 {
                f.write_str("<br>")?;
            }
            write!(f, "{}", Escaped(line))?;
        }

        Ok(())
    }
}

pub struct Timestamp(pub UtcDateTime);

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let formatted = self
            .0
            .format(format_description!(
                "[day] [month repr:short] [year] [hour]:[minute]"
            ))
            .map_err(|_| fmt::Error)?;

        f.write_str(&formatted)
    }
}

pub struct CsrfField<'a>(pub &'a CsrfToken);

impl Display for CsrfField<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<input type="hidden" name="{CSRF_FORM_FIELD}" value="{}">"#,
            Escaped(self.0.as_str())
        )
    }
}

pub struct Layout<'a, B> {
    pub title: &'a str,
    pub context: Option<&'a PageContext>,
    pub body: B,
}

impl<B: Display> Layout<'_, B> {
    fn write_nav(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<header><nav><a href="{}"><strong>Quill</strong></a> <a href="{}">About the author</a> <a href="{}">Technologies</a>"#,
            IndexPath(),
            AboutAuthorPath(),
            AboutTechPath(),
        )?;

        match self.context.and_then(|context| {
            context
                .viewer_user()
                .map(|user| (user, &context.csrf))
        }) {
            Some((user, csrf)) => write!(
                f,
                r#" <a href="{}">New post</a> <a href="{}">Followed authors</a> <a href="{}">{}</a> <form method="post" action="{}" class="inline">{}<button type="submit">Log out</button></form>"#,
                CreatePostPath(),
                FeedPath(),
                Escaped(ProfilePath {
                    username: user.username.clone()
                }),
                Escaped(&user.username),
                LogoutPath(),
                CsrfField(csrf),
            )?,
            None => write!(
                f,
                r#" <a href="{}">Log in</a> <a href="{}">Sign up</a>"#,
                LoginPath(),
                SignupPath(),
            )?,
        }

        f.write_str("</nav></header>\n")
    }
}

impl<B: Display> Display for Layout<'_, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{}</title>\n</head>\n<body>",
            Escaped(self.title)
        )?;
        self.write_nav(f)?;
        writeln!(f, "<main>\n{}</main>", self.body)?;
        writeln!(
            f,
            "<footer><p>&copy; {} Quill</p></footer>\n</body>\n</html>",
            UtcDateTime::now().year()
        )
    }
}

#[must_use]
pub fn render<B: Display>(title: &str, context: Option<&PageContext>, body: B) -> String {
    Layout {
        title,
        context,
        body,
    }
    .to_string()
}

pub struct PostCard<'a> {
    pub post: &'a Post,
    pub show_group_link: bool,
    pub show_detail_link: bool,
}

impl Display for PostCard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let post = self.post;

        writeln!(
            f,
            "<article>\n<ul>\n<li>Author: <a href=\"{}\">{}</a></li>\n<li>Date: {}</li>\n</ul>",
            Escaped(ProfilePath {
                username: post.author.username.clone()
            }),
            Escaped(&post.author.username),
            Timestamp(post.created_at),
        )?;

        if let Some(image) = &post.image {
            writeln!(f, "<img src=\"/media/{}\" alt=\"\">", Escaped(image))?;
        }

        writeln!(f, "<p>{}</p>", Multiline(&post.text))?;

        if self.show_detail_link {
            writeln!(
                f,
                "<a href=\"{}\">Details</a>",
                PostDetailPath { id: post.id }
            )?;
        }

        if self.show_group_link
            && let Some(group) = &post.group
        {
            writeln!(
                f,
                "<a href=\"{}\">All posts of the group {}</a>",
                Escaped(GroupPath {
                    slug: group.slug.clone()
                }),
                Escaped(&group.title),
            )?;
        }

        f.write_str("</article>\n")
    }
}

pub struct PostList<'a> {
    pub page: &'a Page<Post>,
    pub show_group_links: bool,
}

impl Display for PostList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.page.is_empty() {
            f.write_str("<p>No posts yet.</p>\n")?;
        }

        for (i, post) in self.page.items.iter().enumerate() {
            if i > 0 {
                f.write_str("<hr>\n")?;
            }
            write!(
                f,
                "{}",
                PostCard {
                    post,
                    show_group_link: self.show_group_links,
                    show_detail_link: true,
                }
            )?;
        }

        write!(f, "{}", Paginator(self.page))
    }
}

pub struct Paginator<'a, T>(pub &'a Page<T>);

impl<T> Display for Paginator<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let page = self.0;
        if page.num_pages <= 1 {
            return Ok(());
        }

        f.write_str("<nav class=\"pagination\">")?;
        if let Some(previous) = page.previous_number() {
            write!(
                f,
                r#"<a href="?page=1">&laquo; first</a> <a href="?page={previous}">previous</a> "#
            )?;
        }
        write!(f, "<span>Page {} of {}</span>", page.number, page.num_pages)?;
        if let Some(next) = page.next_number() {
            write!(
                f,
                r#" <a href="?page={next}">next</a> <a href="?page={}">last &raquo;</a>"#,
                page.num_pages
            )?;
        }
        f.write_str("</nav>\n")
    }
}

pub struct FieldError<'a>(pub Option<&'a str>);

impl Display for FieldError<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(message) => write!(f, "<p class=\"error\">{}</p>", Escaped(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::views::{Escaped, Multiline, Paginator};
    use quill_common::page::PageRequest;

    #[test]
    fn escaping() {
        assert_eq!(
            Escaped("<script>alert('x') & \"y\"</script>").to_string(),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(Escaped(42).to_string(), "42");
        assert_eq!(Multiline("a<b\nc").to_string(), "a&lt;b<br>c");
    }

    #[test]
    fn paginator_links() {
        let single = PageRequest::FIRST.window(3, 10).into_page(vec![1, 2, 3]);
        assert_eq!(Paginator(&single).to_string(), "");

        let middle = PageRequest::parse(Some("2"))
            .window(25, 10)
            .into_page(vec![0; 10]);
        let rendered = Paginator(&middle).to_string();
        assert!(rendered.contains("?page=1"));
        assert!(rendered.contains("?page=3"));
        assert!(rendered.contains("Page 2 of 3"));
    }
}
