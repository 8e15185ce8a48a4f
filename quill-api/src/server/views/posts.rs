use crate::server::{
    context::PageContext,
    form::FieldErrors,
    routes::{
        posts::{AddCommentPath, CreatePostPath, EditPostPath},
        profiles::{FollowAuthorPath, ProfilePath, UnfollowAuthorPath},
    },
    views::{
        CsrfField, Escaped, FieldError, Multiline, PostCard, PostList, Timestamp, render,
    },
};
use quill_common::{
    model::{
        Id,
        comment::Comment,
        group::Group,
        post::{Post, PostMarker},
        user::User,
    },
    page::Page,
};
use std::fmt::{self, Display, Formatter};

#[must_use]
pub fn index(context: &PageContext, page: &Page<Post>) -> String {
    let body = format!(
        "<h1>Latest updates</h1>\n{}",
        PostList {
            page,
            show_group_links: true,
        }
    );

    render("Latest updates", Some(context), body)
}

#[must_use]
pub fn group(context: &PageContext, group: &Group, page: &Page<Post>) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n{}",
        Escaped(&group.title),
        Multiline(&group.description),
        PostList {
            page,
            show_group_links: false,
        }
    );

    render(&format!("Group posts {}", group.title), Some(context), body)
}

#[must_use]
pub fn feed(context: &PageContext, page: &Page<Post>) -> String {
    let body = format!(
        "<h1>Posts by followed authors</h1>\n{}",
        PostList {
            page,
            show_group_links: true,
        }
    );

    render("Followed authors", Some(context), body)
}

pub struct ProfileView<'a> {
    pub author: &'a User,
    pub post_count: u64,
    /// `None` when the viewer is anonymous or looking at their own profile.
    pub following: Option<bool>,
    pub page: &'a Page<Post>,
}

#[must_use]
pub fn profile(context: &PageContext, view: &ProfileView<'_>) -> String {
    let author = view.author;
    let mut body = format!(
        "<h1>All posts of {}</h1>\n<h3>Posts: {}</h3>\n",
        Escaped(&author.username),
        view.post_count,
    );

    if let Some(following) = view.following {
        let (action, label) = if following {
            (
                UnfollowAuthorPath {
                    username: author.username.clone(),
                }
                .to_string(),
                "Unfollow",
            )
        } else {
            (
                FollowAuthorPath {
                    username: author.username.clone(),
                }
                .to_string(),
                "Follow",
            )
        };
        body.push_str(&format!(
            "<form method=\"post\" action=\"{}\">{}<button type=\"submit\">{label}</button></form>\n",
            Escaped(action),
            CsrfField(&context.csrf),
        ));
    }

    body.push_str(
        &PostList {
            page: view.page,
            show_group_links: true,
        }
        .to_string(),
    );

    render(
        &format!("Profile of {}", author.username),
        Some(context),
        body,
    )
}

pub struct PostDetailView<'a> {
    pub post: &'a Post,
    pub author_post_count: u64,
    pub comments: &'a [Comment],
}

#[must_use]
pub fn detail(context: &PageContext, view: &PostDetailView<'_>) -> String {
    let post = view.post;
    let mut body = format!(
        "{}<p>Posts by this author: {}</p>\n<p><a href=\"{}\">All posts of the author</a></p>\n",
        PostCard {
            post,
            show_group_link: true,
            show_detail_link: false,
        },
        view.author_post_count,
        Escaped(ProfilePath {
            username: post.author.username.clone(),
        }),
    );

    if context
        .viewer_user()
        .is_some_and(|viewer| viewer.id == post.author.id)
    {
        body.push_str(&format!(
            "<p><a href=\"{}\">Edit post</a></p>\n",
            EditPostPath { id: post.id }
        ));
    }

    if context.viewer.is_some() {
        body.push_str(&format!(
            "<h5>Add a comment:</h5>\n<form method=\"post\" action=\"{}\">{}\
             <textarea name=\"text\" required></textarea>\
             <button type=\"submit\">Send</button></form>\n",
            AddCommentPath { id: post.id },
            CsrfField(&context.csrf),
        ));
    }

    for comment in view.comments {
        body.push_str(&format!(
            "<div class=\"comment\"><h5><a href=\"{}\">{}</a> <small>{}</small></h5><p>{}</p></div>\n",
            Escaped(ProfilePath {
                username: comment.author.username.clone(),
            }),
            Escaped(&comment.author.username),
            Timestamp(comment.created_at),
            Multiline(&comment.text),
        ));
    }

    render(&format!("Post {}", post.label()), Some(context), body)
}

pub struct PostFormView<'a> {
    pub editing: Option<Id<PostMarker>>,
    pub text: &'a str,
    pub group: &'a str,
    pub groups: &'a [Group],
    pub errors: &'a FieldErrors,
}

struct PostFormBody<'a> {
    context: &'a PageContext,
    view: &'a PostFormView<'a>,
}

impl Display for PostFormBody<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let view = self.view;
        let (heading, action, button) = match view.editing {
            Some(id) => ("Edit post", EditPostPath { id }.to_string(), "Save"),
            None => ("New post", CreatePostPath().to_string(), "Add"),
        };

        writeln!(
            f,
            "<h1>{heading}</h1>\n<form method=\"post\" action=\"{}\" enctype=\"multipart/form-data\">{}",
            Escaped(action),
            CsrfField(&self.context.csrf),
        )?;
        writeln!(
            f,
            "<label for=\"id_text\">Text</label>\n<textarea name=\"text\" id=\"id_text\" required>{}</textarea>{}",
            Escaped(view.text),
            FieldError(view.errors.get("text")),
        )?;

        f.write_str("<label for=\"id_group\">Group</label>\n<select name=\"group\" id=\"id_group\">\n<option value=\"\">---------</option>\n")?;
        for group in view.groups {
            let selected = if group.id.to_string() == view.group.trim() {
                " selected"
            } else {
                ""
            };
            writeln!(
                f,
                "<option value=\"{}\"{selected}>{}</option>",
                group.id,
                Escaped(&group.title)
            )?;
        }
        writeln!(f, "</select>{}", FieldError(view.errors.get("group")))?;

        writeln!(
            f,
            "<label for=\"id_image\">Image</label>\n<input type=\"file\" name=\"image\" id=\"id_image\" accept=\"image/*\">{}",
            FieldError(view.errors.get("image")),
        )?;
        writeln!(f, "<button type=\"submit\">{button}</button>\n</form>")
    }
}

#[must_use]
pub fn post_form(context: &PageContext, view: &PostFormView<'_>) -> String {
    let title = if view.editing.is_some() {
        "Edit post"
    } else {
        "New post"
    };

    render(title, Some(context), PostFormBody { context, view })
}
