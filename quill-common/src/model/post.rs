use crate::{
    model::{
        Id,
        group::{Group, GroupMarker},
        user::{User, UserMarker},
    },
    util::NonBlankText,
};
use time::UtcDateTime;

pub const POST_LABEL_LEN: usize = 15;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    pub created_at: UtcDateTime,
    pub author: User,
    pub group: Option<Group>,
    /// Path relative to the media root, e.g. `posts/3f9a.png`.
    pub image: Option<String>,
}

impl Post {
    #[must_use]
    pub fn label(&self) -> &str {
        match self.text.char_indices().nth(POST_LABEL_LEN) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: NonBlankText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

/// Replacement content for an existing post. `image: None` keeps the current image.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UpdatePost {
    pub text: NonBlankText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::Post, user::User};
    use time::UtcDateTime;

    fn post_with_text(text: &str) -> Post {
        Post {
            id: Id::new(1),
            text: text.to_owned(),
            created_at: UtcDateTime::UNIX_EPOCH,
            author: User::default(),
            group: None,
            image: None,
        }
    }

    #[test]
    fn labels() {
        assert_eq!(post_with_text("short").label(), "short");
        assert_eq!(
            post_with_text("exactly fifteen").label(),
            "exactly fifteen"
        );
        assert_eq!(
            post_with_text("Тестовый пост номер один").label(),
            "Тестовый пост н"
        );
    }
}
