use async_trait::async_trait;
use quill_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CommentMarker, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, Slug},
        post::{CreatePost, Post, PostMarker, UpdatePost},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{Page, PageRequest},
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The username {0} is already taken")]
    UsernameTaken(Username),
    #[error("The group slug {0} is already taken")]
    SlugTaken(Slug),
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn fetch_credentials(&self, username: &Username)
    -> Result<Option<(User, PasswordHash)>>;

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<()>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>>;

    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Removes the group. Its posts stay, without a group.
    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool>;

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>>;

    async fn update_post(&self, post_id: Id<PostMarker>, changes: &UpdatePost) -> Result<bool>;

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn count_posts(&self) -> Result<u64>;

    async fn count_author_posts(&self, author_id: Id<UserMarker>) -> Result<u64>;

    async fn list_posts(&self, page: PageRequest) -> Result<Page<Post>>;

    async fn list_group_posts(
        &self,
        group_id: Id<GroupMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>>;

    async fn list_author_posts(
        &self,
        author_id: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>>;

    async fn list_feed(&self, user_id: Id<UserMarker>, page: PageRequest) -> Result<Page<Post>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>>;

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Get-or-create. Returns whether a new relationship was stored.
    async fn follow(&self, follow: Follow) -> Result<bool>;

    /// Returns whether a relationship existed. Removing a missing one is not an error.
    async fn unfollow(&self, user_id: Id<UserMarker>, author_id: Id<UserMarker>) -> Result<bool>;

    async fn is_following(
        &self,
        user_id: Id<UserMarker>,
        author_id: Id<UserMarker>,
    ) -> Result<bool>;
}
