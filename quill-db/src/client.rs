use crate::{
    record::{
        AuthenticationRecord, CommentRecord, CredentialsRecord, GroupRecord, PostRecord,
        UserRecord, to_primitive,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use quill_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CommentMarker, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, Slug},
        post::{CreatePost, Post, PostMarker, UpdatePost},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{POSTS_PER_PAGE, Page, PageRequest},
};
use sqlx::{
    PgPool, Postgres, QueryBuilder, migrate::Migrator, postgres::PgPoolOptions, query, query_as,
    query_scalar,
};
use tracing::debug;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const POST_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.created_at,
        posts.image,
        users.user_id,
        users.username,
        users.email,
        groups.group_id,
        groups.title AS group_title,
        groups.slug AS group_slug,
        groups.description AS group_description
    FROM
        posts
        JOIN users ON users.user_id = posts.author_id
        LEFT JOIN groups ON groups.group_id = posts.group_id
";

const FOLLOWED_AUTHORS_CONDITION: &str = "
    WHERE posts.author_id IN (
        SELECT follows.author_id
        FROM follows
        WHERE follows.user_id = ";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    FollowedBy(Id<UserMarker>),
}

impl PostFilter {
    fn push_condition(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                builder
                    .push(" WHERE posts.group_id = ")
                    .push_bind(group_id.get());
            }
            PostFilter::Author(author_id) => {
                builder
                    .push(" WHERE posts.author_id = ")
                    .push_bind(author_id.get());
            }
            PostFilter::FollowedBy(user_id) => {
                builder
                    .push(FOLLOWED_AUTHORS_CONDITION)
                    .push_bind(user_id.get())
                    .push(")");
            }
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        debug!("Database migrations applied");

        Ok(())
    }

    async fn fetch_post_page(&self, filter: PostFilter, page: PageRequest) -> Result<Page<Post>> {
        let mut transaction = self.pool.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM posts");
        filter.push_condition(&mut count_query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *transaction)
            .await?;

        let window = page.window(total.cast_unsigned(), POSTS_PER_PAGE);

        let mut select_query = QueryBuilder::new(POST_SELECT);
        filter.push_condition(&mut select_query);
        select_query
            .push(" ORDER BY posts.created_at DESC, posts.post_id DESC LIMIT ")
            .push_bind(window.limit.cast_signed())
            .push(" OFFSET ")
            .push_bind(window.offset.cast_signed());
        let records: Vec<PostRecord> = select_query
            .build_query_as()
            .fetch_all(&mut *transaction)
            .await?;

        transaction.commit().await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(window.into_page(posts))
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING user_id, username, email
            ",
        )
        .bind(user.username.get())
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::UsernameTaken(user.username.clone())
            } else {
                err.into()
            }
        })?;

        Ok(User::try_from(record)?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_id, username, email
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_id, username, email
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, PasswordHash)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT user_id, username, email, password_hash
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record
            .map(<(User, PasswordHash)>::try_from)
            .transpose()?;
        Ok(credentials)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO sessions (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.get())
        .bind(to_primitive(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|duration| duration.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<()> {
        query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING group_id, title, slug, description
            ",
        )
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::SlugTaken(group.slug.clone())
            } else {
                err.into()
            }
        })?;

        Ok(Group::try_from(record)?)
    }

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM groups
            ORDER BY title, group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let result = query("DELETE FROM groups WHERE group_id = $1")
            .bind(group_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id
            ",
        )
        .bind(&*post.text)
        .bind(post.author.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("author or group")
            } else {
                err.into()
            }
        })?;

        Ok(post_id.into())
    }

    async fn update_post(&self, post_id: Id<PostMarker>, changes: &UpdatePost) -> Result<bool> {
        let result = query(
            "
            UPDATE posts
            SET text = $2, group_id = $3, image = COALESCE($4, image)
            WHERE post_id = $1
            ",
        )
        .bind(post_id.get())
        .bind(&*changes.text)
        .bind(changes.group.map(Id::get))
        .bind(changes.image.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("group")
            } else {
                err.into()
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut select_query = QueryBuilder::new(POST_SELECT);
        select_query
            .push(" WHERE posts.post_id = ")
            .push_bind(post_id.get());
        let record: Option<PostRecord> = select_query
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn count_posts(&self) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn count_author_posts(&self, author_id: Id<UserMarker>) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id.get())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn list_posts(&self, page: PageRequest) -> Result<Page<Post>> {
        self.fetch_post_page(PostFilter::All, page).await
    }

    async fn list_group_posts(
        &self,
        group_id: Id<GroupMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        self.fetch_post_page(PostFilter::Group(group_id), page).await
    }

    async fn list_author_posts(
        &self,
        author_id: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        self.fetch_post_page(PostFilter::Author(author_id), page)
            .await
    }

    async fn list_feed(&self, user_id: Id<UserMarker>, page: PageRequest) -> Result<Page<Post>> {
        self.fetch_post_page(PostFilter::FollowedBy(user_id), page)
            .await
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let comment_id: i64 = query_scalar(
            "
            INSERT INTO comments (post_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING comment_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(&*comment.text)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("post or author")
            } else {
                err.into()
            }
        })?;

        Ok(comment_id.into())
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created_at,
                users.user_id,
                users.username,
                users.email
            FROM
                comments JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.post_id = $1
            ORDER BY
                comments.created_at, comments.comment_id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follow.user().get())
        .bind(follow.author().get())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("user")
            } else {
                err.into()
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, user_id: Id<UserMarker>, author_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id.get())
            .bind(author_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(
        &self,
        user_id: Id<UserMarker>,
        author_id: Id<UserMarker>,
    ) -> Result<bool> {
        let exists: bool = query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id.get())
        .bind(author_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
