use crate::store::{DbError, Result, Store};
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
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap},
};
use time::UtcDateTime;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct UserRow {
    user: User,
    password_hash: PasswordHash,
}

#[derive(Clone, Debug)]
struct PostRow {
    text: String,
    created_at: UtcDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<String>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: String,
    created_at: UtcDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<Id<UserMarker>, UserRow>,
    sessions: HashMap<AuthTokenHash, Authentication>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
    follows: BTreeSet<(Id<UserMarker>, Id<UserMarker>)>,
}

impl Tables {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::new(self.last_id)
    }

    fn hydrate_post(&self, post_id: Id<PostMarker>, row: &PostRow) -> Option<Post> {
        let author = self.users.get(&row.author)?.user.clone();
        let group = row.group.and_then(|group_id| self.groups.get(&group_id).cloned());

        Some(Post {
            id: post_id,
            text: row.text.clone(),
            created_at: row.created_at,
            author,
            group,
            image: row.image.clone(),
        })
    }

    fn post_page(&self, page: PageRequest, filter: impl Fn(&PostRow) -> bool) -> Page<Post> {
        let mut matching: Vec<_> = self.posts.iter().filter(|(_, row)| filter(row)).collect();
        matching.sort_by_key(|(post_id, row)| Reverse((row.created_at, **post_id)));

        let window = page.window(matching.len() as u64, POSTS_PER_PAGE);
        let skip = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(window.limit).unwrap_or(usize::MAX);

        let posts = matching
            .into_iter()
            .skip(skip)
            .take(take)
            .filter_map(|(post_id, row)| self.hydrate_post(*post_id, row))
            .collect();
        window.into_page(posts)
    }

    fn remove_post(&mut self, post_id: Id<PostMarker>) -> bool {
        self.comments.retain(|_, comment| comment.post != post_id);
        self.posts.remove(&post_id).is_some()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|row| row.user.username == user.username)
        {
            return Err(DbError::UsernameTaken(user.username.clone()));
        }

        let created = User {
            id: tables.next_id(),
            username: user.username.clone(),
            email: user.email.clone(),
        };
        tables.users.insert(
            created.id,
            UserRow {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(|row| row.user.clone()))
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|row| &row.user.username == username)
            .map(|row| row.user.clone()))
    }

    async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, PasswordHash)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|row| &row.user.username == username)
            .map(|row| (row.user.clone(), row.password_hash.clone())))
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let authored: Vec<_> = tables
            .posts
            .iter()
            .filter(|(_, row)| row.author == user_id)
            .map(|(post_id, _)| *post_id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|_, comment| comment.author != user_id);
        tables
            .follows
            .retain(|(user, author)| *user != user_id && *author != user_id);
        tables
            .sessions
            .retain(|_, authentication| authentication.user != user_id);

        Ok(true)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&authentication.user) {
            return Err(DbError::MissingReference("user"));
        }

        tables
            .sessions
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(token_hash).cloned())
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.remove(token_hash);
        Ok(())
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut tables = self.tables.write().await;
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::SlugTaken(group.slug.clone()));
        }

        let created = Group {
            id: tables.next_id(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(created.id, created.clone());

        Ok(created)
    }

    async fn fetch_group_by_slug(&self, slug: &Slug) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables
            .groups
            .values()
            .find(|group| &group.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<_> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

        Ok(groups)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.groups.remove(&group_id).is_none() {
            return Ok(false);
        }

        for post in tables.posts.values_mut() {
            if post.group == Some(group_id) {
                post.group = None;
            }
        }

        Ok(true)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&post.author) {
            return Err(DbError::MissingReference("author"));
        }
        if let Some(group_id) = post.group
            && !tables.groups.contains_key(&group_id)
        {
            return Err(DbError::MissingReference("group"));
        }

        let post_id = tables.next_id();
        tables.posts.insert(
            post_id,
            PostRow {
                text: post.text.to_string(),
                created_at: UtcDateTime::now(),
                author: post.author,
                group: post.group,
                image: post.image.clone(),
            },
        );

        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, changes: &UpdatePost) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if let Some(group_id) = changes.group
            && !tables.groups.contains_key(&group_id)
        {
            return Err(DbError::MissingReference("group"));
        }

        let Some(post) = tables.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        post.text = changes.text.to_string();
        post.group = changes.group;
        if let Some(image) = &changes.image {
            post.image = Some(image.clone());
        }

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_post(post_id))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .get(&post_id)
            .and_then(|row| tables.hydrate_post(post_id, row)))
    }

    async fn count_posts(&self) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.posts.len() as u64)
    }

    async fn count_author_posts(&self, author_id: Id<UserMarker>) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|row| row.author == author_id)
            .count() as u64)
    }

    async fn list_posts(&self, page: PageRequest) -> Result<Page<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.post_page(page, |_| true))
    }

    async fn list_group_posts(
        &self,
        group_id: Id<GroupMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.post_page(page, |row| row.group == Some(group_id)))
    }

    async fn list_author_posts(
        &self,
        author_id: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.post_page(page, |row| row.author == author_id))
    }

    async fn list_feed(&self, user_id: Id<UserMarker>, page: PageRequest) -> Result<Page<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.post_page(page, |row| tables.follows.contains(&(user_id, row.author))))
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post) {
            return Err(DbError::MissingReference("post"));
        }
        if !tables.users.contains_key(&comment.author) {
            return Err(DbError::MissingReference("author"));
        }

        let comment_id = tables.next_id();
        tables.comments.insert(
            comment_id,
            CommentRow {
                post: comment.post,
                author: comment.author,
                text: comment.text.to_string(),
                created_at: UtcDateTime::now(),
            },
        );

        Ok(comment_id)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        let comments = tables
            .comments
            .iter()
            .filter(|(_, row)| row.post == post_id)
            .filter_map(|(comment_id, row)| {
                let author = tables.users.get(&row.author)?.user.clone();
                Some(Comment {
                    id: *comment_id,
                    post: row.post,
                    author,
                    text: row.text.clone(),
                    created_at: row.created_at,
                })
            })
            .collect();

        Ok(comments)
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let (user, author) = (follow.user(), follow.author());
        if !tables.users.contains_key(&user) || !tables.users.contains_key(&author) {
            return Err(DbError::MissingReference("user"));
        }

        Ok(tables.follows.insert((user, author)))
    }

    async fn unfollow(&self, user_id: Id<UserMarker>, author_id: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.follows.remove(&(user_id, author_id)))
    }

    async fn is_following(
        &self,
        user_id: Id<UserMarker>,
        author_id: Id<UserMarker>,
    ) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.follows.contains(&(user_id, author_id)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::MemoryStore,
        store::{DbError, Store},
    };
    use quill_common::{
        model::{
            Id,
            auth::{AuthToken, Authentication, PasswordHash},
            comment::CreateComment,
            follow::Follow,
            group::{CreateGroup, Group, Slug},
            post::{CreatePost, PostMarker, UpdatePost},
            user::{CreateUser, User, Username},
        },
        page::PageRequest,
        util::NonBlankText,
    };
    use time::UtcDateTime;

    async fn user(store: &MemoryStore, username: &str) -> User {
        store
            .create_user(&CreateUser {
                username: Username::new(username.to_owned()).unwrap(),
                email: format!("{username}@example.com"),
                password_hash: PasswordHash::from_stored("$argon2id$stub".to_owned()),
            })
            .await
            .unwrap()
    }

    async fn group(store: &MemoryStore, slug: &str) -> Group {
        store
            .create_group(&CreateGroup {
                title: format!("Group {slug}"),
                slug: Slug::new(slug.to_owned()).unwrap(),
                description: "A test group".to_owned(),
            })
            .await
            .unwrap()
    }

    async fn post(
        store: &MemoryStore,
        author: &User,
        text: &str,
        group: Option<&Group>,
    ) -> Id<PostMarker> {
        store
            .create_post(&CreatePost {
                author: author.id,
                text: NonBlankText::new(text).unwrap(),
                group: group.map(|group| group.id),
                image: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn usernames_and_slugs_are_unique() {
        let store = MemoryStore::new();
        user(&store, "leo").await;
        group(&store, "cats").await;

        let duplicate_user = store
            .create_user(&CreateUser {
                username: Username::new("leo".to_owned()).unwrap(),
                email: "other@example.com".to_owned(),
                password_hash: PasswordHash::from_stored(String::new()),
            })
            .await;
        assert!(matches!(duplicate_user, Err(DbError::UsernameTaken(_))));

        let duplicate_group = store
            .create_group(&CreateGroup {
                title: "More cats".to_owned(),
                slug: Slug::new("cats".to_owned()).unwrap(),
                description: String::new(),
            })
            .await;
        assert!(matches!(duplicate_group, Err(DbError::SlugTaken(_))));
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_paginated() {
        let store = MemoryStore::new();
        let author = user(&store, "leo").await;
        for i in 0..13 {
            post(&store, &author, &format!("post {i}"), None).await;
        }

        let first = store.list_posts(PageRequest::FIRST).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.total, 13);
        assert_eq!(first.items[0].text, "post 12");
        assert_eq!(first.items[9].text, "post 3");

        let second = store.list_posts(PageRequest::parse(Some("2"))).await.unwrap();
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.items[2].text, "post 0");

        let clamped = store.list_posts(PageRequest::parse(Some("40"))).await.unwrap();
        assert_eq!(clamped.number, 2);
        assert_eq!(clamped.items, second.items);
    }

    #[tokio::test]
    async fn group_and_author_listings_filter() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let ann = user(&store, "ann").await;
        let cats = group(&store, "cats").await;

        let in_group = post(&store, &leo, "in group", Some(&cats)).await;
        post(&store, &leo, "no group", None).await;
        post(&store, &ann, "by ann", Some(&cats)).await;

        let group_page = store
            .list_group_posts(cats.id, PageRequest::FIRST)
            .await
            .unwrap();
        assert_eq!(group_page.total, 2);
        assert!(group_page.items.iter().any(|post| post.id == in_group));
        assert!(group_page.items.iter().all(|post| post.group.as_ref() == Some(&cats)));

        let leo_page = store
            .list_author_posts(leo.id, PageRequest::FIRST)
            .await
            .unwrap();
        assert_eq!(leo_page.total, 2);
        assert!(leo_page.items.iter().all(|post| post.author == leo));
        assert_eq!(store.count_author_posts(ann.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_a_group_keeps_its_posts() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let cats = group(&store, "cats").await;
        let post_id = post(&store, &leo, "about cats", Some(&cats)).await;

        assert!(store.delete_group(cats.id).await.unwrap());

        let post = store.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.group, None);
        assert_eq!(store.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_an_author_cascades() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let ann = user(&store, "ann").await;
        let leos_post = post(&store, &leo, "by leo", None).await;
        let anns_post = post(&store, &ann, "by ann", None).await;
        for (post_id, author) in [(leos_post, &ann), (anns_post, &leo)] {
            store
                .create_comment(&CreateComment {
                    post: post_id,
                    author: author.id,
                    text: NonBlankText::new("nice").unwrap(),
                })
                .await
                .unwrap();
        }
        store
            .follow(Follow::new(ann.id, leo.id).unwrap())
            .await
            .unwrap();
        let token = AuthToken::generate_random(leo.id);
        store
            .create_auth(&Authentication {
                user: leo.id,
                token_hash: token.hash().unwrap(),
                created_at: UtcDateTime::now(),
                expires_after: None,
            })
            .await
            .unwrap();

        assert!(store.delete_user(leo.id).await.unwrap());

        assert_eq!(store.fetch_post(leos_post).await.unwrap(), None);
        assert!(store.list_comments(leos_post).await.unwrap().is_empty());
        assert!(store.list_comments(anns_post).await.unwrap().is_empty());
        assert!(!store.is_following(ann.id, leo.id).await.unwrap());
        assert_eq!(store.fetch_auth(&token.hash().unwrap()).await.unwrap(), None);
        assert_eq!(store.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn updates_keep_the_image_unless_replaced() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let post_id = store
            .create_post(&CreatePost {
                author: leo.id,
                text: NonBlankText::new("with image").unwrap(),
                group: None,
                image: Some("posts/a.png".to_owned()),
            })
            .await
            .unwrap();

        let mut changes = UpdatePost {
            text: NonBlankText::new("edited").unwrap(),
            group: None,
            image: None,
        };
        assert!(store.update_post(post_id, &changes).await.unwrap());
        let post = store.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.text, "edited");
        assert_eq!(post.image.as_deref(), Some("posts/a.png"));

        changes.image = Some("posts/b.png".to_owned());
        store.update_post(post_id, &changes).await.unwrap();
        let post = store.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.image.as_deref(), Some("posts/b.png"));

        assert!(!store.update_post(Id::new(9999), &changes).await.unwrap());
    }

    #[tokio::test]
    async fn feed_follows_and_unfollows() {
        let store = MemoryStore::new();
        let reader = user(&store, "reader").await;
        let writer = user(&store, "writer").await;
        let stranger = user(&store, "stranger").await;
        let post_id = post(&store, &writer, "for my followers", None).await;
        post(&store, &stranger, "unseen", None).await;

        let empty = store.list_feed(reader.id, PageRequest::FIRST).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.num_pages, 1);

        let follow = Follow::new(reader.id, writer.id).unwrap();
        assert!(store.follow(follow).await.unwrap());
        assert!(!store.follow(follow).await.unwrap());
        assert!(store.is_following(reader.id, writer.id).await.unwrap());

        let feed = store.list_feed(reader.id, PageRequest::FIRST).await.unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].id, post_id);

        assert!(store.unfollow(reader.id, writer.id).await.unwrap());
        assert!(!store.unfollow(reader.id, writer.id).await.unwrap());
        assert!(
            store
                .list_feed(reader.id, PageRequest::FIRST)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn comments_are_listed_oldest_first() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let post_id = post(&store, &leo, "discuss", None).await;
        for text in ["first", "second"] {
            store
                .create_comment(&CreateComment {
                    post: post_id,
                    author: leo.id,
                    text: NonBlankText::new(text).unwrap(),
                })
                .await
                .unwrap();
        }

        let comments = store.list_comments(post_id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|comment| comment.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);

        let missing_post = store
            .create_comment(&CreateComment {
                post: Id::new(404),
                author: leo.id,
                text: NonBlankText::new("lost").unwrap(),
            })
            .await;
        assert!(matches!(missing_post, Err(DbError::MissingReference(_))));
    }
}
