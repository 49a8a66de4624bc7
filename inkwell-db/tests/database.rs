//! End-to-end checks against a real database. Run with
//! `DATABASE_URL=postgres://... cargo test -p inkwell-db -- --ignored`.

use inkwell_common::{
    model::{
        Id,
        comment::{CommentMarker, CreateComment, build_threads, resolve_parent},
        post::{CreatePost, DraftSave, PostFilter},
        reaction::ReactionKind,
        text::{CommentContent, PostTitle},
        user::{CreateUser, Email, User, Username},
    },
    password::PasswordHash,
    snowflake::{ProcessId, WorkerId},
};
use inkwell_db::client::{DbClient, DbError};
use sqlx::PgPool;

fn client(pool: PgPool) -> DbClient {
    DbClient::new(pool, WorkerId::new(0).unwrap(), ProcessId::new(0).unwrap())
}

async fn user(client: &DbClient, name: &str) -> User {
    client
        .create_user(&CreateUser {
            username: Username::new(name).unwrap(),
            email: Email::new(&format!("{name}@example.com")).unwrap(),
            password_hash: PasswordHash::generate("correct horse battery").unwrap(),
        })
        .await
        .unwrap()
}

fn new_post(author: &User, title: &str) -> CreatePost {
    CreatePost {
        title: PostTitle::new(title).unwrap(),
        content: "Body".to_owned(),
        author: author.id,
        category: None,
        series: None,
        series_order: None,
        tags: Vec::new(),
        thumbnail: None,
        published: true,
        is_draft: false,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_usernames_are_rejected(pool: PgPool) {
    let client = client(pool);
    user(&client, "ada").await;

    let result = client
        .create_user(&CreateUser {
            username: Username::new("ada").unwrap(),
            email: Email::new("other@example.com").unwrap(),
            password_hash: PasswordHash::generate("correct horse battery").unwrap(),
        })
        .await;
    assert!(matches!(result, Err(DbError::UniqueViolation(constraint)) if constraint == "users_username_key"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn follow_toggles_one_edge(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;

    let status = client.toggle_follow(ada.id, bob.id).await.unwrap();
    assert!(status.following);
    assert_eq!(status.followers_count, 1);

    let notifications = client
        .list_notifications(bob.id, Default::default())
        .await
        .unwrap();
    assert_eq!(notifications.unread_count, 1);

    let status = client.toggle_follow(ada.id, bob.id).await.unwrap();
    assert!(!status.following);
    assert_eq!(status.followers_count, 0);

    assert!(client.toggle_follow(ada.id, ada.id).await.is_err());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_follow_rows_are_rejected(pool: PgPool) {
    let client = client(pool.clone());
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;
    assert!(client.toggle_follow(ada.id, bob.id).await.unwrap().following);

    let duplicate = sqlx::query("INSERT INTO users.follows (follower_snowflake, following_snowflake) VALUES ($1, $2)")
        .bind(ada.id.to_db())
        .bind(bob.id.to_db())
        .execute(&pool)
        .await
        .map_err(DbError::from);
    assert!(matches!(duplicate, Err(DbError::UniqueViolation(constraint)) if constraint == "follows_pkey"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn replies_must_stay_on_the_parent_post(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let first = client.create_post(&new_post(&ada, "First")).await.unwrap();
    let second = client.create_post(&new_post(&ada, "Second")).await.unwrap();

    let root = client
        .create_comment(
            &CreateComment {
                post: first.id,
                author: ada.id,
                parent: None,
                content: CommentContent::new("On the first post").unwrap(),
            },
            ada.id,
            None,
        )
        .await
        .unwrap();

    let stray = client
        .create_comment(
            &CreateComment {
                post: second.id,
                author: ada.id,
                parent: Some(root.id),
                content: CommentContent::new("Wrong post").unwrap(),
            },
            ada.id,
            Some(ada.id),
        )
        .await;
    assert!(matches!(
        stray,
        Err(DbError::ForeignKeyViolation(constraint)) if constraint == "comments_parent_same_post_fkey"
    ));
    assert!(client.post_comments(second.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn replies_to_replies_join_the_thread_root(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;
    let post = client.create_post(&new_post(&ada, "Threads")).await.unwrap();

    let comment = |parent: Option<Id<CommentMarker>>, content: &'static str| CreateComment {
        post: post.id,
        author: bob.id,
        parent,
        content: CommentContent::new(content).unwrap(),
    };
    let root = client
        .create_comment(&comment(None, "Root"), ada.id, None)
        .await
        .unwrap();
    let reply = client
        .create_comment(&comment(Some(root.id), "Reply"), ada.id, Some(bob.id))
        .await
        .unwrap();

    let nested = client
        .create_comment(&comment(Some(resolve_parent(&reply)), "Reply to the reply"), ada.id, Some(bob.id))
        .await
        .unwrap();
    assert_eq!(nested.parent, Some(root.id));

    let threads = build_threads(client.post_comments(post.id).await.unwrap());
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].comment.id, root.id);
    assert_eq!(threads[0].replies.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn bookmarks_are_unique_per_user_and_post(pool: PgPool) {
    let client = client(pool.clone());
    let ada = user(&client, "ada").await;
    let post = client.create_post(&new_post(&ada, "Saved")).await.unwrap();

    assert!(client.toggle_bookmark(ada.id, post.id).await.unwrap());

    let duplicate = sqlx::query("INSERT INTO blog.bookmarks (user_snowflake, post_snowflake) VALUES ($1, $2)")
        .bind(ada.id.to_db())
        .bind(post.id.to_db())
        .execute(&pool)
        .await
        .map_err(DbError::from);
    assert!(matches!(duplicate, Err(DbError::UniqueViolation(constraint)) if constraint == "bookmarks_pkey"));

    assert!(!client.toggle_bookmark(ada.id, post.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn like_then_dislike_keeps_one_reaction(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;
    let post = client.create_post(&new_post(&ada, "Liked")).await.unwrap();

    let liked = client
        .toggle_post_reaction(&post, bob.id, ReactionKind::Like)
        .await
        .unwrap();
    assert_eq!(liked.liked, Some(true));
    assert_eq!(liked.counts.likes_count, 1);

    let disliked = client
        .toggle_post_reaction(&post, bob.id, ReactionKind::Dislike)
        .await
        .unwrap();
    assert_eq!(disliked.disliked, Some(true));
    assert_eq!(disliked.counts.likes_count, 0);
    assert_eq!(disliked.counts.dislikes_count, 1);

    let cleared = client
        .toggle_post_reaction(&post, bob.id, ReactionKind::Dislike)
        .await
        .unwrap();
    assert_eq!(cleared.disliked, Some(false));
    assert_eq!(cleared.counts.dislikes_count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn soft_deleted_comment_keeps_replies_visible(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;
    let post = client.create_post(&new_post(&ada, "Discussed")).await.unwrap();

    let root = client
        .create_comment(
            &CreateComment {
                post: post.id,
                author: bob.id,
                parent: None,
                content: CommentContent::new("First").unwrap(),
            },
            ada.id,
            None,
        )
        .await
        .unwrap();
    client
        .create_comment(
            &CreateComment {
                post: post.id,
                author: ada.id,
                parent: Some(root.id),
                content: CommentContent::new("Reply").unwrap(),
            },
            ada.id,
            Some(bob.id),
        )
        .await
        .unwrap();

    assert!(client.soft_delete_comment(root.id).await.unwrap());

    let listed = client
        .list_comments(&Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(listed.count, 1);

    let threads = build_threads(client.post_comments(post.id).await.unwrap());
    assert_eq!(threads.len(), 1);
    assert!(!threads[0].comment.is_active);
    assert_eq!(threads[0].replies.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn colliding_titles_get_distinct_slugs(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;

    let first = client.create_post(&new_post(&ada, "Same Title")).await.unwrap();
    let second = client.create_post(&new_post(&ada, "Same Title")).await.unwrap();
    let third = client.create_post(&new_post(&ada, "Same Title")).await.unwrap();

    assert_eq!(first.slug, "same-title");
    assert!(second.slug.starts_with("same-title-"));
    assert_ne!(second.slug, third.slug);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn autosave_creates_then_updates(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;

    let created = client
        .save_draft(&DraftSave {
            id: None,
            author: ada.id,
            title: PostTitle::new("Notes").unwrap(),
            content: "v1".to_owned(),
            category: None,
        })
        .await
        .unwrap()
        .unwrap();
    assert!(created.created);

    let updated = client
        .save_draft(&DraftSave {
            id: Some(created.id),
            author: ada.id,
            title: PostTitle::new("Notes").unwrap(),
            content: "v2".to_owned(),
            category: None,
        })
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.created);
    assert_eq!(updated.id, created.id);

    let post = client.fetch_post(created.id).await.unwrap().unwrap();
    assert_eq!(post.content, "v2");
    assert!(post.is_draft);

    let public = client
        .list_posts(&PostFilter::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(public.count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn autosave_skips_posts_of_other_authors(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    let bob = user(&client, "bob").await;
    let post = client.create_post(&new_post(&ada, "Mine")).await.unwrap();

    let saved = client
        .save_draft(&DraftSave {
            id: Some(post.id),
            author: bob.id,
            title: PostTitle::new("Hijacked").unwrap(),
            content: "Not yours".to_owned(),
            category: None,
        })
        .await
        .unwrap();
    assert!(saved.is_none());

    let post = client.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(post.title.get(), "Mine");
    assert_eq!(post.content, "Body");
    assert!(post.draft_saved_at.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn profile_counts_every_post_of_the_author(pool: PgPool) {
    let client = client(pool);
    let ada = user(&client, "ada").await;
    client.create_post(&new_post(&ada, "Public")).await.unwrap();
    client
        .create_post(&CreatePost {
            published: false,
            ..new_post(&ada, "Hidden")
        })
        .await
        .unwrap();
    client
        .save_draft(&DraftSave {
            id: None,
            author: ada.id,
            title: PostTitle::new("Sketch").unwrap(),
            content: String::new(),
            category: None,
        })
        .await
        .unwrap()
        .unwrap();

    let profile = client.fetch_profile("ada").await.unwrap().unwrap();
    assert_eq!(profile.post_count, 3);
    assert_eq!(profile.followers_count, 0);
}
