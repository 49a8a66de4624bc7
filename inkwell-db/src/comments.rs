use crate::{
    client::{DbClient, DbError, Result},
    query::COMMENT_SELECT,
    reactions::ReactionTarget,
    record::CommentRecord,
};
use inkwell_common::model::{
    Id,
    comment::{Comment, CommentFilter, CommentMarker, CreateComment},
    notification::{NewNotification, NotificationKind},
    page::{Page, PageRequest},
    post::PostMarker,
    reaction::{ReactionKind, ReactionToggle},
    text::CommentContent,
    user::UserMarker,
};
use sqlx::{query, query_as, query_scalar};
use tracing::{debug, info};

const COMMENT_FILTER: &str = "
    comments.is_active
    AND ($1::BIGINT IS NULL OR comments.post_snowflake = $1)
    AND ($2::TEXT IS NULL OR authors.username = $2)
";

impl DbClient {
    pub async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE comments.comment_snowflake = $1");
        let record = query_as::<_, CommentRecord>(&sql)
            .bind(comment_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    /// Every comment of the post, soft-deleted ones included, oldest first.
    pub async fn post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "{COMMENT_SELECT} WHERE comments.post_snowflake = $1 ORDER BY comments.created_at, comments.comment_snowflake"
        );
        let records = query_as::<_, CommentRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    /// Active comments, newest first.
    pub async fn list_comments(
        &self,
        filter: &CommentFilter,
        page: PageRequest,
    ) -> Result<Page<Comment>> {
        let count_sql = format!(
            "
            SELECT count(*) FROM blog.comments
            JOIN users.users AS authors ON authors.user_snowflake = comments.author_snowflake
            WHERE {COMMENT_FILTER}
            "
        );
        let count: i64 = query_scalar(&count_sql)
            .bind(filter.post.map(Id::to_db))
            .bind(filter.author.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "
            {COMMENT_SELECT}
            WHERE {COMMENT_FILTER}
            ORDER BY comments.created_at DESC, comments.comment_snowflake DESC
            LIMIT $3 OFFSET $4
            "
        );
        let records = query_as::<_, CommentRecord>(&sql)
            .bind(filter.post.map(Id::to_db))
            .bind(filter.author.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(comments, count, page)?)
    }

    /// Stores the comment and notifies the post author and, for replies, the
    /// author of the parent comment.
    pub async fn create_comment(
        &self,
        comment: &CreateComment,
        post_author: Id<UserMarker>,
        parent_author: Option<Id<UserMarker>>,
    ) -> Result<Comment> {
        let comment_id = self.next_id::<CommentMarker>()?;
        let mut transaction = self.pool.begin().await?;

        query(
            "
            INSERT INTO blog.comments (comment_snowflake, post_snowflake, author_snowflake, parent_snowflake, content)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(comment_id.to_db())
        .bind(comment.post.to_db())
        .bind(comment.author.to_db())
        .bind(comment.parent.map(Id::to_db))
        .bind(comment.content.get())
        .execute(&mut *transaction)
        .await?;

        let post_notification =
            NewNotification::new(post_author, comment.author, NotificationKind::Comment);
        let reply_notification = parent_author
            .filter(|parent_author| *parent_author != post_author)
            .and_then(|parent_author| {
                NewNotification::new(parent_author, comment.author, NotificationKind::Reply)
            });
        for notification in [post_notification, reply_notification].into_iter().flatten() {
            let notification = notification
                .with_post(comment.post)
                .with_comment(comment_id);
            self.insert_notification(&mut *transaction, &notification)
                .await?;
        }

        transaction.commit().await?;

        info!(%comment_id, post = %comment.post, author = %comment.author, "Created comment");
        self.fetch_comment(comment_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    pub async fn update_comment(
        &self,
        comment_id: Id<CommentMarker>,
        content: &CommentContent,
    ) -> Result<Option<Comment>> {
        let updated = query(
            "UPDATE blog.comments SET content = $2, updated_at = now() WHERE comment_snowflake = $1",
        )
        .bind(comment_id.to_db())
        .bind(content.get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.fetch_comment(comment_id).await
    }

    /// Marks the comment inactive. Its replies stay untouched.
    pub async fn soft_delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let updated = query(
            "UPDATE blog.comments SET is_active = FALSE, updated_at = now() WHERE comment_snowflake = $1",
        )
        .bind(comment_id.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        debug!(%comment_id, "Soft-deleted comment");
        Ok(updated > 0)
    }

    pub async fn toggle_comment_reaction(
        &self,
        comment: &Comment,
        user: Id<UserMarker>,
        requested: ReactionKind,
    ) -> Result<ReactionToggle> {
        let on_like = NewNotification::new(comment.author.id, user, NotificationKind::CommentLike)
            .map(|notification| notification.with_post(comment.post).with_comment(comment.id));

        self.toggle_reaction(ReactionTarget::Comment(comment.id), user, requested, on_like)
            .await
    }
}
