use crate::{
    client::{DbClient, Result},
    record::{NotificationRecord, UserSummaryRecord},
};
use inkwell_common::model::{
    Id,
    notification::{
        FollowStatus, NewNotification, Notification, NotificationKind, NotificationList,
        NotificationMarker,
    },
    page::{Page, PageRequest},
    user::{UserMarker, UserSummary},
};
use sqlx::{PgConnection, query, query_as, query_scalar};
use tracing::debug;

const NOTIFICATION_SELECT: &str = "
    SELECT
        notifications.notification_snowflake,
        notifications.sender_snowflake,
        senders.username AS sender_username,
        senders.profile_image AS sender_profile_image,
        notifications.kind,
        notifications.post_snowflake,
        posts.slug AS post_slug,
        notifications.comment_snowflake,
        notifications.is_read,
        notifications.created_at
    FROM
        users.notifications
        JOIN users.users AS senders ON senders.user_snowflake = notifications.sender_snowflake
        LEFT JOIN blog.posts ON posts.post_snowflake = notifications.post_snowflake
    WHERE
        notifications.recipient_snowflake = $1
    ORDER BY notifications.created_at DESC, notifications.notification_snowflake DESC
    LIMIT $2 OFFSET $3
";

/// Which side of the follow edge a listing walks.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum FollowDirection {
    Followers,
    Following,
}

impl DbClient {
    pub(crate) async fn insert_notification(
        &self,
        connection: &mut PgConnection,
        notification: &NewNotification,
    ) -> Result<()> {
        let notification_id = self.next_id::<NotificationMarker>()?;

        query(
            "
            INSERT INTO users.notifications
                (notification_snowflake, recipient_snowflake, sender_snowflake, kind, post_snowflake, comment_snowflake)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(notification_id.to_db())
        .bind(notification.recipient.to_db())
        .bind(notification.sender.to_db())
        .bind(notification.kind.as_str())
        .bind(notification.post.map(Id::to_db))
        .bind(notification.comment.map(Id::to_db))
        .execute(connection)
        .await?;

        debug!(
            %notification_id,
            recipient = %notification.recipient,
            kind = %notification.kind,
            "Created notification"
        );
        Ok(())
    }

    /// Follows `following` if `follower` does not yet, unfollows otherwise.
    ///
    /// The caller rejects self-follows, the database check constraint backs that up.
    pub async fn toggle_follow(
        &self,
        follower: Id<UserMarker>,
        following: Id<UserMarker>,
    ) -> Result<FollowStatus> {
        let mut transaction = self.pool.begin().await?;

        let removed = query(
            "DELETE FROM users.follows WHERE follower_snowflake = $1 AND following_snowflake = $2",
        )
        .bind(follower.to_db())
        .bind(following.to_db())
        .execute(&mut *transaction)
        .await?
        .rows_affected()
            > 0;

        if !removed {
            query(
                "
                INSERT INTO users.follows (follower_snowflake, following_snowflake)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(follower.to_db())
            .bind(following.to_db())
            .execute(&mut *transaction)
            .await?;

            if let Some(notification) =
                NewNotification::new(following, follower, NotificationKind::Follow)
            {
                self.insert_notification(&mut *transaction, &notification)
                    .await?;
            }
        }

        let followers_count =
            query_scalar("SELECT count(*) FROM users.follows WHERE following_snowflake = $1")
                .bind(following.to_db())
                .fetch_one(&mut *transaction)
                .await?;

        transaction.commit().await?;

        Ok(FollowStatus {
            following: !removed,
            followers_count,
        })
    }

    pub async fn is_following(
        &self,
        follower: Id<UserMarker>,
        following: Id<UserMarker>,
    ) -> Result<bool> {
        let exists = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.follows
                WHERE follower_snowflake = $1 AND following_snowflake = $2
            )
            ",
        )
        .bind(follower.to_db())
        .bind(following.to_db())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn list_followers(
        &self,
        user: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<Page<UserSummary>> {
        self.list_follow_edges(user, FollowDirection::Followers, page)
            .await
    }

    pub async fn list_following(
        &self,
        user: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<Page<UserSummary>> {
        self.list_follow_edges(user, FollowDirection::Following, page)
            .await
    }

    async fn list_follow_edges(
        &self,
        user: Id<UserMarker>,
        direction: FollowDirection,
        page: PageRequest,
    ) -> Result<Page<UserSummary>> {
        // (column matching `user`, column naming the listed users)
        let (anchor, listed) = match direction {
            FollowDirection::Followers => ("following_snowflake", "follower_snowflake"),
            FollowDirection::Following => ("follower_snowflake", "following_snowflake"),
        };

        let count_sql = format!("SELECT count(*) FROM users.follows WHERE {anchor} = $1");
        let count: i64 = query_scalar(&count_sql)
            .bind(user.to_db())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "
            SELECT users.user_snowflake, users.username, users.profile_image
            FROM users.follows JOIN users.users ON users.user_snowflake = follows.{listed}
            WHERE follows.{anchor} = $1
            ORDER BY follows.created_at DESC
            LIMIT $2 OFFSET $3
            "
        );
        let records = query_as::<_, UserSummaryRecord>(&sql)
            .bind(user.to_db())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let users = records
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(users, count, page)?)
    }

    pub async fn list_notifications(
        &self,
        recipient: Id<UserMarker>,
        page: PageRequest,
    ) -> Result<NotificationList> {
        let count: i64 =
            query_scalar("SELECT count(*) FROM users.notifications WHERE recipient_snowflake = $1")
                .bind(recipient.to_db())
                .fetch_one(&self.pool)
                .await?;
        let unread_count = self.unread_notification_count(recipient).await?;

        let records = query_as::<_, NotificationRecord>(NOTIFICATION_SELECT)
            .bind(recipient.to_db())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let notifications = records
            .into_iter()
            .map(Notification::try_from)
            .collect::<Result<_, _>>()?;

        Ok(NotificationList {
            unread_count,
            page: Page::new(notifications, count, page)?,
        })
    }

    pub async fn unread_notification_count(&self, recipient: Id<UserMarker>) -> Result<i64> {
        let count = query_scalar(
            "SELECT count(*) FROM users.notifications WHERE recipient_snowflake = $1 AND NOT is_read",
        )
        .bind(recipient.to_db())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// `false` when the notification does not exist or belongs to someone else.
    pub async fn mark_notification_read(
        &self,
        recipient: Id<UserMarker>,
        notification: Id<NotificationMarker>,
    ) -> Result<bool> {
        let updated = query(
            "
            UPDATE users.notifications SET is_read = TRUE
            WHERE notification_snowflake = $1 AND recipient_snowflake = $2
            ",
        )
        .bind(notification.to_db())
        .bind(recipient.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    pub async fn mark_all_notifications_read(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let updated = query(
            "UPDATE users.notifications SET is_read = TRUE WHERE recipient_snowflake = $1 AND NOT is_read",
        )
        .bind(recipient.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    pub async fn delete_notification(
        &self,
        recipient: Id<UserMarker>,
        notification: Id<NotificationMarker>,
    ) -> Result<bool> {
        let deleted = query(
            "DELETE FROM users.notifications WHERE notification_snowflake = $1 AND recipient_snowflake = $2",
        )
        .bind(notification.to_db())
        .bind(recipient.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }
}
