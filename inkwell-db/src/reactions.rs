use crate::client::{DbClient, Result};
use inkwell_common::model::{
    Id, ModelValidationError,
    comment::CommentMarker,
    notification::NewNotification,
    post::PostMarker,
    reaction::{ReactionCounts, ReactionKind, ReactionToggle, toggle},
    user::UserMarker,
};
use sqlx::{FromRow, query, query_as, query_scalar};
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) enum ReactionTarget {
    Post(Id<PostMarker>),
    Comment(Id<CommentMarker>),
}

struct ReactionStatements {
    current: &'static str,
    upsert: &'static str,
    delete: &'static str,
    counts: &'static str,
}

const POST_REACTIONS: ReactionStatements = ReactionStatements {
    current: "
        SELECT kind FROM blog.post_reactions
        WHERE user_snowflake = $1 AND post_snowflake = $2
        FOR UPDATE
    ",
    upsert: "
        INSERT INTO blog.post_reactions (user_snowflake, post_snowflake, kind)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_snowflake, post_snowflake) DO UPDATE SET kind = EXCLUDED.kind
    ",
    delete: "DELETE FROM blog.post_reactions WHERE user_snowflake = $1 AND post_snowflake = $2",
    counts: "
        SELECT
            count(*) FILTER (WHERE kind = 'like') AS likes_count,
            count(*) FILTER (WHERE kind = 'dislike') AS dislikes_count
        FROM blog.post_reactions
        WHERE post_snowflake = $1
    ",
};

const COMMENT_REACTIONS: ReactionStatements = ReactionStatements {
    current: "
        SELECT kind FROM blog.comment_reactions
        WHERE user_snowflake = $1 AND comment_snowflake = $2
        FOR UPDATE
    ",
    upsert: "
        INSERT INTO blog.comment_reactions (user_snowflake, comment_snowflake, kind)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_snowflake, comment_snowflake) DO UPDATE SET kind = EXCLUDED.kind
    ",
    delete: "DELETE FROM blog.comment_reactions WHERE user_snowflake = $1 AND comment_snowflake = $2",
    counts: "
        SELECT
            count(*) FILTER (WHERE kind = 'like') AS likes_count,
            count(*) FILTER (WHERE kind = 'dislike') AS dislikes_count
        FROM blog.comment_reactions
        WHERE comment_snowflake = $1
    ",
};

impl ReactionTarget {
    fn statements(self) -> &'static ReactionStatements {
        match self {
            ReactionTarget::Post(_) => &POST_REACTIONS,
            ReactionTarget::Comment(_) => &COMMENT_REACTIONS,
        }
    }

    fn to_db(self) -> i64 {
        match self {
            ReactionTarget::Post(id) => id.to_db(),
            ReactionTarget::Comment(id) => id.to_db(),
        }
    }
}

#[derive(FromRow)]
struct CountsRecord {
    likes_count: i64,
    dislikes_count: i64,
}

impl DbClient {
    /// Applies a like or dislike toggle.
    ///
    /// `on_like` is stored when this toggle turns the user's reaction into a like.
    pub(crate) async fn toggle_reaction(
        &self,
        target: ReactionTarget,
        user: Id<UserMarker>,
        requested: ReactionKind,
        on_like: Option<NewNotification>,
    ) -> Result<ReactionToggle> {
        let statements = target.statements();
        let mut transaction = self.pool.begin().await?;

        let current: Option<String> = query_scalar(statements.current)
            .bind(user.to_db())
            .bind(target.to_db())
            .fetch_optional(&mut *transaction)
            .await?;
        let current = current
            .map(|kind| kind.parse::<ReactionKind>())
            .transpose()
            .map_err(ModelValidationError::from)?;

        let next = toggle(current, requested);
        match next {
            Some(kind) => {
                query(statements.upsert)
                    .bind(user.to_db())
                    .bind(target.to_db())
                    .bind(kind.as_str())
                    .execute(&mut *transaction)
                    .await?;
            }
            None => {
                query(statements.delete)
                    .bind(user.to_db())
                    .bind(target.to_db())
                    .execute(&mut *transaction)
                    .await?;
            }
        }

        if next == Some(ReactionKind::Like)
            && current != Some(ReactionKind::Like)
            && let Some(notification) = on_like
        {
            self.insert_notification(&mut *transaction, &notification)
                .await?;
        }

        let counts = query_as::<_, CountsRecord>(statements.counts)
            .bind(target.to_db())
            .fetch_one(&mut *transaction)
            .await?;

        transaction.commit().await?;

        debug!(?target, %user, ?current, ?next, "Toggled reaction");
        Ok(ReactionToggle::new(
            requested,
            next,
            ReactionCounts {
                likes_count: counts.likes_count,
                dislikes_count: counts.dislikes_count,
            },
        ))
    }
}
