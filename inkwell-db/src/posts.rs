use crate::{
    client::{DbClient, DbError, Result},
    query::{PUBLIC_POST, post_count_query, post_listing_query, post_select},
    reactions::ReactionTarget,
    record::{PostRecord, PostTagRecord},
};
use inkwell_common::{
    model::{
        Id,
        notification::{NewNotification, NotificationKind},
        page::{Page, PageRequest},
        post::{
            CreatePost, DraftSave, DraftSaved, Post, PostFilter, PostMarker, RELATED_POSTS_LIMIT,
            SiteStats, UpdatePost,
        },
        reaction::{ReactionKind, ReactionToggle},
        tag::{NewTag, TagMarker, TagSummary},
        text::PostTitle,
        user::UserMarker,
    },
    slug::SlugCandidates,
};
use sqlx::{FromRow, PgConnection, query, query_as, query_scalar};
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(FromRow)]
struct DraftSavedRecord {
    post_snowflake: i64,
    slug: String,
    draft_saved_at: Option<OffsetDateTime>,
}

#[derive(FromRow)]
struct SiteStatsRecord {
    post_count: i64,
    user_count: i64,
    comment_count: i64,
    category_count: i64,
}

impl DbClient {
    pub async fn list_posts(&self, filter: &PostFilter, page: PageRequest) -> Result<Page<Post>> {
        let count: i64 = post_count_query(filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let posts = self
            .fetch_listing(filter, page.limit(), page.offset())
            .await?;
        Ok(Page::new(posts, count, page)?)
    }

    /// The first `limit` posts of a listing, without a count.
    pub async fn latest_posts(&self, filter: &PostFilter, limit: i64) -> Result<Vec<Post>> {
        self.fetch_listing(filter, limit, 0).await
    }

    async fn fetch_listing(&self, filter: &PostFilter, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let records = post_listing_query(filter, limit, offset)
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_tags(records).await
    }

    async fn attach_tags(&self, records: Vec<PostRecord>) -> Result<Vec<Post>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = records.iter().map(|record| record.post_snowflake).collect();
        let tag_records = query_as::<_, PostTagRecord>(
            "
            SELECT post_tags.post_snowflake, tags.name, tags.slug
            FROM blog.post_tags JOIN blog.tags ON tags.tag_snowflake = post_tags.tag_snowflake
            WHERE post_tags.post_snowflake = ANY($1)
            ORDER BY tags.name
            ",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<i64, Vec<TagSummary>> = HashMap::new();
        for record in tag_records {
            tags.entry(record.post_snowflake)
                .or_default()
                .push(record.into());
        }

        let posts = records
            .into_iter()
            .map(|record| {
                let post_tags = tags.remove(&record.post_snowflake).unwrap_or_default();
                record.into_post(post_tags)
            })
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("{} WHERE posts.post_snowflake = $1", post_select());
        let record = query_as::<_, PostRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.attach_tags(Vec::from_iter(record)).await?.pop())
    }

    pub async fn fetch_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("{} WHERE posts.slug = $1", post_select());
        let record = query_as::<_, PostRecord>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(self.attach_tags(Vec::from_iter(record)).await?.pop())
    }

    /// Newer public posts from the same category.
    pub async fn related_posts(&self, post: &Post) -> Result<Vec<Post>> {
        let Some(category) = &post.category else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "
            {}
            WHERE {PUBLIC_POST} AND posts.category_snowflake = $1 AND posts.post_snowflake <> $2
            ORDER BY posts.created_at DESC
            LIMIT $3
            ",
            post_select()
        );
        let records = query_as::<_, PostRecord>(&sql)
            .bind(category.id.to_db())
            .bind(post.id.to_db())
            .bind(RELATED_POSTS_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        self.attach_tags(records).await
    }

    async fn fetch_existing_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Inserts the row under the first free slug candidate.
    async fn insert_post(
        &self,
        connection: &mut PgConnection,
        post: &CreatePost,
        draft_saved_at: Option<OffsetDateTime>,
    ) -> Result<(Id<PostMarker>, String)> {
        let post_id = self.next_id::<PostMarker>()?;
        let created_at = OffsetDateTime::now_utc();
        let mut candidates = SlugCandidates::for_post(post.title.get(), created_at);

        loop {
            let slug = candidates.next_candidate();
            let inserted: Option<i64> = query_scalar(
                "
                INSERT INTO blog.posts (
                    post_snowflake, title, slug, content, author_snowflake, category_snowflake,
                    series_snowflake, series_order, thumbnail, published, is_draft, draft_saved_at,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
                ON CONFLICT (slug) DO NOTHING
                RETURNING post_snowflake
                ",
            )
            .bind(post_id.to_db())
            .bind(post.title.get())
            .bind(&slug)
            .bind(&post.content)
            .bind(post.author.to_db())
            .bind(post.category.map(Id::to_db))
            .bind(post.series.map(Id::to_db))
            .bind(post.series_order)
            .bind(post.thumbnail.as_deref())
            .bind(post.published)
            .bind(post.is_draft)
            .bind(draft_saved_at)
            .bind(created_at)
            .fetch_optional(&mut *connection)
            .await?;

            if inserted.is_some() {
                return Ok((post_id, slug));
            }
            debug!(slug, "Post slug taken, trying next candidate");
        }
    }

    /// Replaces the post's tags, creating tags that do not exist yet.
    async fn set_post_tags(
        &self,
        connection: &mut PgConnection,
        post_id: Id<PostMarker>,
        tags: &[NewTag],
    ) -> Result<()> {
        query("DELETE FROM blog.post_tags WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&mut *connection)
            .await?;

        for tag in tags {
            let tag_id = self.next_id::<TagMarker>()?;
            query("INSERT INTO blog.tags (tag_snowflake, name, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
                .bind(tag_id.to_db())
                .bind(tag.name.get())
                .bind(&tag.slug)
                .execute(&mut *connection)
                .await?;

            query(
                "
                INSERT INTO blog.post_tags (post_snowflake, tag_snowflake)
                SELECT $1, tag_snowflake FROM blog.tags WHERE slug = $2
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(post_id.to_db())
            .bind(&tag.slug)
            .execute(&mut *connection)
            .await?;
        }

        Ok(())
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;
        let (post_id, slug) = self.insert_post(&mut *transaction, post, None).await?;
        self.set_post_tags(&mut *transaction, post_id, &post.tags)
            .await?;
        transaction.commit().await?;

        info!(%post_id, slug, author = %post.author, "Created post");
        self.fetch_existing_post(post_id).await
    }

    /// The slug never changes, even when the title does.
    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        update: &UpdatePost,
    ) -> Result<Option<Post>> {
        let mut transaction = self.pool.begin().await?;

        let updated: Option<i64> = query_scalar(
            "
            UPDATE blog.posts SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                category_snowflake = CASE WHEN $4 THEN $5 ELSE category_snowflake END,
                series_snowflake = CASE WHEN $6 THEN $7 ELSE series_snowflake END,
                series_order = CASE WHEN $8 THEN $9 ELSE series_order END,
                thumbnail = CASE WHEN $10 THEN $11 ELSE thumbnail END,
                published = COALESCE($12, published),
                is_draft = CASE WHEN $12 THEN FALSE ELSE is_draft END,
                updated_at = now()
            WHERE post_snowflake = $1
            RETURNING post_snowflake
            ",
        )
        .bind(post_id.to_db())
        .bind(update.title.as_ref().map(PostTitle::get))
        .bind(update.content.as_deref())
        .bind(update.category.is_some())
        .bind(update.category.flatten().map(Id::to_db))
        .bind(update.series.is_some())
        .bind(update.series.flatten().map(Id::to_db))
        .bind(update.series_order.is_some())
        .bind(update.series_order.flatten())
        .bind(update.thumbnail.is_some())
        .bind(update.thumbnail.clone().flatten())
        .bind(update.published)
        .fetch_optional(&mut *transaction)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(tags) = &update.tags {
            self.set_post_tags(&mut *transaction, post_id, tags).await?;
        }
        transaction.commit().await?;

        debug!(%post_id, "Updated post");
        self.fetch_post(post_id).await
    }

    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM blog.posts WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(%post_id, deleted, "Deleted post");
        Ok(deleted > 0)
    }

    /// Bumps the counter in place and returns the new value.
    pub async fn increase_views(&self, post_id: Id<PostMarker>) -> Result<Option<i64>> {
        let views = query_scalar(
            "UPDATE blog.posts SET views = views + 1 WHERE post_snowflake = $1 RETURNING views",
        )
        .bind(post_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(views)
    }

    pub async fn toggle_post_reaction(
        &self,
        post: &Post,
        user: Id<UserMarker>,
        requested: ReactionKind,
    ) -> Result<ReactionToggle> {
        let on_like = NewNotification::new(post.author.id, user, NotificationKind::PostLike)
            .map(|notification| notification.with_post(post.id));

        self.toggle_reaction(ReactionTarget::Post(post.id), user, requested, on_like)
            .await
    }

    /// Returns whether the post is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, user: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<bool> {
        let mut transaction = self.pool.begin().await?;

        let removed = query("DELETE FROM blog.bookmarks WHERE user_snowflake = $1 AND post_snowflake = $2")
            .bind(user.to_db())
            .bind(post_id.to_db())
            .execute(&mut *transaction)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            query(
                "
                INSERT INTO blog.bookmarks (user_snowflake, post_snowflake)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(user.to_db())
            .bind(post_id.to_db())
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        debug!(%user, %post_id, saved = !removed, "Toggled bookmark");
        Ok(!removed)
    }

    /// Stores an autosave. `None` when the given post does not exist or is not
    /// the author's.
    pub async fn save_draft(&self, draft: &DraftSave) -> Result<Option<DraftSaved>> {
        let Some(post_id) = draft.id else {
            let saved_at = OffsetDateTime::now_utc();
            let post = CreatePost {
                title: draft.title.clone(),
                content: draft.content.clone(),
                author: draft.author,
                category: draft.category,
                series: None,
                series_order: None,
                tags: Vec::new(),
                thumbnail: None,
                published: false,
                is_draft: true,
            };

            let mut connection = self.pool.acquire().await?;
            let (post_id, slug) = self
                .insert_post(&mut *connection, &post, Some(saved_at))
                .await?;

            info!(%post_id, slug, "Created draft");
            return Ok(Some(DraftSaved {
                id: post_id,
                slug,
                draft_saved_at: saved_at,
                created: true,
            }));
        };

        let record = query_as::<_, DraftSavedRecord>(
            "
            UPDATE blog.posts SET
                title = $3,
                content = $4,
                category_snowflake = $5,
                draft_saved_at = now(),
                updated_at = now()
            WHERE post_snowflake = $1 AND author_snowflake = $2
            RETURNING post_snowflake, slug, draft_saved_at
            ",
        )
        .bind(post_id.to_db())
        .bind(draft.author.to_db())
        .bind(draft.title.get())
        .bind(&draft.content)
        .bind(draft.category.map(Id::to_db))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|record| DraftSaved {
            id: Id::from_db(record.post_snowflake),
            slug: record.slug,
            draft_saved_at: record.draft_saved_at.unwrap_or_else(OffsetDateTime::now_utc),
            created: false,
        }))
    }

    pub async fn site_stats(&self) -> Result<SiteStats> {
        let sql = format!(
            "
            SELECT
                (SELECT count(*) FROM blog.posts WHERE {PUBLIC_POST}) AS post_count,
                (SELECT count(*) FROM users.users WHERE is_active) AS user_count,
                (SELECT count(*) FROM blog.comments WHERE is_active) AS comment_count,
                (SELECT count(*) FROM blog.categories) AS category_count
            "
        );
        let record = query_as::<_, SiteStatsRecord>(&sql)
            .fetch_one(&self.pool)
            .await?;

        Ok(SiteStats {
            post_count: record.post_count,
            user_count: record.user_count,
            comment_count: record.comment_count,
            category_count: record.category_count,
        })
    }
}
