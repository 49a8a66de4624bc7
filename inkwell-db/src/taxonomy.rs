use crate::{
    client::{DbClient, DbError, Result},
    query::PUBLIC_POST,
    record::{CategoryRecord, SeriesRecord, TagRecord},
};
use inkwell_common::{
    model::{
        Id,
        category::{Category, CategoryMarker, CreateCategory, UpdateCategory},
        series::{CreateSeries, Series, SeriesMarker},
        tag::Tag,
        text::CategoryName,
    },
    slug::{SlugCandidates, slugify},
};
use sqlx::{query, query_as, query_scalar};
use time::OffsetDateTime;
use tracing::info;

fn category_select() -> String {
    format!(
        "
        SELECT
            categories.category_snowflake,
            categories.name,
            categories.slug,
            categories.description,
            (
                SELECT count(*) FROM blog.posts
                WHERE posts.category_snowflake = categories.category_snowflake AND {PUBLIC_POST}
            ) AS post_count,
            categories.created_at
        FROM blog.categories
        "
    )
}

fn tag_select() -> String {
    format!(
        "
        SELECT
            tags.tag_snowflake,
            tags.name,
            tags.slug,
            (
                SELECT count(*) FROM blog.post_tags JOIN blog.posts USING (post_snowflake)
                WHERE post_tags.tag_snowflake = tags.tag_snowflake AND {PUBLIC_POST}
            ) AS post_count
        FROM blog.tags
        "
    )
}

fn series_select() -> String {
    format!(
        "
        SELECT
            series.series_snowflake,
            series.title,
            series.slug,
            series.description,
            series.author_snowflake,
            authors.username AS author_username,
            authors.profile_image AS author_profile_image,
            (
                SELECT count(*) FROM blog.posts
                WHERE posts.series_snowflake = series.series_snowflake AND {PUBLIC_POST}
            ) AS post_count,
            series.created_at
        FROM
            blog.series
            JOIN users.users AS authors ON authors.user_snowflake = series.author_snowflake
        "
    )
}

impl DbClient {
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let sql = format!("{} ORDER BY categories.name", category_select());
        let records = query_as::<_, CategoryRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let categories = records
            .into_iter()
            .map(Category::try_from)
            .collect::<Result<_, _>>()?;
        Ok(categories)
    }

    pub async fn fetch_category(&self, category_id: Id<CategoryMarker>) -> Result<Option<Category>> {
        let sql = format!("{} WHERE categories.category_snowflake = $1", category_select());
        let record = query_as::<_, CategoryRecord>(&sql)
            .bind(category_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    pub async fn fetch_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("{} WHERE categories.slug = $1", category_select());
        let record = query_as::<_, CategoryRecord>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    /// A duplicate name or slug surfaces as a unique violation.
    pub async fn create_category(&self, category: &CreateCategory) -> Result<Category> {
        let category_id = self.next_id::<CategoryMarker>()?;

        let record = query_as::<_, CategoryRecord>(
            "
            INSERT INTO blog.categories (category_snowflake, name, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING category_snowflake, name, slug, description, 0::BIGINT AS post_count, created_at
            ",
        )
        .bind(category_id.to_db())
        .bind(category.name.get())
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;

        info!(%category_id, slug = category.slug, "Created category");
        Ok(record.try_into()?)
    }

    /// The slug stays as it was created.
    pub async fn update_category(
        &self,
        category_id: Id<CategoryMarker>,
        update: &UpdateCategory,
    ) -> Result<Option<Category>> {
        let updated = query(
            "
            UPDATE blog.categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE category_snowflake = $1
            ",
        )
        .bind(category_id.to_db())
        .bind(update.name.as_ref().map(CategoryName::get))
        .bind(update.description.as_deref())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.fetch_category(category_id).await
    }

    /// Posts of the category are kept with their category cleared.
    pub async fn delete_category(&self, category_id: Id<CategoryMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM blog.categories WHERE category_snowflake = $1")
            .bind(category_id.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(%category_id, deleted, "Deleted category");
        Ok(deleted > 0)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let sql = format!("{} ORDER BY tags.name", tag_select());
        let records = query_as::<_, TagRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let tags = records
            .into_iter()
            .map(Tag::try_from)
            .collect::<Result<_, _>>()?;
        Ok(tags)
    }

    pub async fn fetch_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let sql = format!("{} WHERE tags.slug = $1", tag_select());
        let record = query_as::<_, TagRecord>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        let tag = record.map(Tag::try_from).transpose()?;
        Ok(tag)
    }

    pub async fn list_series(&self) -> Result<Vec<Series>> {
        let sql = format!("{} ORDER BY series.created_at DESC", series_select());
        let records = query_as::<_, SeriesRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let series = records
            .into_iter()
            .map(Series::try_from)
            .collect::<Result<_, _>>()?;
        Ok(series)
    }

    pub async fn fetch_series(&self, series_id: Id<SeriesMarker>) -> Result<Option<Series>> {
        let sql = format!("{} WHERE series.series_snowflake = $1", series_select());
        let record = query_as::<_, SeriesRecord>(&sql)
            .bind(series_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let series = record.map(Series::try_from).transpose()?;
        Ok(series)
    }

    pub async fn fetch_series_by_slug(&self, slug: &str) -> Result<Option<Series>> {
        let sql = format!("{} WHERE series.slug = $1", series_select());
        let record = query_as::<_, SeriesRecord>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        let series = record.map(Series::try_from).transpose()?;
        Ok(series)
    }

    pub async fn create_series(&self, series: &CreateSeries) -> Result<Series> {
        let series_id = self.next_id::<SeriesMarker>()?;
        let mut candidates =
            SlugCandidates::new(slugify(series.title.get(), "series"), OffsetDateTime::now_utc());

        loop {
            let slug = candidates.next_candidate();
            let inserted: Option<i64> = query_scalar(
                "
                INSERT INTO blog.series (series_snowflake, title, slug, description, author_snowflake)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (slug) DO NOTHING
                RETURNING series_snowflake
                ",
            )
            .bind(series_id.to_db())
            .bind(series.title.get())
            .bind(&slug)
            .bind(&series.description)
            .bind(series.author.to_db())
            .fetch_optional(&self.pool)
            .await?;

            if inserted.is_some() {
                info!(%series_id, slug, "Created series");
                break;
            }
        }

        self.fetch_series(series_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Posts of the series are kept and detached from it.
    pub async fn delete_series(&self, series_id: Id<SeriesMarker>) -> Result<bool> {
        let mut transaction = self.pool.begin().await?;

        query(
            "UPDATE blog.posts SET series_snowflake = NULL, series_order = NULL WHERE series_snowflake = $1",
        )
        .bind(series_id.to_db())
        .execute(&mut *transaction)
        .await?;

        let deleted = query("DELETE FROM blog.series WHERE series_snowflake = $1")
            .bind(series_id.to_db())
            .execute(&mut *transaction)
            .await?
            .rows_affected();

        transaction.commit().await?;

        info!(%series_id, deleted, "Deleted series");
        Ok(deleted > 0)
    }
}
