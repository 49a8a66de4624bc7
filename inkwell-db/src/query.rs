//! SQL fragments shared between statements, and the dynamic post listing.

use inkwell_common::{
    model::post::{PostFilter, PostScope, PostSort},
    util::like_pattern,
};
use sqlx::{Postgres, QueryBuilder};

pub(crate) const USER_COLUMNS: &str = "
    users.user_snowflake,
    users.username,
    users.email,
    users.first_name,
    users.last_name,
    users.profile_image,
    users.bio,
    users.email_verified,
    users.is_active,
    users.date_joined
";

pub(crate) const POST_COLUMNS: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.slug,
        posts.content,
        posts.author_snowflake,
        authors.username AS author_username,
        authors.profile_image AS author_profile_image,
        posts.category_snowflake,
        categories.name AS category_name,
        categories.slug AS category_slug,
        posts.series_snowflake,
        series.title AS series_title,
        series.slug AS series_slug,
        posts.series_order,
        posts.thumbnail,
        posts.published,
        posts.is_draft,
        posts.draft_saved_at,
        posts.views,
        (
            SELECT count(*) FROM blog.post_reactions
            WHERE post_reactions.post_snowflake = posts.post_snowflake AND post_reactions.kind = 'like'
        ) AS likes_count,
        (
            SELECT count(*) FROM blog.post_reactions
            WHERE post_reactions.post_snowflake = posts.post_snowflake AND post_reactions.kind = 'dislike'
        ) AS dislikes_count,
        (
            SELECT count(*) FROM blog.comments
            WHERE comments.post_snowflake = posts.post_snowflake AND comments.is_active
        ) AS comment_count,
        posts.created_at,
        posts.updated_at
";

pub(crate) const POST_FROM: &str = "
    FROM
        blog.posts
        JOIN users.users AS authors ON authors.user_snowflake = posts.author_snowflake
        LEFT JOIN blog.categories ON categories.category_snowflake = posts.category_snowflake
        LEFT JOIN blog.series ON series.series_snowflake = posts.series_snowflake
";

/// `POST_COLUMNS` and `POST_FROM`, ready for a `WHERE` clause.
pub(crate) fn post_select() -> String {
    format!("{POST_COLUMNS}{POST_FROM}")
}

pub(crate) const PUBLIC_POST: &str = "(posts.published AND NOT posts.is_draft)";

pub(crate) const COMMENT_SELECT: &str = "
    SELECT
        comments.comment_snowflake,
        comments.post_snowflake,
        comments.author_snowflake,
        authors.username AS author_username,
        authors.profile_image AS author_profile_image,
        comments.parent_snowflake,
        comments.content,
        comments.is_active,
        (
            SELECT count(*) FROM blog.comment_reactions
            WHERE comment_reactions.comment_snowflake = comments.comment_snowflake
                AND comment_reactions.kind = 'like'
        ) AS likes_count,
        (
            SELECT count(*) FROM blog.comment_reactions
            WHERE comment_reactions.comment_snowflake = comments.comment_snowflake
                AND comment_reactions.kind = 'dislike'
        ) AS dislikes_count,
        comments.created_at,
        comments.updated_at
    FROM
        blog.comments
        JOIN users.users AS authors ON authors.user_snowflake = comments.author_snowflake
";

/// Builds the page query for a post listing.
pub(crate) fn post_listing_query(
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(POST_COLUMNS);
    push_post_source(&mut builder, filter);
    push_post_order(&mut builder, filter);
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);
    builder
}

/// Builds the query counting every row `post_listing_query` could page through.
pub(crate) fn post_count_query(filter: &PostFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT count(*)");
    push_post_source(&mut builder, filter);
    builder
}

fn push_post_source(builder: &mut QueryBuilder<'static, Postgres>, filter: &PostFilter) {
    builder.push(POST_FROM);

    if let PostScope::Bookmarks { user } = filter.scope {
        builder.push(
            " JOIN blog.bookmarks ON bookmarks.post_snowflake = posts.post_snowflake \
            AND bookmarks.user_snowflake = ",
        );
        builder.push_bind(user.to_db());
    }

    builder.push(" WHERE ");
    match filter.scope {
        PostScope::Public | PostScope::Listing { viewer: None } => {
            builder.push(PUBLIC_POST);
        }
        PostScope::Listing {
            viewer: Some(viewer),
        }
        | PostScope::Bookmarks { user: viewer } => {
            builder.push("(");
            builder.push(PUBLIC_POST);
            builder.push(" OR posts.author_snowflake = ");
            builder.push_bind(viewer.to_db());
            builder.push(")");
        }
        PostScope::Drafts { author } => {
            builder.push("posts.is_draft AND posts.author_snowflake = ");
            builder.push_bind(author.to_db());
        }
    }

    if let Some(category) = &filter.category {
        builder.push(" AND categories.slug = ");
        builder.push_bind(category.clone());
    }
    if let Some(tag) = &filter.tag {
        builder.push(
            " AND EXISTS (\
                SELECT 1 FROM blog.post_tags JOIN blog.tags ON tags.tag_snowflake = post_tags.tag_snowflake \
                WHERE post_tags.post_snowflake = posts.post_snowflake AND tags.slug = ",
        );
        builder.push_bind(tag.clone());
        builder.push(")");
    }
    if let Some(author) = &filter.author {
        builder.push(" AND authors.username = ");
        builder.push_bind(author.clone());
    }
    if let Some(series) = &filter.series {
        builder.push(" AND series.slug = ");
        builder.push_bind(series.clone());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (posts.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR posts.content ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR authors.username ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(created_after) = filter.created_after {
        builder.push(" AND posts.created_at >= ");
        builder.push_bind(created_after);
    }
    if let Some(created_before) = filter.created_before {
        builder.push(" AND posts.created_at <= ");
        builder.push_bind(created_before);
    }
}

fn push_post_order(builder: &mut QueryBuilder<'static, Postgres>, filter: &PostFilter) {
    let order = match (filter.scope, filter.sort) {
        (PostScope::Bookmarks { .. }, _) => "bookmarks.created_at DESC",
        (PostScope::Drafts { .. }, _) => {
            "COALESCE(posts.draft_saved_at, posts.updated_at) DESC, posts.post_snowflake DESC"
        }
        (_, PostSort::Recent) => "posts.created_at DESC, posts.post_snowflake DESC",
        (_, PostSort::Likes) => "likes_count DESC, posts.created_at DESC",
        (_, PostSort::Views) => "posts.views DESC, posts.created_at DESC",
        (_, PostSort::Title) => "posts.title ASC, posts.created_at DESC",
        (_, PostSort::Series) => "posts.series_order ASC NULLS LAST, posts.created_at ASC",
    };
    builder.push(" ORDER BY ");
    builder.push(order);
}

#[cfg(test)]
mod tests {
    use crate::query::{post_count_query, post_listing_query};
    use inkwell_common::model::{
        Id,
        post::{PostFilter, PostScope, PostSort},
    };

    #[test]
    fn public_listing_without_filters() {
        let builder = post_listing_query(&PostFilter::default(), 10, 0);
        let sql = builder.sql();
        assert!(sql.contains("WHERE (posts.published AND NOT posts.is_draft)"));
        assert!(sql.contains("ORDER BY posts.created_at DESC"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
        assert!(!sql.contains("bookmarks"));
    }

    #[test]
    fn filters_bind_in_order() {
        let filter = PostFilter {
            category: Some("rust".to_owned()),
            tag: Some("async".to_owned()),
            author: Some("ferris".to_owned()),
            search: Some("  tokio ".to_owned()),
            sort: PostSort::Likes,
            ..PostFilter::new(PostScope::Listing {
                viewer: Some(Id::from(5)),
            })
        };
        let builder = post_listing_query(&filter, 10, 20);
        let sql = builder.sql();

        assert!(sql.contains("OR posts.author_snowflake = $1)"));
        assert!(sql.contains("categories.slug = $2"));
        assert!(sql.contains("tags.slug = $3)"));
        assert!(sql.contains("authors.username = $4"));
        assert!(sql.contains("posts.title ILIKE $5 OR posts.content ILIKE $6 OR authors.username ILIKE $7"));
        assert!(sql.contains("ORDER BY likes_count DESC"));
        assert!(sql.ends_with("LIMIT $8 OFFSET $9"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = PostFilter {
            search: Some("   ".to_owned()),
            ..PostFilter::default()
        };
        assert!(!post_count_query(&filter).sql().contains("ILIKE"));
    }

    #[test]
    fn bookmarks_join_before_where() {
        let filter = PostFilter::new(PostScope::Bookmarks { user: Id::from(9) });
        let builder = post_listing_query(&filter, 10, 0);
        let sql = builder.sql();
        let join = sql.find("JOIN blog.bookmarks").unwrap();
        let clause = sql.find("bookmarks.user_snowflake = $1 WHERE (").unwrap();
        assert!(join < clause);
        assert_eq!(sql.matches("JOIN blog.bookmarks").count(), 1);
        assert!(sql.contains("ORDER BY bookmarks.created_at DESC"));
    }

    #[test]
    fn drafts_scope() {
        let filter = PostFilter::new(PostScope::Drafts { author: Id::from(3) });
        let sql = post_count_query(&filter).sql().to_owned();
        assert!(sql.starts_with("SELECT count(*)"));
        assert!(sql.contains("posts.is_draft AND posts.author_snowflake = $1"));
        assert!(!sql.contains("ORDER BY"));
    }
}
