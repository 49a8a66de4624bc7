use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Created, Json, Query},
    routes::api::{PageQuery, require_owner},
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::{
    model::{
        Id,
        category::{Category, CreateCategory, UpdateCategory},
        page::Page,
        post::{PostFilter, PostScope, PostSort, PostSummary},
        series::{CreateSeries, Series},
        tag::Tag,
        text::{CategoryName, SeriesTitle},
        user::UserMarker,
    },
    slug::slugify,
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_categories)
        .typed_post(create_category)
        .typed_get(get_category)
        .typed_put(update_category)
        .typed_delete(delete_category)
        .typed_get(list_tags)
        .typed_get(get_tag)
        .typed_get(list_series)
        .typed_post(create_series)
        .typed_get(get_series)
        .typed_delete(delete_series)
}

pub(crate) async fn category_by_slug(db: &DbClient, slug: &str) -> Result<Category> {
    db.fetch_category_by_slug(slug)
        .await?
        .ok_or_else(|| ServerError::CategoryNotFound(slug.to_owned()))
}

pub(crate) async fn tag_by_slug(db: &DbClient, slug: &str) -> Result<Tag> {
    db.fetch_tag_by_slug(slug)
        .await?
        .ok_or_else(|| ServerError::TagNotFound(slug.to_owned()))
}

pub(crate) async fn series_by_slug(db: &DbClient, slug: &str) -> Result<Series> {
    db.fetch_series_by_slug(slug)
        .await?
        .ok_or_else(|| ServerError::SeriesNotFound(slug.to_owned()))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct WithPosts<T> {
    #[serde(flatten)]
    item: T,
    posts: Page<PostSummary>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/categories", rejection(ServerError))]
struct CategoriesPath();

async fn list_categories(
    CategoriesPath(): CategoriesPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(db.list_categories().await?))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct NewCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Creates a category, slugged from its name.
pub(crate) async fn add_category(
    db: &DbClient,
    user: Id<UserMarker>,
    new_category: NewCategory,
) -> Result<Category> {
    let name = CategoryName::new(new_category.name).map_err(|err| ServerError::field("name", err))?;
    let slug = slugify(name.get(), "category");

    let category = db
        .create_category(&CreateCategory {
            name,
            slug,
            description: new_category.description.trim().to_owned(),
        })
        .await?;

    info!(category = %category.id, slug = category.slug, %user, "Created category");
    Ok(category)
}

async fn create_category(
    CategoriesPath(): CategoriesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(new_category): Json<NewCategory>,
) -> Result<Created<Category>> {
    Ok(Created(add_category(&db, user.user_id(), new_category).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/categories/{slug}", rejection(ServerError))]
struct CategoryPath {
    slug: String,
}

async fn get_category(
    CategoryPath { slug }: CategoryPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Category>> {
    Ok(Json(category_by_slug(&db, &slug).await?))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct CategoryChanges {
    name: Option<String>,
    description: Option<String>,
}

async fn update_category(
    CategoryPath { slug }: CategoryPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
    Json(changes): Json<CategoryChanges>,
) -> Result<Json<Category>> {
    let category = category_by_slug(&db, &slug).await?;
    let name = changes
        .name
        .map(CategoryName::new)
        .transpose()
        .map_err(|err| ServerError::field("name", err))?;

    let updated = db
        .update_category(
            category.id,
            &UpdateCategory {
                name,
                description: changes.description.map(|description| description.trim().to_owned()),
            },
        )
        .await?
        .ok_or(ServerError::CategoryNotFound(slug))?;

    Ok(Json(updated))
}

async fn delete_category(
    CategoryPath { slug }: CategoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let category = category_by_slug(&db, &slug).await?;
    db.delete_category(category.id).await?;

    info!(category = %category.id, user = %user.user_id(), "Deleted category");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tags", rejection(ServerError))]
struct TagsPath();

async fn list_tags(
    TagsPath(): TagsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Tag>>> {
    Ok(Json(db.list_tags().await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/tags/{slug}", rejection(ServerError))]
struct TagPath {
    slug: String,
}

async fn get_tag(
    TagPath { slug }: TagPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<WithPosts<Tag>>> {
    let tag = tag_by_slug(&db, &slug).await?;
    let filter = PostFilter {
        tag: Some(tag.slug.clone()),
        ..PostFilter::new(PostScope::Public)
    };
    let posts = db.list_posts(&filter, page).await?;

    Ok(Json(WithPosts {
        item: tag,
        posts: posts.map(|post| post.summary()),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/series", rejection(ServerError))]
struct SeriesListPath();

async fn list_series(
    SeriesListPath(): SeriesListPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Series>>> {
    Ok(Json(db.list_series().await?))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct NewSeries {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

async fn create_series(
    SeriesListPath(): SeriesListPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(new_series): Json<NewSeries>,
) -> Result<Created<Series>> {
    let title = SeriesTitle::new(new_series.title).map_err(|err| ServerError::field("title", err))?;

    let series = db
        .create_series(&CreateSeries {
            title,
            description: new_series.description.trim().to_owned(),
            author: user.user_id(),
        })
        .await?;

    info!(series = %series.id, slug = series.slug, author = %user.user_id(), "Created series");
    Ok(Created(series))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/series/{slug}", rejection(ServerError))]
struct SeriesPath {
    slug: String,
}

async fn get_series(
    SeriesPath { slug }: SeriesPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<WithPosts<Series>>> {
    let series = series_by_slug(&db, &slug).await?;
    let filter = PostFilter {
        series: Some(series.slug.clone()),
        sort: PostSort::Series,
        ..PostFilter::new(PostScope::Public)
    };
    let posts = db.list_posts(&filter, page).await?;

    Ok(Json(WithPosts {
        item: series,
        posts: posts.map(|post| post.summary()),
    }))
}

async fn delete_series(
    SeriesPath { slug }: SeriesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let series = series_by_slug(&db, &slug).await?;
    require_owner(series.author.id, user.user_id(), "You can only delete your own series.")?;
    db.delete_series(series.id).await?;

    info!(series = %series.id, "Deleted series");
    Ok(StatusCode::NO_CONTENT)
}
