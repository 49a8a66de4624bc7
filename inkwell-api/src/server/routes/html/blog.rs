use crate::server::{
    ServerError, ServerRouter, Settings,
    auth::Viewer,
    extract::{Form, Query},
    routes::{
        api::{
            PostListQuery,
            comments::{add_comment, react_to_comment},
            non_empty,
            posts::{react_to_post, read_post, toggle_bookmark, visible_post},
        },
        html::{Flash, HtmlResult, login_required, redirect_with_flash, render},
    },
};
use axum::{Router, extract::State, response::Response};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use inkwell_common::model::{
    Id,
    comment::CommentMarker,
    page::PageRequest,
    post::{PostFilter, PostScope, PostSort},
    reaction::{ReactionKind, ReactionToggle},
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tera::{Context, Tera};

pub const HOME_LATEST_POSTS: i64 = 6;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(home)
        .typed_get(post_list)
        .typed_get(category_posts)
        .typed_get(tag_posts)
        .typed_get(series_posts)
        .typed_get(post_detail)
        .typed_post(post_comment)
        .typed_post(delete_comment)
        .typed_post(like_post)
        .typed_post(dislike_post)
        .typed_post(bookmark_post)
        .typed_post(like_comment)
        .typed_post(dislike_comment)
}

/// One page of a post listing. `base_path` is where the pagination links point.
struct Listing {
    heading: String,
    base_path: String,
    filter: PostFilter,
    page: PageRequest,
}

async fn render_listing(
    db: &DbClient,
    templates: &Tera,
    jar: CookieJar,
    viewer: &Viewer,
    listing: Listing,
) -> HtmlResult<Response> {
    let Listing {
        heading,
        base_path,
        filter,
        page,
    } = listing;
    let posts = db.list_posts(&filter, page).await?;
    let categories = db.list_categories().await?;

    let mut context = Context::new();
    context.insert("heading", &heading);
    context.insert("base_path", &base_path);
    context.insert("page", &posts.map(|post| post.summary()));
    context.insert("categories", &categories);
    context.insert("search", &filter.search);
    context.insert("sort", &filter.sort);
    context.insert("category", &filter.category);
    context.insert("tag", &filter.tag);
    context.insert("author", &filter.author);
    render(templates, jar, viewer.user(), "post_list.html", context)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct HomePath();

async fn home(
    HomePath(): HomePath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let latest = db
        .latest_posts(&PostFilter::new(PostScope::Public), HOME_LATEST_POSTS)
        .await?;
    let categories = db.list_categories().await?;
    let stats = db.site_stats().await?;

    let mut context = Context::new();
    context.insert(
        "latest_posts",
        &latest.iter().map(|post| post.summary()).collect::<Vec<_>>(),
    );
    context.insert("categories", &categories);
    context.insert("stats", &stats);
    render(&templates, jar, viewer.user(), "home.html", context)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/", rejection(ServerError))]
struct PostListPath();

async fn post_list(
    PostListPath(): PostListPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(query): Query<PostListQuery>,
) -> HtmlResult<Response> {
    let (filter, page) = query.into_filter(PostScope::Listing {
        viewer: viewer.user_id(),
    });
    let heading = match &filter.search {
        Some(search) => format!("Search results for \"{search}\""),
        None => "All posts".to_owned(),
    };

    let listing = Listing {
        heading,
        base_path: "/blog/".to_owned(),
        filter,
        page,
    };
    render_listing(&db, &templates, jar, &viewer, listing).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/category/{slug}/", rejection(ServerError))]
struct CategoryPostsPath {
    slug: String,
}

async fn category_posts(
    CategoryPostsPath { slug }: CategoryPostsPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(query): Query<PostListQuery>,
) -> HtmlResult<Response> {
    let category = db
        .fetch_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::CategoryNotFound(slug.clone()))?;
    let (filter, page) = query.into_filter(PostScope::Public);
    let filter = PostFilter {
        category: Some(category.slug.clone()),
        ..filter
    };

    let listing = Listing {
        heading: format!("Category: {}", category.name.get()),
        base_path: format!("/blog/category/{}/", category.slug),
        filter,
        page,
    };
    render_listing(&db, &templates, jar, &viewer, listing).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/tag/{slug}/", rejection(ServerError))]
struct TagPostsPath {
    slug: String,
}

async fn tag_posts(
    TagPostsPath { slug }: TagPostsPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(query): Query<PostListQuery>,
) -> HtmlResult<Response> {
    let tag = db
        .fetch_tag_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::TagNotFound(slug.clone()))?;
    let (filter, page) = query.into_filter(PostScope::Public);
    let filter = PostFilter {
        tag: Some(tag.slug.clone()),
        ..filter
    };

    let listing = Listing {
        heading: format!("Tag: {}", tag.name.get()),
        base_path: format!("/blog/tag/{}/", tag.slug),
        filter,
        page,
    };
    render_listing(&db, &templates, jar, &viewer, listing).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/series/{slug}/", rejection(ServerError))]
struct SeriesPostsPath {
    slug: String,
}

async fn series_posts(
    SeriesPostsPath { slug }: SeriesPostsPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(query): Query<PostListQuery>,
) -> HtmlResult<Response> {
    let series = db
        .fetch_series_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::SeriesNotFound(slug.clone()))?;
    let (filter, page) = query.into_filter(PostScope::Public);
    let filter = PostFilter {
        series: Some(series.slug.clone()),
        sort: PostSort::Series,
        ..filter
    };

    let listing = Listing {
        heading: format!("Series: {}", series.title.get()),
        base_path: format!("/blog/series/{}/", series.slug),
        filter,
        page,
    };
    render_listing(&db, &templates, jar, &viewer, listing).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/", rejection(ServerError))]
struct PostDetailPath {
    slug: String,
}

async fn post_detail(
    PostDetailPath { slug }: PostDetailPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let post = visible_post(&db, &slug, viewer.user_id()).await?;
    let is_author = viewer.user_id().is_some_and(|user| post.is_authored_by(user));
    let detail = read_post(&db, post).await?;

    let mut context = Context::new();
    context.insert("post", &detail);
    context.insert("is_author", &is_author);
    render(&templates, jar, viewer.user(), "post_detail.html", context)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct CommentForm {
    #[serde(default)]
    content: String,
    parent: Option<String>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/comment", rejection(ServerError))]
struct PostCommentPath {
    slug: String,
}

async fn post_comment(
    PostCommentPath { slug }: PostCommentPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<CommentForm>,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    let post = visible_post(&db, &slug, Some(user)).await?;
    let target = format!("/blog/{}/", post.slug);

    let parent = match non_empty(form.parent).map(|parent| parent.trim().parse::<u64>()) {
        None => None,
        Some(Ok(parent)) => Some(Id::<CommentMarker>::from(parent)),
        Some(Err(_)) => {
            let flash = Flash::error("The parent comment is invalid.");
            return Ok(redirect_with_flash(jar, &settings, &target, &flash));
        }
    };

    let flash = match add_comment(&db, &post, user, &form.content, parent).await {
        Ok(_) => Flash::success("Your comment was posted."),
        Err(err @ ServerError::Validation(_)) => Flash::from_error(&err),
        Err(err) => return Err(err.into()),
    };
    Ok(redirect_with_flash(jar, &settings, &target, &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/comment/{id}/delete", rejection(ServerError))]
struct DeleteCommentPath {
    id: Id<CommentMarker>,
}

async fn delete_comment(
    DeleteCommentPath { id }: DeleteCommentPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    let comment = db
        .fetch_comment(id)
        .await?
        .filter(|comment| comment.is_active)
        .ok_or(ServerError::CommentNotFound(id))?;
    let post = db
        .fetch_post(comment.post)
        .await?
        .ok_or(ServerError::PostByIdNotFound(comment.post))?;
    let target = format!("/blog/{}/", post.slug);

    let flash = if comment.author.id == user {
        db.soft_delete_comment(id).await?;
        Flash::success("Your comment was deleted.")
    } else {
        Flash::error("You can only delete your own comments.")
    };
    Ok(redirect_with_flash(jar, &settings, &target, &flash))
}

/// The confirmation shown after toggling a reaction on a post or comment.
fn reaction_flash(toggle: &ReactionToggle, target: &str) -> Flash {
    let message = match (toggle.liked, toggle.disliked) {
        (Some(true), _) => format!("You liked this {target}."),
        (Some(false), _) => format!("You no longer like this {target}."),
        (_, Some(true)) => format!("You disliked this {target}."),
        _ => format!("You no longer dislike this {target}."),
    };
    Flash::success(message)
}

async fn post_reaction(
    db: &DbClient,
    settings: &Settings,
    viewer: &Viewer,
    jar: CookieJar,
    slug: &str,
    kind: ReactionKind,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, settings));
    };
    let toggle = react_to_post(db, slug, user, kind).await?;

    let target = format!("/blog/{slug}/");
    Ok(redirect_with_flash(jar, settings, &target, &reaction_flash(&toggle, "post")))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/like", rejection(ServerError))]
struct LikePostPath {
    slug: String,
}

async fn like_post(
    LikePostPath { slug }: LikePostPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    post_reaction(&db, &settings, &viewer, jar, &slug, ReactionKind::Like).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/dislike", rejection(ServerError))]
struct DislikePostPath {
    slug: String,
}

async fn dislike_post(
    DislikePostPath { slug }: DislikePostPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    post_reaction(&db, &settings, &viewer, jar, &slug, ReactionKind::Dislike).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/bookmark", rejection(ServerError))]
struct BookmarkPostPath {
    slug: String,
}

async fn bookmark_post(
    BookmarkPostPath { slug }: BookmarkPostPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    let status = toggle_bookmark(&db, &slug, user).await?;

    let target = format!("/blog/{slug}/");
    Ok(redirect_with_flash(jar, &settings, &target, &Flash::success(status.message)))
}

async fn comment_reaction(
    db: &DbClient,
    settings: &Settings,
    viewer: &Viewer,
    jar: CookieJar,
    id: Id<CommentMarker>,
    kind: ReactionKind,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, settings));
    };
    let (comment, toggle) = react_to_comment(db, id, user, kind).await?;
    let post = db
        .fetch_post(comment.post)
        .await?
        .ok_or(ServerError::PostByIdNotFound(comment.post))?;

    let target = format!("/blog/{}/", post.slug);
    Ok(redirect_with_flash(jar, settings, &target, &reaction_flash(&toggle, "comment")))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/comment/{id}/like", rejection(ServerError))]
struct LikeCommentPath {
    id: Id<CommentMarker>,
}

async fn like_comment(
    LikeCommentPath { id }: LikeCommentPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    comment_reaction(&db, &settings, &viewer, jar, id, ReactionKind::Like).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/comment/{id}/dislike", rejection(ServerError))]
struct DislikeCommentPath {
    id: Id<CommentMarker>,
}

async fn dislike_comment(
    DislikeCommentPath { id }: DislikeCommentPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    comment_reaction(&db, &settings, &viewer, jar, id, ReactionKind::Dislike).await
}

#[cfg(test)]
mod tests {
    use crate::server::routes::html::blog::reaction_flash;
    use inkwell_common::model::reaction::{ReactionCounts, ReactionKind, ReactionToggle};

    #[test]
    fn reaction_flash_follows_the_toggle() {
        let counts = ReactionCounts::default();
        let liked = ReactionToggle::new(ReactionKind::Like, Some(ReactionKind::Like), counts);
        assert_eq!(reaction_flash(&liked, "post").message, "You liked this post.");

        let unliked = ReactionToggle::new(ReactionKind::Like, None, counts);
        assert_eq!(reaction_flash(&unliked, "post").message, "You no longer like this post.");

        let switched = ReactionToggle::new(ReactionKind::Dislike, Some(ReactionKind::Dislike), counts);
        assert_eq!(reaction_flash(&switched, "comment").message, "You disliked this comment.");
    }
}
