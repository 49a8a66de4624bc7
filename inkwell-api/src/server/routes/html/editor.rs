//! Post and category authoring pages.

use crate::server::{
    ServerError, ServerRouter, Settings,
    auth::Viewer,
    extract::Form,
    routes::{
        api::{
            posts::{NewPost, PostChanges, edit_post, publish_post, remove_post, visible_post},
            taxonomy::{NewCategory, add_category},
        },
        html::{Flash, HtmlResult, login_required, redirect_with_flash, render},
    },
};
use axum::{Router, extract::State, response::Response};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use inkwell_common::{
    form::FieldErrors,
    model::{Id, category::CategoryMarker, post::Post},
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::{Context, Tera};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(new_post_page)
        .typed_post(create_post)
        .typed_get(edit_post_page)
        .typed_post(update_post)
        .typed_get(delete_post_page)
        .typed_post(delete_post)
        .typed_get(new_category_page)
        .typed_post(create_category)
}

/// The post editor's fields, as submitted and as shown again.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub(crate) struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// A category id, or empty for none.
    #[serde(default)]
    pub category: String,
    /// Comma separated tag names.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Present only when the checkbox is ticked.
    pub published: Option<String>,
}

impl PostForm {
    fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.get().to_owned(),
            content: post.content.clone(),
            category: post
                .category
                .as_ref()
                .map(|category| category.id.to_string())
                .unwrap_or_default(),
            tags: post
                .tags
                .iter()
                .map(|tag| tag.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            thumbnail: post.thumbnail.clone().unwrap_or_default(),
            published: post.published.then(|| "on".to_owned()),
        }
    }

    fn category_id(&self) -> Result<Option<Id<CategoryMarker>>, ServerError> {
        let category = self.category.trim();
        if category.is_empty() {
            return Ok(None);
        }
        category
            .parse::<u64>()
            .map(|id| Some(Id::from(id)))
            .map_err(|_| ServerError::field("category", "Select a valid category."))
    }

    fn tag_names(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn thumbnail(&self) -> Option<String> {
        Some(self.thumbnail.trim())
            .filter(|thumbnail| !thumbnail.is_empty())
            .map(str::to_owned)
    }

    pub fn to_new_post(&self) -> Result<NewPost, ServerError> {
        Ok(NewPost {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id()?,
            series_id: None,
            series_order: None,
            tags: self.tag_names(),
            thumbnail: self.thumbnail(),
            published: self.published.is_some(),
        })
    }

    /// Every editor field is submitted, so every field is replaced. The series
    /// is not part of the editor and stays as it is.
    pub fn to_changes(&self) -> Result<PostChanges, ServerError> {
        Ok(PostChanges {
            title: Some(self.title.clone()),
            content: Some(self.content.clone()),
            category_id: Some(self.category_id()?),
            series_id: None,
            series_order: None,
            tags: Some(self.tag_names()),
            thumbnail: Some(self.thumbnail()),
            published: Some(self.published.is_some()),
        })
    }
}

struct EditorPage<'a> {
    heading: &'a str,
    action: String,
    form: &'a PostForm,
    errors: Option<&'a FieldErrors>,
}

async fn render_editor(
    db: &DbClient,
    templates: &Tera,
    jar: CookieJar,
    viewer: &Viewer,
    page: EditorPage<'_>,
) -> HtmlResult<Response> {
    let categories = db.list_categories().await?;

    let mut context = Context::new();
    context.insert("heading", page.heading);
    context.insert("action", &page.action);
    context.insert("form", page.form);
    context.insert("categories", &categories);
    context.insert(
        "errors",
        &page.errors.map(FieldErrors::lines).unwrap_or_default(),
    );
    render(templates, jar, viewer.user(), "post_form.html", context)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/create/", rejection(ServerError))]
struct CreatePostPath();

async fn new_post_page(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    if viewer.user().is_none() {
        return Ok(login_required(jar, &settings));
    }

    let form = PostForm {
        published: Some("on".to_owned()),
        ..PostForm::default()
    };
    let page = EditorPage {
        heading: "New post",
        action: "/blog/create/".to_owned(),
        form: &form,
        errors: None,
    };
    render_editor(&db, &templates, jar, &viewer, page).await
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };

    let created = match form.to_new_post() {
        Ok(new_post) => publish_post(&db, user, new_post).await,
        Err(err) => Err(err),
    };
    match created {
        Ok(post) => {
            let flash = Flash::success("Your post was created.");
            Ok(redirect_with_flash(jar, &settings, &format!("/blog/{}/", post.slug), &flash))
        }
        Err(ServerError::Validation(errors)) => {
            let page = EditorPage {
                heading: "New post",
                action: "/blog/create/".to_owned(),
                form: &form,
                errors: Some(&errors),
            };
            render_editor(&db, &templates, jar, &viewer, page).await
        }
        Err(err) => Err(err.into()),
    }
}

/// The post behind `slug`, or a redirect for anyone but its author.
async fn authored_post(
    db: &DbClient,
    settings: &Settings,
    viewer: &Viewer,
    jar: CookieJar,
    slug: &str,
) -> HtmlResult<Result<(Post, CookieJar), Response>> {
    let Some(user) = viewer.user_id() else {
        return Ok(Err(login_required(jar, settings)));
    };
    let post = visible_post(db, slug, Some(user)).await?;
    if !post.is_authored_by(user) {
        let flash = Flash::error("You can only change your own posts.");
        let target = format!("/blog/{}/", post.slug);
        return Ok(Err(redirect_with_flash(jar, settings, &target, &flash)));
    }
    Ok(Ok((post, jar)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/edit/", rejection(ServerError))]
struct EditPostPath {
    slug: String,
}

async fn edit_post_page(
    EditPostPath { slug }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let (post, jar) = match authored_post(&db, &settings, &viewer, jar, &slug).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };

    let form = PostForm::from_post(&post);
    let page = EditorPage {
        heading: "Edit post",
        action: format!("/blog/{}/edit/", post.slug),
        form: &form,
        errors: None,
    };
    render_editor(&db, &templates, jar, &viewer, page).await
}

async fn update_post(
    EditPostPath { slug }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> HtmlResult<Response> {
    let (post, jar) = match authored_post(&db, &settings, &viewer, jar, &slug).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };
    let author = post.author.id;
    let action = format!("/blog/{}/edit/", post.slug);

    let updated = match form.to_changes() {
        Ok(changes) => edit_post(&db, post, author, changes).await,
        Err(err) => Err(err),
    };
    match updated {
        Ok(post) => {
            let flash = Flash::success("Your post was updated.");
            Ok(redirect_with_flash(jar, &settings, &format!("/blog/{}/", post.slug), &flash))
        }
        Err(ServerError::Validation(errors)) => {
            let page = EditorPage {
                heading: "Edit post",
                action,
                form: &form,
                errors: Some(&errors),
            };
            render_editor(&db, &templates, jar, &viewer, page).await
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/{slug}/delete/", rejection(ServerError))]
struct DeletePostPath {
    slug: String,
}

async fn delete_post_page(
    DeletePostPath { slug }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let (post, jar) = match authored_post(&db, &settings, &viewer, jar, &slug).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };

    let mut context = Context::new();
    context.insert("post", &post.summary());
    render(&templates, jar, viewer.user(), "post_confirm_delete.html", context)
}

async fn delete_post(
    DeletePostPath { slug }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let (post, jar) = match authored_post(&db, &settings, &viewer, jar, &slug).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };
    remove_post(&db, &post, post.author.id).await?;

    let flash = Flash::success("Your post was deleted.");
    Ok(redirect_with_flash(jar, &settings, "/blog/", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blog/category/create/", rejection(ServerError))]
struct CreateCategoryPath();

fn category_page(
    templates: &Tera,
    jar: CookieJar,
    viewer: &Viewer,
    form: &NewCategory,
    errors: Option<&FieldErrors>,
) -> HtmlResult<Response> {
    let mut context = Context::new();
    context.insert("name", &form.name);
    context.insert("description", &form.description);
    context.insert("errors", &errors.map(FieldErrors::lines).unwrap_or_default());
    render(templates, jar, viewer.user(), "category_form.html", context)
}

async fn new_category_page(
    CreateCategoryPath(): CreateCategoryPath,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    if viewer.user().is_none() {
        return Ok(login_required(jar, &settings));
    }

    category_page(&templates, jar, &viewer, &NewCategory::default(), None)
}

async fn create_category(
    CreateCategoryPath(): CreateCategoryPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<NewCategory>,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };

    match add_category(&db, user, form.clone()).await {
        Ok(category) => {
            let flash = Flash::success(format!("The category {} was created.", category.name.get()));
            Ok(redirect_with_flash(jar, &settings, "/blog/create/", &flash))
        }
        Err(ServerError::Validation(errors)) => {
            category_page(&templates, jar, &viewer, &form, Some(&errors))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use crate::server::routes::html::editor::PostForm;
    use inkwell_common::model::Id;

    #[test]
    fn unticked_checkbox_means_unpublished() {
        let form = PostForm {
            title: "Hello".to_owned(),
            content: "World".to_owned(),
            tags: "rust, axum ,,".to_owned(),
            ..PostForm::default()
        };
        let new_post = form.to_new_post().unwrap();
        assert!(!new_post.published);
        assert_eq!(new_post.tags, ["rust", "axum"]);
        assert_eq!(new_post.category_id, None);
        assert_eq!(new_post.thumbnail, None);

        let form = PostForm {
            category: " 7 ".to_owned(),
            published: Some("on".to_owned()),
            ..form
        };
        let new_post = form.to_new_post().unwrap();
        assert!(new_post.published);
        assert_eq!(new_post.category_id, Some(Id::from(7)));
    }

    #[test]
    fn editor_changes_replace_every_field_but_the_series() {
        let form = PostForm {
            title: "Hello".to_owned(),
            content: "World".to_owned(),
            thumbnail: "  ".to_owned(),
            ..PostForm::default()
        };
        let changes = form.to_changes().unwrap();
        assert_eq!(changes.category_id, Some(None));
        assert_eq!(changes.thumbnail, Some(None));
        assert_eq!(changes.published, Some(false));
        assert_eq!(changes.tags, Some(Vec::new()));
        assert_eq!(changes.series_id, None);
    }

    #[test]
    fn bad_category_is_a_field_error() {
        let form = PostForm {
            category: "general".to_owned(),
            ..PostForm::default()
        };
        let err = form.to_new_post().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
