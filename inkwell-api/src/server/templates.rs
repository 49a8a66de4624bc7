//! Page templates, compiled into the binary.

use tera::Tera;

pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates([
        ("base.html", include_str!("../../templates/base.html")),
        ("home.html", include_str!("../../templates/home.html")),
        ("post_list.html", include_str!("../../templates/post_list.html")),
        ("post_detail.html", include_str!("../../templates/post_detail.html")),
        ("post_form.html", include_str!("../../templates/post_form.html")),
        (
            "post_confirm_delete.html",
            include_str!("../../templates/post_confirm_delete.html"),
        ),
        ("category_form.html", include_str!("../../templates/category_form.html")),
        ("register.html", include_str!("../../templates/register.html")),
        ("login.html", include_str!("../../templates/login.html")),
        ("profile.html", include_str!("../../templates/profile.html")),
        ("profile_edit.html", include_str!("../../templates/profile_edit.html")),
        ("user_list.html", include_str!("../../templates/user_list.html")),
        ("notifications.html", include_str!("../../templates/notifications.html")),
    ])?;
    Ok(tera)
}

#[cfg(test)]
mod tests {
    use crate::server::templates::load;
    use serde_json::json;
    use tera::Context;

    #[test]
    fn templates_compile() {
        let tera = load().unwrap();
        assert!(tera.get_template_names().any(|name| name == "post_detail.html"));
    }

    #[test]
    fn login_page_renders_without_a_viewer() {
        let tera = load().unwrap();
        let mut context = Context::new();
        context.insert("viewer", &Option::<()>::None);
        context.insert("flash", &Option::<()>::None);
        let html = tera.render("login.html", &context).unwrap();
        assert!(html.contains("name=\"username\""));
        assert!(html.contains("action=\"/accounts/login\""));
    }

    #[test]
    fn post_form_keeps_the_selected_category_and_errors() {
        let tera = load().unwrap();
        let mut context = Context::new();
        context.insert("viewer", &Option::<()>::None);
        context.insert("flash", &Option::<()>::None);
        context.insert("heading", "New post");
        context.insert("action", "/blog/create/");
        context.insert(
            "form",
            &json!({"title": "Draft", "content": "", "category": "7", "tags": "rust, web", "thumbnail": "", "published": null}),
        );
        context.insert(
            "categories",
            &json!([{"id": 7, "name": "Rust"}, {"id": 8, "name": "Web"}]),
        );
        context.insert("errors", &["content: Content may not be blank."]);
        let html = tera.render("post_form.html", &context).unwrap();
        assert!(html.contains("<option value=\"7\" selected>Rust</option>"));
        assert!(html.contains("<option value=\"8\" >Web</option>"));
        assert!(html.contains("<li>content: Content may not be blank.</li>"));
        assert!(!html.contains("checked"));
    }

    #[test]
    fn profile_offers_follow_only_to_other_viewers() {
        let tera = load().unwrap();
        let profile = json!({
            "id": 1, "username": "ada", "profile_image": null, "bio": "",
            "date_joined": "2025-01-01T00:00:00Z", "post_count": 0, "comment_count": 0,
            "followers_count": 3, "following_count": 1,
        });
        let mut context = Context::new();
        context.insert("flash", &Option::<()>::None);
        context.insert("full_name", "Ada");
        context.insert("profile", &profile);
        context.insert("posts", &Vec::<()>::new());
        context.insert("is_following", &true);

        context.insert("viewer", &json!({"id": 2, "username": "grace"}));
        let html = tera.render("profile.html", &context).unwrap();
        assert!(html.contains("action=\"/accounts/profile/ada/follow\""));
        assert!(html.contains("Unfollow"));
        assert!(!html.contains("/accounts/profile/ada/edit"));

        context.insert("viewer", &json!({"id": 1, "username": "ada"}));
        let html = tera.render("profile.html", &context).unwrap();
        assert!(html.contains("/accounts/profile/ada/edit"));
        assert!(!html.contains("/follow\""));
        assert!(html.contains("/accounts/profile/ada/followers"));
    }
}
