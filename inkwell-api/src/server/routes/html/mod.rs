//! The server-rendered site.
//!
//! Pages read the viewer from the `session` cookie. Form submissions answer
//! with a redirect and leave a one-shot message in the `flash` cookie, which
//! the next rendered page shows and clears.

use crate::server::{ServerError, ServerRouter, Settings, auth::SESSION_COOKIE};
use axum::{
    Router,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use inkwell_common::model::user::User;
use inkwell_db::client::DbError;
use serde::Serialize;
use std::fmt::Display;
use tera::{Context, Tera};
use tracing::error;

mod accounts;
mod blog;
mod editor;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(blog::routes())
        .merge(editor::routes())
        .merge(accounts::routes())
}

pub const FLASH_COOKIE: &str = "flash";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

impl FlashLevel {
    fn as_str(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Display) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.to_string(),
        }
    }

    pub fn error(message: impl Display) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.to_string(),
        }
    }

    /// The message a failed form submission is reported with.
    pub fn from_error(error: &ServerError) -> Self {
        match error {
            ServerError::Validation(errors) => Self::error(errors.summary()),
            error => Self::error(error.public_message()),
        }
    }

    fn encode(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(format!("{}:{}", self.level.as_str(), self.message))
    }

    fn decode(value: &str) -> Option<Self> {
        let decoded = String::from_utf8(BASE64_URL_SAFE_NO_PAD.decode(value).ok()?).ok()?;
        let (level, message) = decoded.split_once(':')?;
        let level = match level {
            "success" => FlashLevel::Success,
            "error" => FlashLevel::Error,
            _ => return None,
        };
        Some(Self {
            level,
            message: message.to_owned(),
        })
    }
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

pub fn flash_cookie(flash: &Flash, settings: &Settings) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, flash.encode()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookies)
        .build()
}

pub fn session_cookie(token: String, settings: &Settings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookies)
        .max_age(settings.token_lifetime.get())
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(removal_cookie(SESSION_COOKIE))
}

/// Pops the pending flash message, if any.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(value) = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_owned()) else {
        return (jar, None);
    };
    (jar.remove(removal_cookie(FLASH_COOKIE)), Flash::decode(&value))
}

pub fn redirect_with_flash(jar: CookieJar, settings: &Settings, to: &str, flash: &Flash) -> Response {
    (jar.add(flash_cookie(flash, settings)), Redirect::to(to)).into_response()
}

pub fn login_required(jar: CookieJar, settings: &Settings) -> Response {
    redirect_with_flash(
        jar,
        settings,
        "/accounts/login",
        &Flash::error("Please log in to continue."),
    )
}

/// Renders `name` with the viewer and the pending flash message in scope.
pub fn render(
    templates: &Tera,
    jar: CookieJar,
    viewer: Option<&User>,
    name: &str,
    mut context: Context,
) -> HtmlResult<Response> {
    let (jar, flash) = take_flash(jar);
    context.insert("viewer", &viewer);
    context.insert("flash", &flash);
    let html = templates.render(name, &context)?;

    Ok((jar, Html(html)).into_response())
}

pub type HtmlResult<T> = std::result::Result<T, HtmlError>;

/// A [`ServerError`] answered with a plain HTML page.
#[derive(Debug)]
pub struct HtmlError(pub ServerError);

impl From<ServerError> for HtmlError {
    fn from(error: ServerError) -> Self {
        Self(error)
    }
}

impl From<DbError> for HtmlError {
    fn from(error: DbError) -> Self {
        Self(error.into())
    }
}

impl From<tera::Error> for HtmlError {
    fn from(error: tera::Error) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let status = self.0.status();

        error!(error = %self.0, %status, "Replying with error page");

        let title = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            "<!DOCTYPE html><html><head><title>{title}</title></head><body><h1>{code} {title}</h1><p>{message}</p><p><a href=\"/\">Back to the home page</a></p></body></html>",
            code = status.as_u16(),
            message = tera::escape_html(&self.0.public_message()),
        );
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::routes::html::{Flash, FlashLevel, take_flash};
    use axum_extra::extract::cookie::{Cookie, CookieJar};

    #[test]
    fn flash_survives_the_cookie() {
        let flash = Flash::success("Welcome back: nice to see you");
        let decoded = Flash::decode(&flash.encode()).unwrap();
        assert_eq!(decoded, flash);
        assert_eq!(Flash::decode("not base64!"), None);
    }

    #[test]
    fn taking_the_flash_clears_it() {
        let flash = Flash::error("Nope.");
        let jar = CookieJar::new().add(Cookie::new("flash", flash.encode()));
        let (jar, taken) = take_flash(jar);
        assert_eq!(taken.map(|flash| flash.level), Some(FlashLevel::Error));
        assert!(jar.get("flash").is_none());

        let (_, taken) = take_flash(CookieJar::new());
        assert_eq!(taken, None);
    }
}
