use crate::server::{Result, ServerError, Settings};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::{TypedHeader, extract::CookieJar};
use headers::{Authorization, authorization::Bearer};
use inkwell_common::model::{
    Id,
    auth::{Session, SessionToken, SessionTokenHash},
    user::{User, UserMarker},
};
use inkwell_db::client::DbClient;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Carries the same token string the API accepts as a bearer token.
pub const SESSION_COOKIE: &str = "session";

/// A caller that presented a valid `Authorization: Bearer` token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: SessionTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &SessionTokenHash {
        &self.token_hash
    }
}

/// Resolves a token string to the session it belongs to.
pub async fn verify_token(db: &DbClient, token: &str) -> Result<AuthenticatedUser> {
    let request_token: SessionToken = token.parse()?;
    let token_hash = request_token.hash()?;

    let session = db
        .fetch_session(&token_hash)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    if session.user != request_token.user_id || session.is_expired_at(OffsetDateTime::now_utc()) {
        return Err(ServerError::InvalidToken);
    }

    Ok(AuthenticatedUser {
        id: session.user,
        token_hash,
    })
}

/// Creates and stores a fresh session for `user`.
pub async fn issue_session(
    db: &DbClient,
    settings: &Settings,
    user: Id<UserMarker>,
) -> Result<SessionToken> {
    let token = SessionToken::generate_random(user);
    let session = Session {
        user,
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: Some(settings.token_lifetime),
    };
    db.create_session(&session).await?;

    debug!(%user, "Issued session");
    Ok(token)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;

        verify_token(&Arc::<DbClient>::from_ref(state), header.token()).await
    }
}

/// No header means anonymous. A header with a bad token is still rejected.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }

        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// The user behind the `session` cookie of an HTML request.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SessionUser {
    pub user: User,
    pub token_hash: SessionTokenHash,
}

/// The HTML viewer. A missing, stale or malformed cookie is treated as logged out.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Viewer(pub Option<SessionUser>);

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|session| &session.user)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Id<UserMarker>> {
        self.user().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned()) else {
            return Ok(Self(None));
        };

        let db = Arc::<DbClient>::from_ref(state);
        let authenticated = match verify_token(&db, &token).await {
            Ok(authenticated) => authenticated,
            Err(ServerError::Database(err)) => return Err(ServerError::Database(err)),
            Err(err) => {
                debug!(error = %err, "Ignoring invalid session cookie");
                return Ok(Self(None));
            }
        };

        let user = db
            .fetch_user(authenticated.user_id())
            .await?
            .filter(|user| user.is_active);
        Ok(Self(user.map(|user| SessionUser {
            user,
            token_hash: authenticated.token_hash,
        })))
    }
}
