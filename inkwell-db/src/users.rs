use crate::{
    client::{DbClient, Result},
    query::USER_COLUMNS,
    record::{AuthenticationRecord, CredentialsRecord, UserProfileRecord, UserRecord},
};
use inkwell_common::{
    model::{
        Id, ModelValidationError,
        auth::{Session, SessionTokenHash},
        page::{Page, PageRequest},
        text::{Bio, PersonName},
        user::{CreateUser, Email, UpdateProfile, User, UserMarker, UserProfile},
    },
    password::PasswordHash,
};
use sqlx::{query, query_as, query_scalar};
use tracing::debug;

impl DbClient {
    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users.users WHERE users.user_snowflake = $1");
        let record = query_as::<_, UserRecord>(&sql)
            .bind(user_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users.users WHERE users.username = $1");
        let record = query_as::<_, UserRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// The user together with their stored password hash, for login.
    pub async fn fetch_credentials(&self, username: &str) -> Result<Option<(User, PasswordHash)>> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, users.password_hash FROM users.users WHERE users.username = $1"
        );
        let record = query_as::<_, CredentialsRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let credentials: Option<(User, PasswordHash)> = record.map(TryInto::try_into).transpose()?;
        Ok(credentials)
    }

    pub async fn fetch_password_hash(&self, user_id: Id<UserMarker>) -> Result<Option<PasswordHash>> {
        let stored: Option<String> =
            query_scalar("SELECT password_hash FROM users.users WHERE user_snowflake = $1")
                .bind(user_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

        let hash = stored
            .map(PasswordHash::from_stored)
            .transpose()
            .map_err(ModelValidationError::from)?;
        Ok(hash)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists = query_scalar("SELECT EXISTS (SELECT 1 FROM users.users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn email_exists(&self, email: &str, except: Option<Id<UserMarker>>) -> Result<bool> {
        let exists = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.users
                WHERE email = $1 AND ($2::BIGINT IS NULL OR user_snowflake <> $2)
            )
            ",
        )
        .bind(email)
        .bind(except.map(Id::to_db))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id::<UserMarker>()?;

        let sql = format!(
            "
            INSERT INTO users.users (user_snowflake, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        );
        let record = query_as::<_, UserRecord>(&sql)
            .bind(user_id.to_db())
            .bind(user.username.get())
            .bind(user.email.get())
            .bind(user.password_hash.as_str())
            .fetch_one(&self.pool)
            .await?;

        debug!(%user_id, username = user.username.get(), "Created user");
        Ok(record.try_into()?)
    }

    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        update: &UpdateProfile,
    ) -> Result<Option<User>> {
        let sql = format!(
            "
            UPDATE users.users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                profile_image = CASE WHEN $5 THEN $6 ELSE profile_image END,
                bio = COALESCE($7, bio)
            WHERE user_snowflake = $1
            RETURNING {USER_COLUMNS}
            "
        );
        let record = query_as::<_, UserRecord>(&sql)
            .bind(user_id.to_db())
            .bind(update.first_name.as_ref().map(PersonName::get))
            .bind(update.last_name.as_ref().map(PersonName::get))
            .bind(update.email.as_ref().map(Email::get))
            .bind(update.profile_image.is_some())
            .bind(update.profile_image.clone().flatten())
            .bind(update.bio.as_ref().map(Bio::get))
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Replaces the password hash and revokes every session except `keep`.
    pub async fn change_password(
        &self,
        user_id: Id<UserMarker>,
        password_hash: &PasswordHash,
        keep: Option<&SessionTokenHash>,
    ) -> Result<u64> {
        let mut transaction = self.pool.begin().await?;

        query("UPDATE users.users SET password_hash = $2 WHERE user_snowflake = $1")
            .bind(user_id.to_db())
            .bind(password_hash.as_str())
            .execute(&mut *transaction)
            .await?;

        let revoked = query(
            "
            DELETE FROM users.auth_tokens
            WHERE user_snowflake = $1 AND ($2::BYTEA IS NULL OR token_hash <> $2)
            ",
        )
        .bind(user_id.to_db())
        .bind(keep.map(|hash| hash.0.as_slice()))
        .execute(&mut *transaction)
        .await?
        .rows_affected();

        transaction.commit().await?;

        debug!(%user_id, revoked, "Changed password");
        Ok(revoked)
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
        let count: i64 = query_scalar("SELECT count(*) FROM users.users WHERE is_active")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "
            SELECT {USER_COLUMNS} FROM users.users
            WHERE users.is_active
            ORDER BY users.username
            LIMIT $1 OFFSET $2
            "
        );
        let records = query_as::<_, UserRecord>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(users, count, page)?)
    }

    /// The counts include drafts, unpublished posts and deleted comments.
    pub async fn fetch_profile(&self, username: &str) -> Result<Option<UserProfile>> {
        let sql = format!(
            "
            SELECT
                {USER_COLUMNS},
                (
                    SELECT count(*) FROM blog.posts
                    WHERE posts.author_snowflake = users.user_snowflake
                ) AS post_count,
                (
                    SELECT count(*) FROM blog.comments
                    WHERE comments.author_snowflake = users.user_snowflake
                ) AS comment_count,
                (
                    SELECT count(*) FROM users.follows
                    WHERE follows.following_snowflake = users.user_snowflake
                ) AS followers_count,
                (
                    SELECT count(*) FROM users.follows
                    WHERE follows.follower_snowflake = users.user_snowflake
                ) AS following_count
            FROM users.users
            WHERE users.username = $1
            "
        );
        let record = query_as::<_, UserProfileRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let profile = record.map(UserProfile::try_from).transpose()?;
        Ok(profile)
    }

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO users.auth_tokens (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(session.token_hash.0.as_slice())
        .bind(session.user.to_db())
        .bind(session.created_at)
        .bind(session.expires_after.map(|lifetime| lifetime.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth_tokens.user_snowflake,
                auth_tokens.token_hash,
                auth_tokens.created_at,
                auth_tokens.expires_after_seconds
            FROM
                users.auth_tokens
                JOIN users.users ON users.user_snowflake = auth_tokens.user_snowflake
            WHERE
                auth_tokens.token_hash = $1 AND users.is_active
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM users.auth_tokens WHERE token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}
