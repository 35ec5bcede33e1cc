use std::str::FromStr;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use rand::RngCore;
use serde::Serialize;
use sqlx::{
    FromRow, QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{BackendError, BackendResult},
    models::{Identity, Message, Profile, ProfileUpdate},
};

use super::{Backend, ChangeEvent, ChangeKind, ChangeStream, PushChannel, Table};

const SCHEMA: &str = include_str!("schema.sql");

macro_rules! profile_columns {
    () => {
        "id,name,email,avatar_url,bio,about,class,section,batch,hobby,website,social_handle,is_admin,created_at"
    };
}

#[derive(FromRow)]
struct ProfileRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    about: Option<String>,
    class: Option<String>,
    section: Option<String>,
    batch: Option<String>,
    hobby: Option<String>,
    website: Option<String>,
    social_handle: Option<String>,
    is_admin: bool,
    created_at: i64,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = BackendError;

    fn try_from(row: ProfileRow) -> BackendResult<Profile> {
        Ok(Profile {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            avatar_url: row.avatar_url,
            bio: row.bio,
            about: row.about,
            class: row.class,
            section: row.section,
            batch: row.batch,
            hobby: row.hobby,
            website: row.website,
            social_handle: row.social_handle,
            is_admin: row.is_admin,
            created_at: from_millis(row.created_at)?,
        })
    }
}

type MessageRow = (i64, String, String, i64);

fn message_from_row((id, user_id, content, created_at): MessageRow) -> BackendResult<Message> {
    Ok(Message {
        id,
        user_id: parse_uuid(&user_id)?,
        content,
        created_at: from_millis(created_at)?,
    })
}

/// Row store, identity provider and push channel on top of SQLite.
pub struct SqliteBackend {
    db_pool: SqlitePool,
    push: PushChannel,
    // held from commit to publish so subscribers see commit order
    publish_lock: Mutex<()>,
}

impl SqliteBackend {
    pub async fn connect(database_url: &str) -> BackendResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        info!(database_url, "connected to database");
        Self::from_pool(db_pool).await
    }

    /// A private database that lives as long as the backend does.
    pub async fn in_memory() -> BackendResult<Self> {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(db_pool).await
    }

    pub async fn from_pool(db_pool: SqlitePool) -> BackendResult<Self> {
        sqlx::raw_sql(SCHEMA).execute(&db_pool).await?;

        Ok(Self {
            db_pool,
            push: PushChannel::new(),
            publish_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    /// Close the pool; every later call fails with a database error.
    pub async fn close(&self) {
        self.db_pool.close().await;
    }

    /// Grant or revoke the administrator flag.
    pub async fn set_admin(&self, id: Uuid, is_admin: bool) -> BackendResult<()> {
        let result = sqlx::query("UPDATE profiles SET is_admin=? WHERE id=?")
            .bind(is_admin)
            .bind(id.to_string())
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound(format!("profile {id}")));
        }
        Ok(())
    }

    fn publish<T: Serialize>(
        &self,
        table: Table,
        kind: ChangeKind,
        record: &T,
    ) -> BackendResult<()> {
        let record = serde_json::to_value(record)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        self.push.publish(ChangeEvent { table, kind, record });
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id,email,password_hash FROM users WHERE email=?")
                .bind(email.trim())
                .fetch_optional(&self.db_pool)
                .await?;

        let Some((id, email, password_hash)) = row else {
            return Err(BackendError::InvalidCredentials);
        };

        if !verify_password(password.to_owned(), password_hash).await? {
            return Err(BackendError::InvalidCredentials);
        }

        Ok(Identity {
            id: parse_uuid(&id)?,
            email,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> BackendResult<Identity> {
        let email = email.trim();
        let password_hash = hash_password(password.to_owned()).await?;
        let id = Uuid::new_v4();

        let _guard = self.publish_lock.lock().await;
        let inserted = sqlx::query(
            "INSERT INTO users (id,email,password_hash,display_name,created_at) VALUES (?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(now_millis())
        .execute(&self.db_pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(BackendError::Conflict(format!("{email} is already registered")));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(profile) = self.select_profile(id).await? {
            self.publish(Table::Profiles, ChangeKind::Insert, &profile)?;
        }

        info!(user_id = %id, "registered new identity");
        Ok(Identity {
            id,
            email: email.to_owned(),
        })
    }

    async fn select_profile(&self, id: Uuid) -> BackendResult<Option<Profile>> {
        sqlx::query_as::<_, ProfileRow>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM profiles WHERE id=?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db_pool)
        .await?
        .map(Profile::try_from)
        .transpose()
    }

    async fn select_profiles(&self) -> BackendResult<Vec<Profile>> {
        sqlx::query_as::<_, ProfileRow>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM profiles ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(Profile::try_from)
        .collect()
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile> {
        let _guard = self.publish_lock.lock().await;

        if !update.is_empty() {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE profiles SET ");
            let mut fields = builder.separated(", ");
            for (column, value) in update.columns() {
                fields.push(column);
                fields.push_unseparated(" = ");
                fields.push_bind_unseparated(value);
            }
            builder.push(" WHERE id = ");
            builder.push_bind(id.to_string());

            let result = builder.build().execute(&self.db_pool).await?;
            if result.rows_affected() == 0 {
                return Err(BackendError::NotFound(format!("profile {id}")));
            }
        }

        let profile = self
            .select_profile(id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("profile {id}")))?;

        if !update.is_empty() {
            self.publish(Table::Profiles, ChangeKind::Update, &profile)?;
        }
        Ok(profile)
    }

    async fn select_messages(&self) -> BackendResult<Vec<Message>> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT id,user_id,content,created_at FROM messages ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(message_from_row)
        .collect()
    }

    async fn select_message(&self, id: i64) -> BackendResult<Option<Message>> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT id,user_id,content,created_at FROM messages WHERE id=?",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .map(message_from_row)
        .transpose()
    }

    async fn insert_message(&self, user_id: Uuid, content: &str) -> BackendResult<Message> {
        let _guard = self.publish_lock.lock().await;

        let created_at = now_millis();
        let result = sqlx::query("INSERT INTO messages (user_id,content,created_at) VALUES (?,?,?)")
            .bind(user_id.to_string())
            .bind(content)
            .bind(created_at)
            .execute(&self.db_pool)
            .await?;

        let message = Message {
            id: result.last_insert_rowid(),
            user_id,
            content: content.to_owned(),
            created_at: from_millis(created_at)?,
        };
        self.publish(Table::Messages, ChangeKind::Insert, &message)?;

        debug!(message_id = message.id, user_id = %user_id, "message committed");
        Ok(message)
    }

    fn subscribe(&self, table: Table, kind: ChangeKind) -> ChangeStream {
        self.push.subscribe(table, kind)
    }
}

async fn hash_password(password: String) -> BackendResult<String> {
    tokio::task::spawn_blocking(move || {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| BackendError::Hash(e.to_string()))?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| BackendError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| BackendError::Hash(e.to_string()))?
}

async fn verify_password(password: String, password_hash: String) -> BackendResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| BackendError::Hash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| BackendError::Hash(e.to_string()))?
}

fn parse_uuid(value: &str) -> BackendResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| BackendError::Malformed(format!("id {value}: {e}")))
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> BackendResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(|e| BackendError::Malformed(format!("timestamp {millis}: {e}")))
}
