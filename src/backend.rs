use std::path::Path;

use log::{error, info};
use sqlx::{
    migrate::Migrator,
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::post::Post;
use crate::time::Timestamp;
use crate::user::User;

type Result<T> = std::result::Result<T, ()>;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// SQLITE_CONSTRAINT_UNIQUE, sqlx reports the extended result code
const UNIQUE_VIOLATION: &str = "2067";

#[derive(Debug, PartialEq, Eq)]
pub enum InsertError {
    Duplicate,
    Internal,
}

pub struct Backend(Pool<Sqlite>);

impl Backend {
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("couldn't open {}: {e}", db_path.display());
            })?;

        info!("Using {}", db_path.display());

        let backend = Self(pool);
        backend.migrate().await?;
        Ok(backend)
    }

    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.0).await.map_err(|e| {
            error!("migration: {e}");
        })
    }

    /// Drop every table, then recreate the schema.
    pub async fn reset(&self) -> Result<()> {
        let mut tx = self.0.begin().await.map_err(|e| {
            error!("reset: couldn't begin: {e}");
        })?;

        for statement in [
            "DROP TABLE IF EXISTS post",
            "DROP TABLE IF EXISTS user",
            "DROP TABLE IF EXISTS _sqlx_migrations",
        ] {
            query(statement).execute(&mut tx).await.map_err(|e| {
                error!("{statement}: {e}");
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("reset: couldn't commit: {e}");
        })?;

        info!("schema dropped, recreating");
        self.migrate().await
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = e else {
        return false;
    };

    db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
}

impl Backend {
    pub async fn insert_user(
        &self,
        username: &str,
        pwhash: &str,
    ) -> std::result::Result<i64, InsertError> {
        query(
            "
            INSERT INTO user
            (username, password)
            VALUES
            (?, ?)
            ",
        )
        .bind(username)
        .bind(pwhash)
        .execute(&self.0)
        .await
        .map(|done| done.last_insert_rowid())
        .map_err(|e| {
            if is_unique_violation(&e) {
                InsertError::Duplicate
            } else {
                error!("error inserting user {username}: {e:?}");
                InsertError::Internal
            }
        })
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
        query_as::<_, User>(
            "
            SELECT id, username, password
            FROM user
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for user {username}: {e:?}");
        })
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        query_as::<_, User>(
            "
            SELECT id, username, password
            FROM user
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for user #{id}: {e:?}");
        })
    }
}

impl Backend {
    pub async fn posts(&self) -> Result<Vec<Post>> {
        query_as::<_, Post>(
            "
            SELECT post.id, title, body, created, author_id, username
            FROM post
            INNER JOIN user
                ON post.author_id = user.id
            ORDER BY created DESC, post.id DESC
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting posts: {e:?}");
        })
    }

    pub async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        query_as::<_, Post>(
            "
            SELECT post.id, title, body, created, author_id, username
            FROM post
            INNER JOIN user
                ON post.author_id = user.id
            WHERE post.id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting post #{id}: {e:?}");
        })
    }

    pub async fn insert_post(
        &self,
        author_id: i64,
        title: &str,
        body: &str,
        created: Timestamp,
    ) -> Result<i64> {
        query(
            "
            INSERT INTO post
            (title, body, author_id, created)
            VALUES
            (?, ?, ?, ?)
            ",
        )
        .bind(title)
        .bind(body)
        .bind(author_id)
        .bind(created)
        .execute(&self.0)
        .await
        .map(|done| done.last_insert_rowid())
        .map_err(|e| {
            error!("error inserting post: {e:?}");
        })
    }

    pub async fn update_post(&self, id: i64, title: &str, body: &str) -> Result<()> {
        query(
            "
            UPDATE post
            SET title = ?, body = ?
            WHERE id = ?
            ",
        )
        .bind(title)
        .bind(body)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error updating post #{id}: {e:?}");
        })
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        query("DELETE FROM post WHERE id = ?")
            .bind(id)
            .execute(&self.0)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("error deleting post #{id}: {e:?}");
            })
    }
}
