use serde::Deserialize;

use crate::time::Timestamp;

/// A blog post joined with its author's name.
#[derive(Debug, Clone)]
#[derive(sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created: Timestamp,
    pub author_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct PostForm {
    pub title: String,
    pub body: String,
}
