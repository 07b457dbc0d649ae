#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// argon2 PHC string, never the plaintext
    pub password: String,
}
