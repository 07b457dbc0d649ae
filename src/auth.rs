use std::{fmt, sync::Arc};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use warp::{Filter, Rejection};

use crate::backend::InsertError;
use crate::flaskr::{self, Context, Flaskr};
use crate::session::{Session, SESSION_COOKIE};
use crate::user::User;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Failures shown back to the user; `Failed` is not their fault.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    UsernameRequired,
    PasswordRequired,
    AlreadyRegistered(String),
    IncorrectUsername,
    IncorrectPassword,
    Failed(flaskr::Error),
}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernameRequired => write!(fmt, "Username is required."),
            Self::PasswordRequired => write!(fmt, "Password is required."),
            Self::AlreadyRegistered(username) => {
                write!(fmt, "User {username} is already registered.")
            }
            Self::IncorrectUsername => write!(fmt, "Incorrect username."),
            Self::IncorrectPassword => write!(fmt, "Incorrect password."),
            Self::Failed(e) => write!(fmt, "{e}"),
        }
    }
}

impl From<flaskr::Error> for AuthError {
    fn from(e: flaskr::Error) -> Self {
        Self::Failed(e)
    }
}

pub fn hash_password(password: &str) -> Result<String, ()> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("couldn't hash password: {e}");
        })
}

pub fn verify_password(password: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(h) => h,
        Err(e) => {
            error!("stored digest isn't a PHC string: {e}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

impl Flaskr {
    pub async fn register(&self, creds: &Credentials) -> Result<i64, AuthError> {
        let Credentials { username, password } = creds;

        if username.is_empty() {
            return Err(AuthError::UsernameRequired);
        }
        if password.is_empty() {
            return Err(AuthError::PasswordRequired);
        }

        let digest = hash_password(password).map_err(|()| flaskr::Error::Internal)?;

        match self.backend().insert_user(username, &digest).await {
            Ok(id) => {
                info!("{username} registered as #{id}");
                Ok(id)
            }
            Err(InsertError::Duplicate) => {
                info!("{username} already registered");
                Err(AuthError::AlreadyRegistered(username.clone()))
            }
            Err(InsertError::Internal) => Err(flaskr::Error::Internal.into()),
        }
    }

    /// On success the session is reset to hold just the user's id.
    pub async fn login(&self, session: &mut Session, creds: &Credentials) -> Result<User, AuthError> {
        let username = &creds.username;

        let user = self
            .backend()
            .find_user(username)
            .await
            .map_err(|()| flaskr::Error::Internal)?;

        let Some(user) = user else {
            info!("rejecting non-existent user {username}");
            return Err(AuthError::IncorrectUsername);
        };

        if !verify_password(&creds.password, &user.password) {
            info!("wrong password for user {username}");
            return Err(AuthError::IncorrectPassword);
        }

        session.clear();
        session.set_user_id(user.id);

        info!("{username} login");
        Ok(user)
    }

    pub fn logout(&self, session: &mut Session) {
        match session.user_id() {
            Some(id) => info!("user #{id} logout"),
            None => debug!("logout without a user"),
        }

        session.clear();
    }

    /// Runs ahead of every handler. A stale user id resolves to no user.
    pub async fn load_logged_in_user(&self, cookie: Option<String>) -> flaskr::Result<Context> {
        let session = self.cookies().open(cookie);

        let user = match session.user_id() {
            None => None,
            Some(id) => {
                let user = self
                    .backend()
                    .user_by_id(id)
                    .await
                    .map_err(|()| flaskr::Error::Internal)?;

                if user.is_none() {
                    warn!("session refers to unknown user #{id}");
                }
                user
            }
        };

        Ok(Context { session, user })
    }
}

/// Extracts the app and the request's [`Context`].
pub fn with_context(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Arc<Flaskr>, Context), Error = Rejection> + Clone {
    warp::any()
        .map(move || Arc::clone(&app))
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and_then(|app: Arc<Flaskr>, cookie: Option<String>| async move {
            match app.load_logged_in_user(cookie).await {
                Ok(ctx) => Ok((app, ctx)),
                Err(e) => Err(warp::reject::custom(e)),
            }
        })
        .untuple_one()
}

/// Lets the wrapped view run only when someone is logged in, handing it the
/// user as well. Anonymous requests are rejected with
/// [`flaskr::Error::LoginRequired`], which becomes a redirect to the login page.
pub fn login_required<F>(
    view: F,
) -> impl Filter<Extract = (Arc<Flaskr>, Context, User), Error = Rejection> + Clone
where
    F: Filter<Extract = (Arc<Flaskr>, Context), Error = Rejection> + Clone,
{
    view.and_then(|app: Arc<Flaskr>, ctx: Context| async move {
        match ctx.user.clone() {
            Some(user) => Ok((app, ctx, user)),
            None => Err(warp::reject::custom(flaskr::Error::LoginRequired)),
        }
    })
    .untuple_one()
}
