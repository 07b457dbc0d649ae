use std::{fmt, result};

use log::error;
use warp::http::{
    self,
    header::{SET_COOKIE, VARY},
    HeaderValue,
};
use warp::reply::{Reply, Response};

use crate::backend::Backend;
use crate::session::{Session, SessionCookies};
use crate::user::User;

pub struct Flaskr {
    backend: Backend,
    cookies: SessionCookies,
}

/// Per-request state, built before any handler runs.
#[derive(Debug)]
pub struct Context {
    pub session: Session,
    pub user: Option<User>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Internal,
    LoginRequired,
    Forbidden,
    PostNotFound(i64),
}

pub type Result<T> = result::Result<T, Error>;

impl Into<http::StatusCode> for Error {
    fn into(self) -> http::StatusCode {
        match self {
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::LoginRequired => http::StatusCode::FOUND,
            Self::Forbidden => http::StatusCode::FORBIDDEN,
            Self::PostNotFound(_) => http::StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(fmt, "Internal Server Error"),
            Self::LoginRequired => write!(fmt, "Login required"),
            Self::Forbidden => write!(fmt, "Forbidden"),
            Self::PostNotFound(id) => write!(fmt, "Post id {id} doesn't exist."),
        }
    }
}

impl warp::reject::Reject for Error {}

impl Flaskr {
    pub fn new(backend: Backend, cookies: SessionCookies) -> Self {
        Self { backend, cookies }
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    pub(crate) fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Attach the session cookie to `reply` if the handler changed the session.
    pub fn finish(&self, session: Session, reply: impl Reply) -> Response {
        let mut response = reply.into_response();
        let headers = response.headers_mut();

        headers.append(VARY, HeaderValue::from_static("Cookie"));

        if let Some(cookie) = self.cookies.save(&session) {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => error!("session cookie isn't a valid header: {e}"),
            }
        }

        response
    }
}
