use base64_light::{base64_decode, base64_encode};
use cookie::{Cookie, CookieJar, Key, SameSite};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub const SESSION_COOKIE: &str = "session";

#[skip_serializing_none]
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Payload {
    user_id: Option<i64>,
    #[serde(default, rename = "_flashes", skip_serializing_if = "Vec::is_empty")]
    flashes: Vec<String>,
}

/// Client-held session state. Any mutation marks the session so the response
/// re-sends (or removes) the cookie.
#[derive(Debug, Default)]
pub struct Session {
    payload: Payload,
    modified: bool,
    // the client sent a cookie, so emptying the session must remove it
    from_client: bool,
}

impl Session {
    pub fn user_id(&self) -> Option<i64> {
        self.payload.user_id
    }

    pub fn set_user_id(&mut self, user_id: i64) {
        self.payload.user_id = Some(user_id);
        self.modified = true;
    }

    pub fn clear(&mut self) {
        self.payload = Payload::default();
        self.modified = true;
    }

    pub fn flash(&mut self, message: impl Into<String>) {
        self.payload.flashes.push(message.into());
        self.modified = true;
    }

    /// Pending flash messages, each surfaced once.
    pub fn take_flashes(&mut self) -> Vec<String> {
        if self.payload.flashes.is_empty() {
            return vec![];
        }
        self.modified = true;
        std::mem::take(&mut self.payload.flashes)
    }

    pub fn is_empty(&self) -> bool {
        self.payload == Payload::default()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// Signs and verifies the session cookie.
pub struct SessionCookies {
    key: Key,
    secure: bool,
}

impl SessionCookies {
    pub fn new(secret_key: &str, secure: bool) -> Self {
        // HKDF wants at least 256 bits of master key; short secrets like "dev" are hashed up to it
        let master = sha256::digest(secret_key);

        Self {
            key: Key::derive_from(master.as_bytes()),
            secure,
        }
    }

    /// Anything that fails verification or decoding yields an empty session.
    pub fn open(&self, raw: Option<String>) -> Session {
        let Some(raw) = raw else {
            return Session::default();
        };

        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(SESSION_COOKIE, raw));

        let payload = match jar.signed(&self.key).get(SESSION_COOKIE) {
            Some(verified) => decode(verified.value()),
            None => {
                warn!("session cookie failed verification, ignoring");
                None
            }
        };

        Session {
            payload: payload.unwrap_or_default(),
            modified: false,
            from_client: true,
        }
    }

    /// The cookie to send back, if the session changed.
    pub fn save(&self, session: &Session) -> Option<Cookie<'static>> {
        if !session.is_modified() {
            return None;
        }

        if session.is_empty() {
            if !session.from_client {
                return None;
            }
            let mut removal = self.build(String::new());
            removal.make_removal();
            return Some(removal);
        }

        let json = serde_json::to_string(&session.payload)
            .map_err(|e| {
                error!("couldn't encode session: {e}");
            })
            .ok()?;

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(self.build(base64_encode(&json)));
        jar.get(SESSION_COOKIE).cloned()
    }

    fn build(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

fn decode(value: &str) -> Option<Payload> {
    let json = base64_decode(value);

    serde_json::from_slice(&json)
        .map_err(|e| {
            warn!("undecodable session payload: {e}");
        })
        .ok()
}

#[cfg(test)]
mod test {
    use super::*;

    fn cookies() -> SessionCookies {
        SessionCookies::new("dev", false)
    }

    fn client_value(cookie: &Cookie<'_>) -> String {
        cookie.value().to_string()
    }

    #[test]
    fn no_cookie_is_anonymous() {
        let session = cookies().open(None);
        assert_eq!(session.user_id(), None);
        assert!(session.is_empty());
        assert!(cookies().save(&session).is_none());
    }

    #[test]
    fn signed_cookie_carries_user_id() {
        let mut session = Session::default();
        session.set_user_id(7);

        let cookie = cookies().save(&session).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let reopened = cookies().open(Some(client_value(&cookie)));
        assert_eq!(reopened.user_id(), Some(7));
        assert!(!reopened.is_modified());
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let mut session = Session::default();
        session.set_user_id(7);
        let value = client_value(&cookies().save(&session).unwrap());

        // swap the payload for one claiming a different user, keeping the signature
        let (mac, _) = value.split_at(44);
        let forged = format!("{mac}{}", base64_encode(r#"{"user_id":1}"#));
        assert_eq!(cookies().open(Some(forged)).user_id(), None);

        assert_eq!(cookies().open(Some("garbage".into())).user_id(), None);
    }

    #[test]
    fn other_secret_is_rejected() {
        let mut session = Session::default();
        session.set_user_id(7);
        let value = client_value(&cookies().save(&session).unwrap());

        let other = SessionCookies::new("not dev", false);
        assert_eq!(other.open(Some(value)).user_id(), None);
    }

    #[test]
    fn same_secret_verifies_across_instances() {
        let mut session = Session::default();
        session.set_user_id(7);

        for secret in ["", "dev", "a much longer secret than the hash it gets folded into"] {
            let value = client_value(&SessionCookies::new(secret, false).save(&session).unwrap());
            let reopened = SessionCookies::new(secret, true).open(Some(value));
            assert_eq!(reopened.user_id(), Some(7), "{secret:?}");
        }
    }

    #[test]
    fn clearing_a_client_session_removes_the_cookie() {
        let mut session = Session::default();
        session.set_user_id(7);
        let value = client_value(&cookies().save(&session).unwrap());

        let mut session = cookies().open(Some(value));
        session.clear();

        let removal = cookies().save(&session).unwrap();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(cookie::time::Duration::ZERO));
    }

    #[test]
    fn flashes_are_taken_once() {
        let mut session = Session::default();
        session.flash("Incorrect username.");
        session.flash("again");

        assert_eq!(session.take_flashes(), ["Incorrect username.", "again"]);
        assert!(session.take_flashes().is_empty());
        // flashed and consumed within one request: nothing to send
        assert!(session.is_empty());
        assert!(cookies().save(&session).is_none());
    }

    #[test]
    fn flashes_survive_a_round_trip() {
        let mut session = Session::default();
        session.flash("Title is required.");
        let value = client_value(&cookies().save(&session).unwrap());

        let mut reopened = cookies().open(Some(value));
        assert_eq!(reopened.take_flashes(), ["Title is required."]);
    }
}
