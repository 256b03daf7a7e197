//! Admin password check and signed session cookies.

use axum::http::{header, HeaderMap};
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString, SecretVec};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the admin session cookie.
pub const SESSION_COOKIE: &str = "raffle_session";

const SESSION_CONTEXT: &[u8] = b"session:";
const PASSWORD_CONTEXT: &[u8] = b"password:";

/// Verifies the shared admin password and issues session tokens.
pub struct AdminAuth {
    password: SecretString,
    signing_key: SecretVec<u8>,
}

impl AdminAuth {
    /// A missing `secret_key` gets a random per-process key, so sessions
    /// do not survive a restart.
    pub fn new(password: SecretString, secret_key: Option<SecretString>) -> Self {
        let key = match secret_key {
            Some(secret) => secret.expose_secret().as_bytes().to_vec(),
            None => {
                let mut bytes = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        };

        Self {
            password,
            signing_key: SecretVec::new(key),
        }
    }

    fn mac(&self, context: &[u8], message: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret()).ok()?;
        mac.update(context);
        mac.update(message);
        Some(mac)
    }

    /// Constant-time comparison against the configured password.
    pub fn verify_password(&self, candidate: &str) -> bool {
        let Some(expected) = self.mac(PASSWORD_CONTEXT, self.password.expose_secret().as_bytes())
        else {
            return false;
        };
        let Some(candidate) = self.mac(PASSWORD_CONTEXT, candidate.as_bytes()) else {
            return false;
        };

        candidate
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok()
    }

    /// New session token of the form `<nonce-hex>.<tag-hex>`.
    pub fn issue_session(&self) -> Option<String> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = hex::encode(nonce);

        let tag = self.mac(SESSION_CONTEXT, nonce.as_bytes())?.finalize();
        Some(format!("{}.{}", nonce, hex::encode(tag.into_bytes())))
    }

    pub fn verify_session(&self, token: &str) -> bool {
        let Some((nonce, tag)) = token.split_once('.') else {
            return false;
        };
        let Ok(tag) = hex::decode(tag) else {
            return false;
        };

        self.mac(SESSION_CONTEXT, nonce.as_bytes())
            .map(|mac| mac.verify_slice(&tag).is_ok())
            .unwrap_or(false)
    }

    /// Whether the request carries a valid session cookie.
    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        find_cookie(headers, SESSION_COOKIE)
            .map(|token| self.verify_session(&token))
            .unwrap_or(false)
    }
}

/// Value of the first cookie named `name` across all `Cookie` headers.
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Session cookie without `Max-Age`, so it ends with the browser session.
pub fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    cookie
}
