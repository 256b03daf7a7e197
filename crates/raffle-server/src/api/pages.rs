//! HTML pages and flash messages.

use crate::admin::find_cookie;
use crate::error::AppError;
use crate::export::export_row;
use askama::Template;
use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};
use participant_store::Participant;
use tracing::warn;

pub const FLASH_COOKIE: &str = "flash";

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    /// `success` or `danger`
    pub kind: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: "success".into(),
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: "danger".into(),
            message: message.into(),
        }
    }

    pub fn to_cookie(&self) -> Cookie<'static> {
        let value = urlencoding::encode(&format!("{}|{}", self.kind, self.message)).into_owned();
        flash_cookie(value)
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = find_cookie(headers, FLASH_COOKIE)?;
        let decoded = urlencoding::decode(&raw).ok()?;
        let (kind, message) = decoded.split_once('|')?;
        Some(Self {
            kind: kind.to_string(),
            message: message.to_string(),
        })
    }
}

fn flash_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(FLASH_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

pub fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!(cookie = cookie.name(), "Dropping unencodable cookie: {}", e),
    }
}

/// 303 redirect carrying a flash message.
pub fn redirect_with_flash(to: &str, flash: Flash) -> Response {
    let mut response = Redirect::to(to).into_response();
    append_cookie(&mut response, &flash.to_cookie());
    response
}

/// Render a page and clear the flash it consumed.
pub fn render_page<T: Template>(template: &T, consumed_flash: bool) -> Result<Response, AppError> {
    let mut response = Html(template.render()?).into_response();
    if consumed_flash {
        let mut removal = flash_cookie(String::new());
        removal.make_removal();
        append_cookie(&mut response, &removal);
    }
    Ok(response)
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "success.html")]
pub struct SuccessTemplate {
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "admin_login.html")]
pub struct AdminLoginTemplate {
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub flash: Option<Flash>,
    pub participants: Vec<ParticipantRow>,
}

/// Admin table row; `index` is the deletion key.
#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub index: usize,
    pub ordinal: usize,
    pub full_name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub city: String,
    pub registration_time: String,
    pub ip_address: String,
}

impl ParticipantRow {
    pub fn build(participants: &[Participant]) -> Vec<Self> {
        participants
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                let [full_name, phone, age, gender, city, _, _, registration_time, _, ip_address] =
                    export_row(participant);
                Self {
                    index,
                    ordinal: index + 1,
                    full_name,
                    phone,
                    age,
                    gender,
                    city,
                    registration_time,
                    ip_address,
                }
            })
            .collect()
    }
}
