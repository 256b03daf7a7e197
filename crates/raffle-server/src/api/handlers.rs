//! HTTP request handlers.

use super::middleware::ClientIp;
use super::pages::{
    append_cookie, redirect_with_flash, render_page, AdminLoginTemplate, AdminTemplate, Flash,
    IndexTemplate, ParticipantRow, SuccessTemplate,
};
use super::types::{
    AdminActionResponse, CoordinatesQuery, HealthResponse, LocationCheckResponse, LoginForm,
    PhoneCheckResponse, PhoneQuery, RegisterResponse,
};
use super::AppState;
use crate::admin::{clear_session_cookie, session_cookie};
use crate::error::AppError;
use crate::export::{build_workbook, export_filename, XLSX_CONTENT_TYPE};
use crate::registration::{parse_coordinates, RegistrationForm};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use tracing::{error, info, warn};

const REGISTERED_MESSAGE: &str = "You have successfully registered for the raffle!";

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "XMLHttpRequest")
        .unwrap_or(false)
}

/// Registration form page.
pub async fn index(headers: HeaderMap) -> Result<Response, AppError> {
    let flash = Flash::from_headers(&headers);
    let consumed = flash.is_some();
    render_page(&IndexTemplate { flash }, consumed)
}

/// Registration confirmation page.
pub async fn success(headers: HeaderMap) -> Result<Response, AppError> {
    let flash = Flash::from_headers(&headers);
    let consumed = flash.is_some();
    render_page(&SuccessTemplate { flash }, consumed)
}

/// Check browser-supplied coordinates against the allow-list.
pub async fn check_coordinates(
    State(state): State<AppState>,
    Query(query): Query<CoordinatesQuery>,
) -> Json<LocationCheckResponse> {
    let Some((latitude, longitude)) = parse_coordinates(query.lat.as_deref(), query.lng.as_deref())
    else {
        return Json(LocationCheckResponse::error("Coordinates not provided"));
    };

    match state.registrar.check_coordinates(latitude, longitude).await {
        Some(check) => Json(LocationCheckResponse::success(check.allowed, check.city)),
        None => Json(LocationCheckResponse::error(
            "Could not determine location from coordinates",
        )),
    }
}

/// Check the caller's network address against the allow-list.
pub async fn check_location(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Json<LocationCheckResponse> {
    let check = match ip {
        Some(ip) => state.registrar.check_ip(ip).await,
        None => None,
    };

    match check {
        Some(check) => Json(LocationCheckResponse::success(check.allowed, check.city)),
        None => Json(LocationCheckResponse::error("Could not determine location")),
    }
}

/// Whether a phone number is already registered.
pub async fn check_phone(
    State(state): State<AppState>,
    Query(query): Query<PhoneQuery>,
) -> Json<PhoneCheckResponse> {
    let phone = query.phone.unwrap_or_default();
    if phone.trim().is_empty() || !state.registrar.is_phone_registered(&phone).await {
        return Json(PhoneCheckResponse {
            exists: false,
            message: None,
        });
    }

    Json(PhoneCheckResponse {
        exists: true,
        message: Some(AppError::DuplicatePhone.to_string()),
    })
}

/// Register a participant.
///
/// AJAX requests get JSON; plain form posts get a redirect with a flash.
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let ajax = is_ajax(&headers);

    match state.registrar.register(&form, ip).await {
        Ok(registered) if ajax => Json(RegisterResponse {
            success: true,
            message: REGISTERED_MESSAGE.into(),
            participant_number: Some(registered.ordinal),
        })
        .into_response(),
        Ok(_) => redirect_with_flash("/success", Flash::success(REGISTERED_MESSAGE)),
        Err(e) => {
            if matches!(e, AppError::Storage(_)) {
                error!("Registration could not be stored: {}", e);
            }
            if ajax {
                e.into_response()
            } else {
                redirect_with_flash("/", Flash::danger(e.to_string()))
            }
        }
    }
}

/// Participant table for admins, login form for everyone else.
pub async fn admin_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let flash = Flash::from_headers(&headers);
    let consumed = flash.is_some();

    if !state.admin.is_authenticated(&headers) {
        return render_page(&AdminLoginTemplate { flash }, consumed);
    }

    let participants = state.store.load().await;
    render_page(
        &AdminTemplate {
            flash,
            participants: ParticipantRow::build(&participants),
        },
        consumed,
    )
}

/// Password submission from the login form.
pub async fn admin_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if !state.admin.verify_password(&form.password) {
        warn!("Admin login failed");
        return render_page(
            &AdminLoginTemplate {
                flash: Some(Flash::danger("Wrong password!")),
            },
            false,
        );
    }

    let token = state
        .admin
        .issue_session()
        .ok_or_else(|| AppError::Internal("Could not sign session".into()))?;

    info!("Admin logged in");
    let mut response = Redirect::to("/admin").into_response();
    append_cookie(&mut response, &session_cookie(token));
    Ok(response)
}

/// Drop the admin session.
pub async fn admin_logout() -> Response {
    let mut response = Redirect::to("/admin").into_response();
    append_cookie(&mut response, &clear_session_cookie());
    response
}

/// Delete every participant.
pub async fn delete_participants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminActionResponse>, AppError> {
    if !state.admin.is_authenticated(&headers) {
        return Err(AppError::Forbidden);
    }

    let removed = state.store.delete_all().await?;
    info!(removed, "All participants deleted");

    Ok(Json(AdminActionResponse { success: true }))
}

/// Delete the participant at a list position.
///
/// Positions that are not a non-negative integer are reported as not found.
pub async fn delete_participant(
    State(state): State<AppState>,
    Path(raw_index): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AdminActionResponse>, AppError> {
    if !state.admin.is_authenticated(&headers) {
        return Err(AppError::Forbidden);
    }

    let index: usize = raw_index
        .parse()
        .map_err(|_| AppError::NotFound(raw_index))?;
    let removed = state.store.delete(index).await?;
    info!(index, phone = %removed.phone, "Participant deleted");

    Ok(Json(AdminActionResponse { success: true }))
}

/// Download all participants as a spreadsheet.
pub async fn export_to_excel(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.admin.is_authenticated(&headers) {
        return redirect_with_flash(
            "/admin",
            Flash::danger("Access denied. Please log in as administrator."),
        );
    }

    let participants = state.store.load().await;
    let bytes = match build_workbook(&participants) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Spreadsheet export failed: {}", e);
            return redirect_with_flash("/admin", Flash::danger(AppError::from(e).to_string()));
        }
    };

    let filename = export_filename(chrono::Local::now().date_naive());
    info!(rows = participants.len(), %filename, "Participants exported");

    let disposition = format!("attachment; filename=\"{}\"", filename);
    let mut response = bytes.into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(XLSX_CONTENT_TYPE),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        participants: state.store.count().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ajax() {
        let mut headers = HeaderMap::new();
        assert!(!is_ajax(&headers));

        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(is_ajax(&headers));

        headers.insert("x-requested-with", HeaderValue::from_static("fetch"));
        assert!(!is_ajax(&headers));
    }
}
