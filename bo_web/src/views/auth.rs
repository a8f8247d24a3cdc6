//! ABOUTME: Sign-in and sign-out pages managing the session cookie
//! ABOUTME: Credential errors are reported on the field that failed

use super::redirect;
use crate::{
    auth::{JwtAuth, PasswordAuth, SESSION_COOKIE},
    context::{render_page, PageContext},
    error::PageError,
    forms::FormErrors,
    middleware::{authenticate, session_token, Viewer},
    AppState,
};
use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    http::header::LOCATION,
    web, HttpRequest, HttpResponse,
};
use askama::Template;
use bo_db::UserRepository;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "These credentials are not correct";

/// Submitted sign-in form
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SignInForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "The username is mandatory"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "The password is mandatory"))]
    pub password: String,
    /// Page requested before signing in
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

#[derive(Template)]
#[template(path = "sign_in.html")]
struct SignInPage {
    ctx: PageContext,
    username: String,
    next: String,
    username_errors: Vec<String>,
    password_errors: Vec<String>,
}

/// Only local absolute paths are followed after signing in
fn safe_next(next: &str) -> Option<&str> {
    let next = next.trim();
    (next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')).then_some(next)
}

fn index_url(state: &AppState) -> String {
    state
        .urls
        .reverse(&state.settings.route_name("index"), &[])
        .unwrap_or_else(|_| "/".to_string())
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .max_age(Duration::seconds(JwtAuth::token_expiration_secs() as i64))
        .http_only(true)
        .secure(state.security.secure_cookies)
        .same_site(SameSite::Lax)
        .finish()
}

fn render_sign_in(req: &HttpRequest, state: &AppState, username: &str, next: &str, errors: &FormErrors) -> Result<HttpResponse, PageError> {
    let page = SignInPage {
        ctx: PageContext::build(req, state, None, &[]),
        username: username.to_string(),
        next: safe_next(next).unwrap_or_default().to_string(),
        username_errors: errors.for_field("username"),
        password_errors: errors.for_field("password"),
    };
    render_page(&page, &page.ctx)
}

/// Sign-in page; visitors with a session go straight to the index
pub async fn sign_in_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse, PageError> {
    let token = session_token(&req);
    if authenticate(&state, token.as_deref()).await.is_some() {
        debug!("Already signed in, redirecting to index");
        return Ok(redirect(&index_url(&state)));
    }
    render_sign_in(&req, &state, "", &query.next, &FormErrors::default())
}

/// Check credentials and open a session
#[instrument(skip_all, fields(username = %form.username))]
pub async fn sign_in(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<SignInForm>,
) -> Result<HttpResponse, PageError> {
    let form = form.into_inner();
    if let Err(errors) = form.validate() {
        return render_sign_in(&req, &state, &form.username, &form.next, &errors.into());
    }

    let repo = UserRepository::new(state.db.pool());
    let user = match repo.find_by_username(&form.username).await? {
        Some(user) if user.is_active => user,
        _ => {
            warn!("Sign-in attempt for unknown or inactive user");
            let mut errors = FormErrors::default();
            errors.add("username", INVALID_CREDENTIALS);
            return render_sign_in(&req, &state, &form.username, &form.next, &errors);
        }
    };

    if !PasswordAuth::verify_password(&form.password, &user.password_hash) {
        warn!("Invalid password for user: {}", user.id);
        let mut errors = FormErrors::default();
        errors.add("password", INVALID_CREDENTIALS);
        return render_sign_in(&req, &state, &form.username, &form.next, &errors);
    }

    let token = JwtAuth::create_token(user.id, &user.username, &state.security.jwt_secret)?;
    repo.touch_last_login(user.id).await?;
    info!("User {} signed in", user.id);

    let location = safe_next(&form.next)
        .map(str::to_string)
        .unwrap_or_else(|| index_url(&state));
    Ok(HttpResponse::Found()
        .insert_header((LOCATION, location))
        .cookie(session_cookie(&state, token))
        .finish())
}

/// Close the session and return to the index
pub async fn sign_out(state: web::Data<AppState>, viewer: Viewer) -> HttpResponse {
    info!("User {} signed out", viewer.user.id);
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Found()
        .insert_header((LOCATION, index_url(&state)))
        .cookie(cookie)
        .finish()
}
