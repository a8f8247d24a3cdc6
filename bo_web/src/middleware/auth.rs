//! ABOUTME: Session authentication middleware for backoffice pages
//! ABOUTME: Verifies the session cookie, loads the viewer, redirects anonymous requests to sign-in

use crate::{
    auth::{JwtAuth, SESSION_COOKIE},
    AppState,
};
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::header::LOCATION,
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use bo_db::{User, UserRepository};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use tracing::{debug, warn};

/// The signed-in user with the permissions granted to them
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: User,
    pub permissions: Vec<String>,
}

impl Viewer {
    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Active superusers hold every permission
    pub fn has_perm(&self, codename: &str) -> bool {
        self.user.is_active
            && (self.user.is_superuser || self.permissions.iter().any(|p| p == codename))
    }
}

impl FromRequest for Viewer {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Viewer>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Sign-in required")),
        )
    }
}

/// Session token carried by the request, if any
pub fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolve a session token into an active viewer
pub async fn authenticate(state: &AppState, token: Option<&str>) -> Option<Viewer> {
    let token = token?;
    let claims = match JwtAuth::verify_token(token, &state.security.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Session token rejected: {}", e);
            return None;
        }
    };
    let user_id = claims.user_id()?;

    let repo = UserRepository::new(state.db.pool());
    let user = match repo.find_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => user,
        Ok(Some(_)) => {
            warn!("Session of inactive user {} ignored", user_id);
            return None;
        }
        Ok(None) => {
            warn!("Session references unknown user {}", user_id);
            return None;
        }
        Err(e) => {
            warn!("Failed to load session user: {}", e);
            return None;
        }
    };
    let permissions = match repo.permissions(user.id).await {
        Ok(permissions) => permissions,
        Err(e) => {
            warn!("Failed to load permissions: {}", e);
            Vec::new()
        }
    };

    debug!("Session authenticated for user: {}", user.username);
    Some(Viewer { user, permissions })
}

/// Sign-in URL that returns to the requested page afterwards
pub fn sign_in_redirect(state: &AppState, req: &HttpRequest) -> String {
    let sign_in = state
        .urls
        .reverse(&state.settings.route_name("sign-in"), &[])
        .unwrap_or_else(|_| "/".to_string());
    let next: String =
        url::form_urlencoded::byte_serialize(req.uri().to_string().as_bytes()).collect();
    format!("{}?next={}", sign_in, next)
}

/// Middleware admitting only requests with a valid session
pub struct RequireLogin;

impl<S, B> Transform<S, ServiceRequest> for RequireLogin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireLoginMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireLoginMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireLoginMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireLoginMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                return Err(ErrorInternalServerError("Backoffice state is not configured"));
            };

            let token = session_token(req.request());
            match authenticate(&state, token.as_deref()).await {
                Some(viewer) => {
                    req.extensions_mut().insert(viewer);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                None => {
                    debug!("Anonymous request to {}, redirecting to sign-in", req.path());
                    let location = sign_in_redirect(&state, req.request());
                    let response = HttpResponse::Found()
                        .insert_header((LOCATION, location))
                        .finish()
                        .map_into_right_body();
                    Ok(req.into_response(response))
                }
            }
        })
    }
}
