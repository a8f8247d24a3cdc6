//! ABOUTME: Middleware modules for the backoffice pages
//! ABOUTME: Session authentication that loads the signed-in viewer

pub mod auth;

pub use auth::{authenticate, session_token, sign_in_redirect, RequireLogin, Viewer};
