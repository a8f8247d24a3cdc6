//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Temporary databases, seeded users and session cookies for backoffice tests

use actix_web::cookie::Cookie;
use bo_core::Result;
use bo_db::{CreateUserRequest, Db, User, UserRepository};
use bo_web::auth::{JwtAuth, PasswordAuth, SESSION_COOKIE};
use tempfile::TempDir;

/// Secret shared by test states and the cookies minted for them
pub const TEST_JWT_SECRET: &str = "test-support-secret-with-enough-length";

/// Database living in a temporary directory, removed on drop
pub struct TestDb {
    pub db: Db,
    _dir: TempDir,
}

impl TestDb {
    /// Fresh database with the auth migrations applied
    pub async fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("backoffice-test.db");
        let db = Db::new(&path.to_string_lossy()).await?;
        Ok(Self { db, _dir: dir })
    }
}

/// Create an active staff user whose password is `password`
pub async fn seed_user(db: &Db, username: &str, password: &str, superuser: bool) -> Result<User> {
    UserRepository::new(db.pool())
        .create(CreateUserRequest {
            username: username.to_string(),
            password_hash: PasswordAuth::hash_password(password)?,
            first_name: String::new(),
            last_name: String::new(),
            email: format!("{}@example.com", username),
            is_superuser: superuser,
            is_staff: true,
        })
        .await
}

/// Session cookie signing `user` in, as set by the sign-in page
pub fn session_cookie(user: &User, secret: &str) -> Result<Cookie<'static>> {
    let token = JwtAuth::create_token(user.id, &user.username, secret)?;
    Ok(Cookie::new(SESSION_COOKIE, token))
}
