//! ABOUTME: User repository with authentication, group and permission operations
//! ABOUTME: Users double as a backoffice model with list, detail and export attributes

use crate::{
    model::{Model, Record},
    queryset::QuerySet,
    value::{RelatedObject, Thunk, Value},
};
use bo_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use tracing::{debug, instrument};

/// Separator between aggregated group entries
const GROUP_SEPARATOR: char = '\u{1f}';

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: String,
    pub last_login: Option<String>,
    /// `id:name` pairs of the user's groups, aggregated by the select list
    #[sqlx(default)]
    #[serde(skip)]
    pub group_entries: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn groups(&self) -> Vec<RelatedObject> {
        let Some(entries) = self.group_entries.as_deref() else {
            return Vec::new();
        };
        let mut groups: Vec<RelatedObject> = entries
            .split(GROUP_SEPARATOR)
            .filter_map(|entry| {
                let (id, name) = entry.split_once(':')?;
                Some(RelatedObject::new("group", id.parse().ok()?, name))
            })
            .collect();
        groups.sort_by(|a, b| a.display.cmp(&b.display));
        groups
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

impl Record for User {
    fn model_name(&self) -> &'static str {
        Self::MODEL_NAME
    }

    fn pk(&self) -> i64 {
        self.id
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let value = match name {
            "pk" | "id" => Value::Int(self.id),
            "username" => Value::text(&self.username),
            "first_name" => Value::text(&self.first_name),
            "last_name" => Value::text(&self.last_name),
            "email" => Value::text(&self.email),
            "is_superuser" => Value::Bool(self.is_superuser),
            "is_staff" => Value::Bool(self.is_staff),
            "is_active" => Value::Bool(self.is_active),
            "date_joined" => Value::text(&self.date_joined),
            "last_login" => Value::optional(self.last_login.clone(), Value::Text),
            "groups" => Value::Relation(self.groups()),
            "full_name" => {
                let full_name = self.full_name();
                Value::Callable(Thunk::new(move || Value::text(full_name.clone())))
            }
            _ => return None,
        };
        Some(value)
    }
}

impl Model for User {
    const MODEL_NAME: &'static str = "user";
    const TABLE: &'static str = "users";
    const FROM: &'static str = "users u";
    const SELECT: &'static str = "u.id, u.username, u.password_hash, u.first_name, u.last_name, \
        u.email, u.is_superuser, u.is_staff, u.is_active, u.date_joined, u.last_login, \
        (SELECT GROUP_CONCAT(g.id || ':' || g.name, char(31)) FROM user_groups ug \
         JOIN groups g ON g.id = ug.group_id WHERE ug.user_id = u.id) AS group_entries";
    const DEFAULT_ORDERING: &'static str = "-date_joined";

    fn column(field: &str) -> Option<&'static str> {
        Some(match field {
            "pk" | "id" => "u.id",
            "username" => "u.username",
            "first_name" => "u.first_name",
            "last_name" => "u.last_name",
            "email" => "u.email",
            "is_superuser" => "u.is_superuser",
            "is_staff" => "u.is_staff",
            "is_active" => "u.is_active",
            "date_joined" => "u.date_joined",
            "last_login" => "u.last_login",
            _ => return None,
        })
    }

    fn fields() -> &'static [&'static str] {
        &[
            "id",
            "username",
            "first_name",
            "last_name",
            "email",
            "is_superuser",
            "is_staff",
            "is_active",
            "date_joined",
            "last_login",
            "groups",
            "full_name",
        ]
    }

    fn verbose_name(field: &str) -> Option<&'static str> {
        Some(match field {
            "id" | "pk" => "ID",
            "first_name" => "first name",
            "last_name" => "last name",
            "email" => "email address",
            "is_superuser" => "superuser status",
            "is_staff" => "staff status",
            "is_active" => "active",
            "date_joined" => "date joined",
            "last_login" => "last login",
            "full_name" => "full name",
            "username" => "username",
            "groups" => "groups",
            _ => return None,
        })
    }
}

/// Request to create a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
}

/// Request to update a user; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

/// User repository
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

fn map_write_error(e: sqlx::Error, action: &str) -> Error {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Validation("A user with that username already exists.".to_string())
        }
        _ => Error::Database(format!("Failed to {}: {}", action, e)),
    }
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let now = now_iso8601();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, email,
                               is_superuser, is_staff, is_active, date_joined)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
            RETURNING id
            "#,
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(request.is_superuser)
        .bind(request.is_staff)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_write_error(e, "create user"))?;

        debug!("Successfully created user: {}", id);
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    /// Find a user by ID
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        debug!("Finding user by id: {}", id);
        QuerySet::<User>::all()
            .filter_pk(id)?
            .first(self.pool)
            .await
    }

    /// Find a user by username
    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        debug!("Finding user by username: {}", username);
        QuerySet::<User>::all()
            .filter_eq("username", username)?
            .first(self.pool)
            .await
    }

    /// Update a user
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User> {
        debug!("Updating user: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?1, username),
                first_name = COALESCE(?2, first_name),
                last_name = COALESCE(?3, last_name),
                email = COALESCE(?4, email),
                password_hash = COALESCE(?5, password_hash),
                is_active = COALESCE(?6, is_active)
            WHERE id = ?7
            "#,
        )
        .bind(request.username)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.email)
        .bind(request.password_hash)
        .bind(request.is_active)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "update user"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    /// Record a successful sign-in
    #[instrument(skip(self))]
    pub async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
            .bind(now_iso8601())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Permission codenames granted directly to the user
    #[instrument(skip(self))]
    pub async fn permissions(&self, id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT codename FROM user_permissions WHERE user_id = ?1 ORDER BY codename",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to load permissions: {}", e)))
    }

    #[instrument(skip(self))]
    pub async fn grant_permission(&self, id: i64, codename: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?1, ?2)")
            .bind(id)
            .bind(codename)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to grant permission: {}", e)))?;
        Ok(())
    }

    /// Active superusers hold every permission, others need an explicit grant
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn has_perm(&self, user: &User, codename: &str) -> Result<bool> {
        if !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }
        Ok(self.permissions(user.id).await?.iter().any(|p| p == codename))
    }

    /// Add the user to a group, creating the group on first use
    #[instrument(skip(self))]
    pub async fn add_to_group(&self, id: i64, group: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO groups (name) VALUES (?1)")
            .bind(group)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to create group: {}", e)))?;

        sqlx::query(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) SELECT ?1, id FROM groups WHERE name = ?2",
        )
        .bind(id)
        .bind(group)
        .execute(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to add user to group: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Db;
    use tempfile::TempDir;

    async fn setup() -> (Db, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.db");
        let db = Db::new(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password_hash: "hashed_password".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            is_superuser: false,
            is_staff: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (db, _dir) = setup().await;
        let repo = UserRepository::new(db.pool());

        let user = repo.create(request("ada")).await.expect("create user");
        assert!(user.id > 0);
        assert!(user.is_active);
        assert!(user.last_login.is_none());
        assert_eq!(user.to_string(), "ada");

        let found = repo.find_by_username("ada").await.unwrap().expect("exists");
        assert_eq!(found.id, user.id);
        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_validation_error() {
        let (db, _dir) = setup().await;
        let repo = UserRepository::new(db.pool());

        repo.create(request("ada")).await.unwrap();
        let err = repo.create(request("ada")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_and_last_login() {
        let (db, _dir) = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(request("ada")).await.unwrap();

        let updated = repo
            .update(
                user.id,
                UpdateUserRequest {
                    first_name: Some("Augusta".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.last_name, "Lovelace");

        repo.touch_last_login(user.id).await.unwrap();
        let found = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(found.last_login.is_some());

        let missing = repo.update(9999, UpdateUserRequest::default()).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_permissions_and_superusers() {
        let (db, _dir) = setup().await;
        let repo = UserRepository::new(db.pool());

        let staff = repo.create(request("staff")).await.unwrap();
        assert!(!repo.has_perm(&staff, "auth.view_user").await.unwrap());
        repo.grant_permission(staff.id, "auth.view_user").await.unwrap();
        repo.grant_permission(staff.id, "auth.view_user").await.unwrap();
        assert!(repo.has_perm(&staff, "auth.view_user").await.unwrap());
        assert_eq!(repo.permissions(staff.id).await.unwrap().len(), 1);

        let mut root = request("root");
        root.is_superuser = true;
        let root = repo.create(root).await.unwrap();
        assert!(repo.has_perm(&root, "anything.at_all").await.unwrap());

        let inactive = repo
            .update(
                root.id,
                UpdateUserRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!repo.has_perm(&inactive, "anything.at_all").await.unwrap());
    }

    #[tokio::test]
    async fn test_groups_are_exposed_as_relation() {
        let (db, _dir) = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(request("ada")).await.unwrap();
        assert_eq!(user.attr("groups"), Some(Value::Relation(vec![])));

        repo.add_to_group(user.id, "staff").await.unwrap();
        repo.add_to_group(user.id, "editors").await.unwrap();

        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        let Some(Value::Relation(groups)) = user.attr("groups") else {
            panic!("groups should be a relation");
        };
        let names: Vec<&str> = groups.iter().map(|g| g.display.as_str()).collect();
        assert_eq!(names, vec!["editors", "staff"]);
    }

    #[test]
    fn test_attributes() {
        let user = User {
            id: 3,
            username: "ada".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: String::new(),
            is_superuser: false,
            is_staff: true,
            is_active: true,
            date_joined: "2024-01-01T00:00:00Z".to_string(),
            last_login: None,
            group_entries: None,
        };

        assert_eq!(user.attr("pk"), Some(Value::Int(3)));
        assert_eq!(user.attr("last_login"), Some(Value::Null));
        assert_eq!(user.attr("is_staff"), Some(Value::Bool(true)));
        assert_eq!(
            user.attr("full_name").map(Value::resolve),
            Some(Value::text("Ada Lovelace"))
        );
        assert!(user.attr("password_hash").is_none());
        assert!(user.attr("nope").is_none());
        assert_eq!(User::verbose_name("date_joined"), Some("date joined"));
        assert!(User::has_field("groups"));
    }
}
