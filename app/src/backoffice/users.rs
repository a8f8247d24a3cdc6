//! ABOUTME: Users resource with search, a date-joined filter and CSV export
//! ABOUTME: Creation sets a password, editing only touches the names

use async_trait::async_trait;
use bo_core::{Error, Result};
use bo_db::{CreateUserRequest, QuerySet, UpdateUserRequest, User, UserRepository};
use bo_web::{
    auth::PasswordAuth,
    export::{fields, Field},
    filters::DateRangeFilter,
    forms::{FormData, FormError, FormErrors, FormField, InputType, ModelForm},
    views::{CreateView, DeleteView, DetailView, EditView, ExportView, ListView},
    ResourceViews,
};
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

const SEARCH_FIELDS: [&str; 3] = ["first_name", "last_name", "username"];

fn list_display() -> Vec<Field> {
    fields(["id", "first_name", "last_name", "username", "date_joined"])
}

fn detail_fields() -> Vec<Field> {
    fields([
        "email",
        "first_name",
        "last_name",
        "is_superuser",
        "is_staff",
        "is_active",
        "date_joined",
    ])
}

fn queryset() -> Result<QuerySet<User>> {
    QuerySet::all().order_by(&["-date_joined"])
}

fn date_joined_filter() -> DateRangeFilter {
    DateRangeFilter::new("date_joined", "Date joined")
}

#[derive(Debug, Validate)]
struct NameInput {
    #[validate(length(min = 1, message = "This field is required."))]
    username: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    last_name: String,
}

impl NameInput {
    fn from_data(data: &FormData) -> Self {
        Self {
            username: data.text("username"),
            first_name: data.text("first_name"),
            last_name: data.text("last_name"),
        }
    }
}

fn name_fields() -> Vec<FormField> {
    vec![
        FormField::text("first_name", "First name"),
        FormField::text("last_name", "Last name"),
        FormField::text("username", "Username").required(),
    ]
}

/// Names of an existing user
pub struct UserForm;

#[async_trait]
impl ModelForm for UserForm {
    type Model = User;

    fn fields(&self) -> Vec<FormField> {
        name_fields()
    }

    async fn save(
        &self,
        pool: &SqlitePool,
        data: &FormData,
        instance: Option<&User>,
    ) -> std::result::Result<User, FormError> {
        let Some(user) = instance else {
            return Err(Error::Config("UserForm only edits existing users".to_string()).into());
        };
        let input = NameInput::from_data(data);
        input.validate()?;

        let request = UpdateUserRequest {
            username: Some(input.username),
            first_name: Some(input.first_name),
            last_name: Some(input.last_name),
            ..Default::default()
        };
        Ok(UserRepository::new(pool).update(user.id, request).await?)
    }
}

#[derive(Debug, Validate)]
struct PasswordInput {
    #[validate(length(min = 1, message = "This field is required."))]
    password: String,
}

/// New user with a password and names
pub struct CreationUserForm;

#[async_trait]
impl ModelForm for CreationUserForm {
    type Model = User;

    fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![FormField::new("password", "Password", InputType::Password).required()];
        fields.extend(name_fields());
        fields
    }

    async fn save(
        &self,
        pool: &SqlitePool,
        data: &FormData,
        _instance: Option<&User>,
    ) -> std::result::Result<User, FormError> {
        let password = PasswordInput {
            password: data.raw("password").to_string(),
        };
        let names = NameInput::from_data(data);

        // Report every invalid field at once
        let mut errors = match password.validate() {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };
        if let Err(e) = names.validate() {
            let name_errors = FormErrors::from(e);
            for (field, messages) in name_errors.fields {
                for message in messages {
                    errors.add(&field, message);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let user = UserRepository::new(pool)
            .create(CreateUserRequest {
                username: names.username,
                password_hash: PasswordAuth::hash_password(&password.password)?,
                first_name: names.first_name,
                last_name: names.last_name,
                email: String::new(),
                is_superuser: false,
                is_staff: false,
            })
            .await?;
        info!("Created user {} from the backoffice", user.id);
        Ok(user)
    }
}

/// All user pages under `users/`
pub fn resource() -> Result<ResourceViews> {
    Ok(ResourceViews::new("users")
        .view(
            ListView::new(list_display())
                .queryset(queryset()?)
                .search_fields(&SEARCH_FIELDS)
                .filterset(date_joined_filter())
                .paginate_by(15)
                .title("Users")
                .build()?,
        )
        .view(DetailView::new(detail_fields()).queryset(queryset()?).build()?)
        .view(
            CreateView::builder()
                .form(CreationUserForm)
                .title("Create user")
                .build()?,
        )
        .view(EditView::builder().form(UserForm).build()?)
        .view(DeleteView::<User>::new())
        .view(
            ExportView::new(detail_fields(), "users.csv")
                .queryset(queryset()?)
                .search_fields(&SEARCH_FIELDS)
                .filterset(date_joined_filter())
                .build()?,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> FormData {
        let mut data = FormData::new();
        for (name, value) in pairs {
            data.set(*name, *value);
        }
        data
    }

    #[test]
    fn test_resource_builds() {
        assert!(resource().is_ok());
    }

    #[test]
    fn test_name_input_requires_username() {
        let input = NameInput::from_data(&data(&[("username", "  "), ("first_name", "Ada")]));
        let errors = FormErrors::from(input.validate().unwrap_err());
        assert_eq!(errors.for_field("username"), vec!["This field is required."]);
        assert!(errors.for_field("first_name").is_empty());
    }

    #[test]
    fn test_creation_form_fields() {
        let names: Vec<&str> = CreationUserForm.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, ["password", "first_name", "last_name", "username"]);
    }
}
