//! ABOUTME: Model forms used by the create and edit views
//! ABOUTME: Submitted data, per-field errors from validator and bound fields for templates

use async_trait::async_trait;
use bo_core::Error;
use bo_db::{Model, Record, Value};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use validator::ValidationErrors;

/// Submitted or initial form values by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: HashMap<String, String>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Trimmed value, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.values
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Raw value, passwords keep their surrounding whitespace
    pub fn raw(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Checkbox state; unchecked boxes are not submitted at all
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.raw(name), "on" | "true" | "1")
    }
}

impl From<HashMap<String, String>> for FormData {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

/// Messages collected while validating a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn for_field(&self, field: &str) -> Vec<String> {
        self.fields.get(field).cloned().unwrap_or_default()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for field '{}'", field));
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

/// Why a form could not be saved
#[derive(Debug)]
pub enum FormError {
    /// The submission is re-rendered with these messages
    Invalid(FormErrors),
    Failed(Error),
}

impl From<FormErrors> for FormError {
    fn from(errors: FormErrors) -> Self {
        FormError::Invalid(errors)
    }
}

impl From<ValidationErrors> for FormError {
    fn from(errors: ValidationErrors) -> Self {
        FormError::Invalid(errors.into())
    }
}

impl From<Error> for FormError {
    fn from(err: Error) -> Self {
        match err {
            // Conflicts detected by the store are shown to the user
            Error::Validation(message) => FormError::Invalid(FormErrors {
                non_field: vec![message],
                ..FormErrors::default()
            }),
            other => FormError::Failed(other),
        }
    }
}

/// Kind of HTML input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Text,
    Email,
    Password,
    Checkbox,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Email => "email",
            InputType::Password => "password",
            InputType::Checkbox => "checkbox",
        }
    }
}

/// Declared form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub label: String,
    pub input_type: InputType,
    pub required: bool,
}

impl FormField {
    pub fn new(name: &'static str, label: impl Into<String>, input_type: InputType) -> Self {
        Self {
            name,
            label: label.into(),
            input_type,
            required: false,
        }
    }

    pub fn text(name: &'static str, label: impl Into<String>) -> Self {
        Self::new(name, label, InputType::Text)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Field with its value and errors, ready for a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundField {
    pub name: String,
    pub label: String,
    pub input_type: &'static str,
    pub is_checkbox: bool,
    pub value: String,
    pub checked: bool,
    pub required: bool,
    pub errors: Vec<String>,
}

/// Bind declared fields to values; passwords are never echoed back
pub fn bind_fields(fields: &[FormField], data: &FormData, errors: &FormErrors) -> Vec<BoundField> {
    fields
        .iter()
        .map(|field| BoundField {
            name: field.name.to_string(),
            label: field.label.clone(),
            input_type: field.input_type.as_str(),
            is_checkbox: field.input_type == InputType::Checkbox,
            value: match field.input_type {
                InputType::Password => String::new(),
                _ => data.raw(field.name).to_string(),
            },
            checked: data.flag(field.name),
            required: field.required,
            errors: errors.for_field(field.name),
        })
        .collect()
}

/// Form creating or editing one model instance
#[async_trait]
pub trait ModelForm: Send + Sync + 'static {
    type Model: Model;

    fn fields(&self) -> Vec<FormField>;

    /// Values shown when editing `instance`
    fn initial(&self, instance: &Self::Model) -> FormData {
        let mut data = FormData::new();
        for field in self.fields() {
            let value = match instance.attr(field.name).map(Value::resolve) {
                Some(Value::Bool(true)) => "on".to_string(),
                Some(Value::Bool(false)) | Some(Value::Null) | None => String::new(),
                Some(value) => value.to_string(),
            };
            data.set(field.name, value);
        }
        data
    }

    /// Validate `data` and persist it; `instance` is `None` when creating
    async fn save(
        &self,
        pool: &SqlitePool,
        data: &FormData,
        instance: Option<&Self::Model>,
    ) -> Result<Self::Model, FormError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Input {
        #[validate(length(min = 1, message = "This field is required."))]
        username: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_validation_errors_become_field_messages() {
        let input = Input {
            username: String::new(),
            email: "nope".to_string(),
        };
        let errors: FormErrors = input.validate().unwrap_err().into();

        assert_eq!(errors.for_field("username"), vec!["This field is required."]);
        assert_eq!(
            errors.for_field("email"),
            vec!["Invalid value for field 'email'"]
        );
        assert!(errors.non_field.is_empty());
    }

    #[test]
    fn test_store_conflicts_are_shown_on_the_form() {
        let err: FormError =
            Error::Validation("A user with that username already exists.".to_string()).into();
        match err {
            FormError::Invalid(errors) => assert_eq!(
                errors.non_field,
                vec!["A user with that username already exists."]
            ),
            FormError::Failed(e) => panic!("unexpected failure: {}", e),
        }

        let err: FormError = Error::Database("locked".to_string()).into();
        assert!(matches!(err, FormError::Failed(_)));
    }

    #[test]
    fn test_bind_fields_hides_passwords() {
        let mut data = FormData::new();
        data.set("username", "dummy");
        data.set("password", "p0t4t0");
        data.set("is_staff", "on");
        let mut errors = FormErrors::default();
        errors.add("username", "Taken");

        let fields = vec![
            FormField::text("username", "Username").required(),
            FormField::new("password", "Password", InputType::Password),
            FormField::new("is_staff", "Staff status", InputType::Checkbox),
        ];
        let bound = bind_fields(&fields, &data, &errors);

        assert_eq!(bound[0].value, "dummy");
        assert_eq!(bound[0].errors, vec!["Taken"]);
        assert!(bound[0].required);
        assert_eq!(bound[1].value, "");
        assert!(bound[2].is_checkbox);
        assert!(bound[2].checked);
    }

    #[test]
    fn test_form_data_helpers() {
        let mut values = HashMap::new();
        values.insert("name".to_string(), "  ada ".to_string());
        let data = FormData::from(values);
        assert_eq!(data.text("name"), "ada");
        assert_eq!(data.raw("name"), "  ada ");
        assert_eq!(data.text("missing"), "");
        assert!(!data.flag("missing"));
    }
}
