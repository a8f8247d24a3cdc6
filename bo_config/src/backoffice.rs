//! ABOUTME: Backoffice presentation settings with per-site overrides
//! ABOUTME: Resolves the selected site into one validated settings value

use bo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

/// Name of the site used when no override is selected
pub const DEFAULT_SITE: &str = "default";

/// Rule turning an attribute into a link to a detail page
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetailLinkRule {
    /// Attribute names the rule applies to
    pub names: Vec<String>,
    /// Link to the related record (true) or to the record itself (false)
    #[serde(default = "default_follow")]
    pub follow: bool,
    /// Route parameter used in the reverse lookup, `pk` when unset
    #[serde(default)]
    pub lookup_field: Option<String>,
}

fn default_follow() -> bool {
    true
}

impl DetailLinkRule {
    pub fn lookup_field(&self) -> &str {
        self.lookup_field.as_deref().unwrap_or("pk")
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// One entry of a sidebar group
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SidebarSection {
    /// Resource name, lowercased to find the `<name>-list` route
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub permission: Option<String>,
}

/// Labelled group of sidebar sections
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SidebarGroup {
    pub label: String,
    #[serde(default)]
    pub sections: Vec<SidebarSection>,
}

/// Fully resolved backoffice settings for the running site
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct BackofficeSettings {
    #[validate(length(min = 1))]
    pub title: String,
    pub logo: Option<String>,
    pub none_value: String,
    /// Placeholder for empty images, falls back to `none_value`
    pub no_image_value: Option<String>,
    #[validate(custom(function = "validate_namespace"))]
    pub url_namespace: String,
    #[validate(length(min = 1))]
    pub boolean_true_class: String,
    #[validate(length(min = 1))]
    pub boolean_false_class: String,
    pub status_fields: Vec<String>,
    pub status_tag_classes: HashMap<String, String>,
    pub default_status_class: String,
    pub details_urls: Vec<DetailLinkRule>,
    pub sidebar: Vec<SidebarGroup>,
    #[validate(length(min = 1))]
    pub primary_color: String,
    #[validate(length(min = 1))]
    pub accent_color: String,
    pub media_url: String,
    #[validate(range(min = 1, max = 1000))]
    pub paginate_by: u32,
}

impl Default for BackofficeSettings {
    fn default() -> Self {
        Self {
            title: "backoffice".to_string(),
            logo: None,
            none_value: "-".to_string(),
            no_image_value: None,
            url_namespace: "backoffice".to_string(),
            boolean_true_class: "text-green-600".to_string(),
            boolean_false_class: "text-red-500".to_string(),
            status_fields: vec!["status".to_string()],
            status_tag_classes: HashMap::new(),
            default_status_class: "bg-gray-200".to_string(),
            details_urls: vec![
                DetailLinkRule {
                    names: vec!["pk".to_string(), "id".to_string()],
                    follow: false,
                    lookup_field: None,
                },
                DetailLinkRule {
                    names: vec!["user".to_string(), "owner".to_string()],
                    follow: true,
                    lookup_field: None,
                },
            ],
            sidebar: Vec::new(),
            primary_color: "#011b67".to_string(),
            accent_color: "#fff".to_string(),
            media_url: "/media/".to_string(),
            paginate_by: 15,
        }
    }
}

impl BackofficeSettings {
    pub fn no_image_value(&self) -> &str {
        self.no_image_value.as_deref().unwrap_or(&self.none_value)
    }

    pub fn is_status_field(&self, name: &str) -> bool {
        self.status_fields.iter().any(|f| f == name)
    }

    pub fn status_class(&self, status: &str) -> &str {
        self.status_tag_classes
            .get(status)
            .map(String::as_str)
            .unwrap_or(&self.default_status_class)
    }

    /// Qualify a route name with the configured namespace
    pub fn route_name(&self, name: &str) -> String {
        format!("{}:{}", self.url_namespace, name)
    }
}

fn validate_namespace(namespace: &str) -> std::result::Result<(), ValidationError> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("url_namespace"))
    }
}

/// Per-site overrides; unset fields keep the default value
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteOverrides {
    pub title: Option<String>,
    pub logo: Option<String>,
    pub none_value: Option<String>,
    pub no_image_value: Option<String>,
    pub url_namespace: Option<String>,
    pub boolean_true_class: Option<String>,
    pub boolean_false_class: Option<String>,
    pub status_fields: Option<Vec<String>>,
    pub status_tag_classes: Option<HashMap<String, String>>,
    pub default_status_class: Option<String>,
    pub details_urls: Option<Vec<DetailLinkRule>>,
    pub sidebar: Option<Vec<SidebarGroup>>,
    pub primary_color: Option<String>,
    pub accent_color: Option<String>,
    pub media_url: Option<String>,
    pub paginate_by: Option<u32>,
}

impl SiteOverrides {
    fn apply(&self, settings: &mut BackofficeSettings) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    settings.$field = value.clone();
                })*
            };
        }

        merge!(
            title,
            none_value,
            url_namespace,
            boolean_true_class,
            boolean_false_class,
            status_fields,
            status_tag_classes,
            default_status_class,
            details_urls,
            sidebar,
            primary_color,
            accent_color,
            media_url,
            paginate_by,
        );
        if self.logo.is_some() {
            settings.logo = self.logo.clone();
        }
        if self.no_image_value.is_some() {
            settings.no_image_value = self.no_image_value.clone();
        }
    }
}

/// Backoffice section of the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackofficeConfig {
    /// Key of the site whose overrides apply
    pub site: String,
    pub defaults: BackofficeSettings,
    pub sites: HashMap<String, SiteOverrides>,
}

impl Default for BackofficeConfig {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            defaults: BackofficeSettings::default(),
            sites: HashMap::new(),
        }
    }
}

impl BackofficeConfig {
    /// Merge the selected site's overrides into the defaults and validate
    pub fn resolve(&self) -> Result<BackofficeSettings> {
        let mut settings = self.defaults.clone();

        match self.sites.get(&self.site) {
            Some(overrides) => overrides.apply(&mut settings),
            None if self.site == DEFAULT_SITE => {}
            None => {
                return Err(Error::Config(format!(
                    "Unknown backoffice site '{}'",
                    self.site
                )))
            }
        }

        settings.validate().map_err(|e| {
            Error::Config(format!(
                "Backoffice settings for site '{}' are invalid: {}",
                self.site, e
            ))
        })?;

        tracing::debug!(site = %self.site, title = %settings.title, "Backoffice settings resolved");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let settings = BackofficeConfig::default()
            .resolve()
            .expect("defaults are valid");

        assert_eq!(settings.title, "backoffice");
        assert_eq!(settings.none_value, "-");
        assert_eq!(settings.no_image_value(), "-");
        assert_eq!(settings.url_namespace, "backoffice");
        assert!(settings.is_status_field("status"));
        assert_eq!(settings.status_class("anything"), "bg-gray-200");
        assert_eq!(settings.details_urls.len(), 2);
        assert!(!settings.details_urls[0].follow);
        assert!(settings.details_urls[1].follow);
        assert_eq!(settings.details_urls[1].lookup_field(), "pk");
    }

    #[test]
    fn test_site_overrides_apply() {
        let mut config = BackofficeConfig::default();
        config.sites.insert(
            "partner".to_string(),
            SiteOverrides {
                title: Some("Partner portal".to_string()),
                none_value: Some("n/a".to_string()),
                status_tag_classes: Some(HashMap::from([(
                    "active".to_string(),
                    "success".to_string(),
                )])),
                ..Default::default()
            },
        );
        config.site = "partner".to_string();

        let settings = config.resolve().expect("partner site resolves");
        assert_eq!(settings.title, "Partner portal");
        assert_eq!(settings.none_value, "n/a");
        assert_eq!(settings.no_image_value(), "n/a");
        assert_eq!(settings.status_class("active"), "success");
        // Untouched fields keep their defaults
        assert_eq!(settings.primary_color, "#011b67");
    }

    #[test]
    fn test_default_site_overrides_are_used() {
        let mut config = BackofficeConfig::default();
        config.sites.insert(
            DEFAULT_SITE.to_string(),
            SiteOverrides {
                accent_color: Some("#000".to_string()),
                ..Default::default()
            },
        );

        let settings = config.resolve().unwrap();
        assert_eq!(settings.accent_color, "#000");
    }

    #[test]
    fn test_unknown_site_is_rejected() {
        let config = BackofficeConfig {
            site: "missing".to_string(),
            ..Default::default()
        };

        let err = config.resolve().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        let mut config = BackofficeConfig::default();
        config.defaults.url_namespace = "back office/".to_string();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_detail_rule_deserializes_with_defaults() {
        let rule: DetailLinkRule =
            serde_json::from_value(serde_json::json!({"names": ["owner"]})).unwrap();
        assert!(rule.follow);
        assert_eq!(rule.lookup_field(), "pk");
        assert!(rule.matches("owner"));
        assert!(!rule.matches("user"));
    }
}
