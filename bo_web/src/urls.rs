//! ABOUTME: Named route registry with reverse lookups
//! ABOUTME: Turns `namespace:name` plus keyword arguments into a concrete path

use bo_core::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Raised when no route matches a name and argument set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Reverse for '{name}' with keyword arguments {kwargs:?} not found")]
pub struct NoReverseMatch {
    pub name: String,
    pub kwargs: Vec<String>,
}

/// Path pattern such as `/backoffice/users/{pk}/edit/`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    raw: String,
    placeholders: BTreeSet<String>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self> {
        let mut placeholders = BTreeSet::new();
        let mut rest = raw;
        while let Some(start) = rest.find('{') {
            let end = rest[start..]
                .find('}')
                .ok_or_else(|| Error::Config(format!("Unclosed placeholder in '{}'", raw)))?;
            let name = &rest[start + 1..start + end];
            if name.is_empty() {
                return Err(Error::Config(format!("Empty placeholder in '{}'", raw)));
            }
            placeholders.insert(name.to_string());
            rest = &rest[start + end + 1..];
        }
        Ok(Self {
            raw: raw.to_string(),
            placeholders,
        })
    }
}

/// Registry of named routes
#[derive(Debug, Clone, Default)]
pub struct UrlResolver {
    routes: HashMap<String, Pattern>,
}

impl UrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route; names must be unique
    pub fn register(&mut self, name: &str, pattern: &str) -> Result<()> {
        if self.routes.contains_key(name) {
            return Err(Error::Config(format!("Route '{}' is registered twice", name)));
        }
        self.routes.insert(name.to_string(), Pattern::parse(pattern)?);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Build the path of `name`; the keyword names must match the placeholders exactly
    pub fn reverse(
        &self,
        name: &str,
        kwargs: &[(&str, &str)],
    ) -> std::result::Result<String, NoReverseMatch> {
        let no_match = || NoReverseMatch {
            name: name.to_string(),
            kwargs: kwargs.iter().map(|(k, _)| k.to_string()).collect(),
        };

        let pattern = self.routes.get(name).ok_or_else(no_match)?;
        let given: BTreeSet<String> = kwargs.iter().map(|(k, _)| k.to_string()).collect();
        if given != pattern.placeholders || given.len() != kwargs.len() {
            return Err(no_match());
        }

        let mut path = pattern.raw.clone();
        for (key, value) in kwargs {
            // Primary keys are integers, like the routes that accept them
            let valid = !value.is_empty()
                && (*key != "pk" || value.chars().all(|c| c.is_ascii_digit()));
            if !valid {
                return Err(no_match());
            }
            let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
            path = path.replace(&format!("{{{}}}", key), &encoded);
        }
        Ok(path)
    }

    /// Reverse without arguments, empty when the route is unknown
    pub fn reverse_or_empty(&self, name: &str) -> String {
        self.reverse(name, &[]).unwrap_or_default()
    }
}

/// Actix path for a registered pattern; `{pk}` only matches digits
pub fn actix_path(pattern: &str) -> String {
    pattern.replace("{pk}", r"{pk:\d+}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        let mut urls = UrlResolver::new();
        urls.register("backoffice:index", "/backoffice/").unwrap();
        urls.register("backoffice:user-detail", "/backoffice/users/{pk}/")
            .unwrap();
        urls
    }

    #[test]
    fn test_reverse_without_arguments() {
        let urls = resolver();
        assert_eq!(urls.reverse("backoffice:index", &[]).unwrap(), "/backoffice/");
        assert_eq!(urls.reverse_or_empty("backoffice:sign-out"), "");
    }

    #[test]
    fn test_reverse_with_pk() {
        let urls = resolver();
        assert_eq!(
            urls.reverse("backoffice:user-detail", &[("pk", "12")]).unwrap(),
            "/backoffice/users/12/"
        );
    }

    #[test]
    fn test_reverse_argument_mismatch() {
        let urls = resolver();
        assert!(urls.reverse("backoffice:user-detail", &[]).is_err());
        assert!(urls
            .reverse("backoffice:user-detail", &[("slug", "ada")])
            .is_err());
        assert!(urls
            .reverse("backoffice:user-detail", &[("pk", "abc")])
            .is_err());
        assert!(urls
            .reverse("backoffice:user-detail", &[("pk", "1"), ("pk", "2")])
            .is_err());
        assert!(urls.reverse("backoffice:index", &[("pk", "1")]).is_err());

        let err = urls.reverse("other:thing", &[]).unwrap_err();
        assert_eq!(err.name, "other:thing");
    }

    #[test]
    fn test_duplicate_and_malformed_routes() {
        let mut urls = resolver();
        assert!(urls.register("backoffice:index", "/again/").is_err());
        assert!(urls.register("broken", "/a/{pk/").is_err());
        assert!(urls.register("empty", "/a/{}/").is_err());
    }

    #[test]
    fn test_actix_path() {
        assert_eq!(actix_path("/b/users/{pk}/edit/"), r"/b/users/{pk:\d+}/edit/");
        assert_eq!(actix_path("/b/users/"), "/b/users/");
    }
}
