//! ABOUTME: Sidebar menu built from the configured groups and the viewer's permissions
//! ABOUTME: Groups left without a visible section are omitted

use crate::{middleware::Viewer, urls::UrlResolver};
use bo_config::BackofficeSettings;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarLink {
    pub url: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub label: String,
    pub links: Vec<SidebarLink>,
}

/// Menu for `viewer` on `path`
pub fn build_sidebar(
    settings: &BackofficeSettings,
    urls: &UrlResolver,
    viewer: Option<&Viewer>,
    path: &str,
) -> Vec<SidebarEntry> {
    let mut entries = Vec::new();
    for group in &settings.sidebar {
        let mut links = Vec::new();
        for section in &group.sections {
            if let Some(permission) = &section.permission {
                if !viewer.is_some_and(|v| v.has_perm(permission)) {
                    continue;
                }
            }

            let route = settings.route_name(&format!("{}-list", section.name.to_lowercase()));
            match urls.reverse(&route, &[]) {
                Ok(url) => links.push(SidebarLink {
                    active: path.starts_with(&url),
                    url,
                    label: section.label.clone(),
                }),
                Err(e) => warn!("Skipping sidebar section '{}': {}", section.name, e),
            }
        }
        if !links.is_empty() {
            entries.push(SidebarEntry {
                label: group.label.clone(),
                links,
            });
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_config::{SidebarGroup, SidebarSection};
    use bo_db::User;

    fn viewer(permissions: &[&str], is_superuser: bool) -> Viewer {
        Viewer {
            user: User {
                id: 1,
                username: "dummy".to_string(),
                password_hash: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                is_superuser,
                is_staff: true,
                is_active: true,
                date_joined: "2021-01-01T00:00:00Z".to_string(),
                last_login: None,
                group_entries: None,
            },
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn settings() -> BackofficeSettings {
        let mut settings = BackofficeSettings::default();
        settings.sidebar = vec![
            SidebarGroup {
                label: "Auth".to_string(),
                sections: vec![SidebarSection {
                    name: "User".to_string(),
                    label: "Users".to_string(),
                    permission: Some("auth.view_user".to_string()),
                }],
            },
            SidebarGroup {
                label: "Inventory".to_string(),
                sections: vec![
                    SidebarSection {
                        name: "Stuff".to_string(),
                        label: "Stuffs".to_string(),
                        permission: None,
                    },
                    SidebarSection {
                        name: "Ghost".to_string(),
                        label: "Ghosts".to_string(),
                        permission: None,
                    },
                ],
            },
        ];
        settings
    }

    fn urls() -> UrlResolver {
        let mut urls = UrlResolver::new();
        urls.register("backoffice:user-list", "/backoffice/users/")
            .unwrap();
        urls.register("backoffice:stuff-list", "/backoffice/stuffs/")
            .unwrap();
        urls
    }

    #[test]
    fn test_missing_permission_hides_group() {
        let viewer = viewer(&[], false);
        let menu = build_sidebar(&settings(), &urls(), Some(&viewer), "/backoffice/");

        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Inventory");
        assert_eq!(menu[0].links.len(), 1);
        assert_eq!(menu[0].links[0].url, "/backoffice/stuffs/");
    }

    #[test]
    fn test_granted_permission_and_active_link() {
        let viewer = viewer(&["auth.view_user"], false);
        let menu = build_sidebar(
            &settings(),
            &urls(),
            Some(&viewer),
            "/backoffice/users/3/edit/",
        );

        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].label, "Auth");
        assert!(menu[0].links[0].active);
        assert!(!menu[1].links[0].active);
    }

    #[test]
    fn test_superuser_and_anonymous() {
        let admin = viewer(&[], true);
        let menu = build_sidebar(&settings(), &urls(), Some(&admin), "/");
        assert_eq!(menu.len(), 2);

        let menu = build_sidebar(&settings(), &urls(), None, "/");
        assert_eq!(menu.len(), 1);
    }
}
