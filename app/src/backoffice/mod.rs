//! ABOUTME: Assembles the host backoffice from its resources
//! ABOUTME: Adds the site's sidebar and status tags when the configuration leaves them out

use bo_config::{BackofficeSettings, SidebarGroup, SidebarSection};
use bo_core::Result;
use bo_web::Backoffice;

pub mod statistics;
pub mod stuffs;
pub mod users;

pub use statistics::DashboardStatistics;

fn section(name: &str, label: &str) -> SidebarSection {
    SidebarSection {
        name: name.to_string(),
        label: label.to_string(),
        permission: None,
    }
}

/// Fill the sidebar and status classes this site relies on, keeping configured values
pub fn with_site_defaults(mut settings: BackofficeSettings) -> BackofficeSettings {
    if settings.sidebar.is_empty() {
        settings.sidebar = vec![SidebarGroup {
            label: "Data".to_string(),
            sections: vec![section("user", "User"), section("stuff", "Stuff")],
        }];
    }
    if settings.status_tag_classes.is_empty() {
        for (status, class) in [("idle", "warning"), ("active", "success"), ("error", "danger")] {
            settings
                .status_tag_classes
                .insert(status.to_string(), class.to_string());
        }
    }
    settings
}

/// The complete backoffice served by this application
pub fn build(settings: BackofficeSettings) -> Result<Backoffice> {
    let backoffice = Backoffice::new(with_site_defaults(settings))
        .resource(users::resource()?)
        .resource(stuffs::resource()?)
        .statistics(DashboardStatistics);

    // Reject duplicated routes before serving
    backoffice.url_resolver()?;
    Ok(backoffice)
}
