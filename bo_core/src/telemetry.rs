//! ABOUTME: Tracing subscriber setup for the backoffice binaries
//! ABOUTME: Per-crate default levels, JSON lines in production and pretty output elsewhere

use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable overriding the default directives
pub const LOG_ENV_VAR: &str = "BACKOFFICE_LOG";

const WORKSPACE_TARGETS: &[&str] = &[
    "backoffice",
    "app",
    "bo_core",
    "bo_config",
    "bo_db",
    "bo_obs",
    "bo_web",
];

/// Filter directives used when neither `BACKOFFICE_LOG` nor `RUST_LOG` is set.
///
/// Workspace crates log at `debug` outside production. Request logs from
/// actix stay at `info` and sqlx statement logging is reduced to warnings.
pub fn default_directives(env: &str) -> String {
    let level = if env == "production" { "info" } else { "debug" };

    let mut directives = vec!["warn".to_string()];
    directives.extend(
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level)),
    );
    directives.push("actix_web=info".to_string());
    directives.push("sqlx=warn".to_string());
    directives.join(",")
}

fn env_filter(env: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)))
}

/// Initialize tracing once for the process; later calls are ignored
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        let filter = env_filter(env);

        if env == "production" {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().json())
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().pretty())
                .with(filter)
                .init();
        }

        tracing::info!(service = %service, env = %env, "Tracing initialized");
    });
}
