//! Tracing subscriber setup and the counters the services increment.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_POSTS_CREATED: &str = "yatube_posts_created_total";
pub const METRIC_POSTS_EDITED: &str = "yatube_posts_edited_total";
pub const METRIC_USERS_REGISTERED: &str = "yatube_users_registered_total";
pub const METRIC_LOGINS: &str = "yatube_logins_total";
pub const METRIC_LOGIN_FAILURES: &str = "yatube_login_failures_total";
pub const METRIC_PASSWORD_RESETS_REQUESTED: &str = "yatube_password_resets_requested_total";
pub const METRIC_SESSIONS_PURGED: &str = "yatube_sessions_purged_total";

const COUNTERS: [(&str, &str); 7] = [
    (METRIC_POSTS_CREATED, "Posts published through the create form."),
    (METRIC_POSTS_EDITED, "Posts updated by their authors."),
    (METRIC_USERS_REGISTERED, "Accounts created through signup."),
    (METRIC_LOGINS, "Successful logins."),
    (METRIC_LOGIN_FAILURES, "Rejected login attempts."),
    (METRIC_PASSWORD_RESETS_REQUESTED, "Password reset requests."),
    (METRIC_SESSIONS_PURGED, "Expired sessions removed by cleanup."),
];

static DESCRIBE: Once = Once::new();

/// Install the global subscriber. Fails if one is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    DESCRIBE.call_once(|| {
        for (name, description) in COUNTERS {
            describe_counter!(name, Unit::Count, description);
        }
    });

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber already set: {err}")))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}
