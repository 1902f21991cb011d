use deadline_reminders::{api, config::Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deadline_reminders=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        offset_minutes = config.reminder_offset.num_minutes(),
        group = %config.target.group_name,
        "Starting deadline reminder service"
    );

    api::serve(config).await
}
