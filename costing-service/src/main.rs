use costing_service::{config::get_configuration, Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = get_configuration()?;
    init_tracing(
        "costing-service",
        &settings.telemetry.log_level,
        settings.telemetry.otlp_endpoint.as_deref(),
    )?;

    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;

    Ok(())
}
