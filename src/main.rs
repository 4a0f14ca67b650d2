use anyhow::Context;
use covers_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load covers settings")?;
    covers_telemetry::init(&settings.telemetry)?;

    covers_app::serve(settings).await
}
