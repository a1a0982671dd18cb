use clap::Parser;
use tracing_subscriber::EnvFilter;

use paste_bot::{config::{Config, LogFormat}, errors::AppError, server::serve};

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = Config::parse();
    init_logging(&config);

    if let Err(err) = serve(config).await {
        tracing::error!(error = %err, "Server failed");
        return Err(err);
    }

    Ok(())
}
