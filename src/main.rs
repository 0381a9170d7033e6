use ara::Provider;
use ara::core::config;
use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;

#[derive(Parser)]
#[command(name = "ara", about = "Chat with Ara from the terminal")]
struct Args {
    /// Completion backend to use (overrides config file and ARA_PROVIDER)
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Model name (overrides config file and ARA_MODEL)
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to ara.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("ara.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ara: {e}");
            log::warn!("Falling back to default config: {}", e);
            config::AraConfig::default()
        }
    };
    let resolved = config::resolve(&file_config, args.provider, args.model.as_deref());

    log::info!(
        "Ara starting up with provider: {:?}, model: {}",
        resolved.provider,
        resolved.model_name
    );

    ara::cli::run(resolved).await
}
