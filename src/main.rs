//! ESP32 Exception Decoder MCP Server

use std::path::Path;

use clap::Parser;
use tracing::{info, error, debug};
use tracing_subscriber::{EnvFilter, fmt};
use rmcp::{ServiceExt, transport::stdio};

use esp_exception_decoder::{
    Config, config::Args, crash_log, decode, report::{self, ReportFormat}, tools::DecoderToolHandler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = Config::from_args(&args)?;

    if let Some(crash_log) = &args.decode {
        return decode_once(&config, crash_log, args.format).await;
    }

    info!("Starting ESP32 Exception Decoder MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let service = DecoderToolHandler::new(config)
        .serve(stdio()).await.inspect_err(|e| {
            error!("Serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

/// Decode a saved crash log and print the report to stdout
async fn decode_once(
    config: &Config,
    log_path: &Path,
    format: ReportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = crash_log::read_log(log_path)?;
    let outcome = decode(&config.decoder_config(), &text).await.inspect_err(|e| {
        error!("Error during decoding: {}", e);
    })?;
    println!("{}", report::render(&outcome, format)?);
    Ok(())
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", args.log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use esp_exception_decoder::config::Args;
    use esp_exception_decoder::report::ReportFormat;

    #[test]
    fn test_args_parsing_decode_mode() {
        let args = Args::parse_from([
            "esp-exception-decoder",
            "--decode", "/tmp/panic.log",
            "--format", "html",
            "--elf", "/fw/app.elf",
            "--gdb", "/opt/xtensa-esp32-elf-gdb",
            "--timeout-secs", "20",
        ]);
        assert_eq!(args.decode.unwrap().to_str().unwrap(), "/tmp/panic.log");
        assert_eq!(args.format, ReportFormat::Html);
        assert_eq!(args.elf.unwrap().to_str().unwrap(), "/fw/app.elf");
        assert_eq!(args.timeout_secs, Some(20));
    }

    #[test]
    fn test_args_rejects_unknown_format() {
        let result = Args::try_parse_from(["esp-exception-decoder", "--format", "pdf"]);
        assert!(result.is_err());
    }
}
