use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tollgate_core::client::ApiClient;
use tollgate_core::{ClientConfig, ConfigError};

/// Fetch URLs through a bounded-concurrency, retrying request governor.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version)]
struct Args {
    /// TOML config file (base_url, timeout_ms, [governor] ...).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override governor.max_concurrency.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override governor.max_attempts.
    #[arg(long)]
    attempts: Option<u32>,

    /// Override governor.base_delay_ms.
    #[arg(long)]
    base_delay_ms: Option<u64>,

    /// Print governor stats as JSON when done.
    #[arg(long)]
    stats: bool,

    /// URLs or paths relative to base_url.
    #[arg(required = true)]
    urls: Vec<String>,
}

fn load_config(args: &Args) -> Result<ClientConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(n) = args.concurrency {
        config.governor.max_concurrency = n;
    }
    if let Some(n) = args.attempts {
        config.governor.max_attempts = n;
    }
    if let Some(ms) = args.base_delay_ms {
        config.governor.base_delay_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    let client = match ApiClient::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        urls = args.urls.len(),
        max_concurrency = config.governor.max_concurrency,
        max_attempts = config.governor.max_attempts,
        "fetching"
    );

    // 全部まとめて投入し、admission 順に結果を表示する
    let handles: Vec<_> = args
        .urls
        .iter()
        .map(|url| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let result = client.get(&url).await;
                (url, result)
            })
        })
        .collect();

    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok((url, Ok(resp))) => {
                println!("{url}\t{}\t{} bytes", resp.status, resp.body.len());
            }
            Ok((url, Err(e))) => {
                failed += 1;
                let kind = e
                    .governor_error()
                    .map(|g| g.kind().to_string())
                    .unwrap_or_else(|| "client".to_string());
                println!("{url}\terror({kind})\t{e}");
            }
            Err(e) => {
                failed += 1;
                eprintln!("task failed: {e}");
            }
        }
    }

    if args.stats {
        match serde_json::to_string_pretty(&client.governor().stats()) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to encode stats: {e}"),
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = Args::parse_from([
            "tollgate",
            "--concurrency",
            "2",
            "--attempts",
            "4",
            "https://example.com/",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.governor.max_concurrency, 2);
        assert_eq!(config.governor.max_attempts, 4);
        assert_eq!(config.governor.base_delay_ms, 1000);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = Args::parse_from(["tollgate", "--concurrency", "0", "https://example.com/"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn oversized_concurrency_is_a_config_error() {
        let args = Args::parse_from([
            "tollgate",
            "--concurrency",
            "18446744073709551615",
            "https://example.com/",
        ]);
        assert!(matches!(load_config(&args), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn at_least_one_url_is_required() {
        assert!(Args::try_parse_from(["tollgate"]).is_err());
    }
}
