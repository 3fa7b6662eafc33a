use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use samary::config::{DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_SIZE, DEFAULT_USER_AGENT};
use samary::logging::init_logging;
use samary::{FetchConfig, SamaryOptions, summarize};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "samary",
    version,
    about = "Summarize a URL into a safe-to-render JSON link preview"
)]
struct Cli {
    #[arg(value_name = "URL")]
    url: String,

    /// Accept-Language sent with the page request (e.g. "ja-JP,en;q=0.5")
    #[arg(short, long, value_name = "LANG")]
    language: Option<String>,

    #[arg(long, value_name = "UA", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(long, value_name = "MS", default_value_t = 20_000)]
    timeout_ms: u64,

    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_SIZE)]
    max_size: u64,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[arg(long, default_value_t = false)]
    log_json: bool,
}

impl Cli {
    fn options(&self) -> SamaryOptions {
        let fetch = FetchConfig::default()
            .with_timeout(Duration::from_millis(self.timeout_ms.max(1)))
            .with_max_size(self.max_size)
            .with_max_redirects(self.max_redirects)
            .with_user_agent(self.user_agent.clone());
        SamaryOptions::default()
            .with_language(self.language.clone())
            .with_fetch(fetch)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("samary: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let result = summarize(&cli.url, &cli.options()).await?;
    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");
    Ok(())
}
