use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use portfolio_admin::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so table and JSON output stay clean on stdout
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match cli::parse_args(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", cli::usage("ppadmin"));
            std::process::exit(cli::EXIT_USAGE);
        }
    };

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "ppadmin", "ppadmin starting: RUST_LOG='{}', json={}", rust_log, args.json);

    let code = cli::run(args).await?;
    std::process::exit(code);
}
