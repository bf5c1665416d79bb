use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    let filter = tracing_subscriber::EnvFilter::try_from_env("AKR_LOG")
        .unwrap_or_else(|_| "akr=warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    let code = match akr::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            akr::exit_code_for(&e)
        }
    };
    std::process::exit(code)
}
