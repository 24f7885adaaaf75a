mod display;

use prstatus::{GitHub, fetch_report, parse_args, setup_github_client};

use display::{StderrProgress, display_report};

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (spec, display_options) = match parse_args(std::env::args()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let forge = GitHub::new(setup_github_client()?);
    let progress = StderrProgress::new();
    let result = fetch_report(&spec, &forge, &progress).await;
    progress.finish();

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if err
                .downcast_ref::<prstatus::Error>()
                .is_some_and(prstatus::Error::is_auth)
            {
                eprintln!("Error: {err:#}");
                eprintln!(
                    "Refresh GITHUB_TOKEN/GH_TOKEN or run 'gh auth login', then try again."
                );
                std::process::exit(1);
            }
            return Err(err);
        }
    };

    let mut stdout = std::io::stdout();
    display_report(&report, &display_options, &mut stdout)?;

    Ok(())
}
