//! SHIP CLI - install a bundle of infrastructure components into Kubernetes

use clap::{Parser, Subcommand};
use ship_core::ChartFailurePolicy;
use ship_kube::CancelSignal;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod exit_codes;

use commands::Context;
use commands::install::InstallArgs;

#[derive(Parser)]
#[command(name = "ship")]
#[command(version)]
#[command(about = "Install a bundle of infrastructure components into a Kubernetes cluster", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Bundle file (default: ./ship.yaml, then ~/.ship.yaml)
    #[arg(long, global = true, env = "SHIP_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    kube_context: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the bundle's components, in order
    Install {
        /// Domain substituted for ${domain} in chart overrides
        #[arg(long)]
        domain: String,

        /// Wait timeout in seconds (0 waits forever)
        #[arg(long)]
        timeout: Option<u64>,

        /// Status poll interval in milliseconds
        #[arg(long)]
        poll_interval: Option<u64>,

        /// What to do when a chart fails to install (abort, continue)
        #[arg(long, value_name = "POLICY")]
        on_chart_failure: Option<ChartFailurePolicy>,

        /// Don't register the bundle's chart repositories
        #[arg(long)]
        skip_repositories: bool,

        /// Print the steps that would run, without changing the cluster
        #[arg(long)]
        dry_run: bool,

        /// Print the final report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Remove the bundle's releases, last component first
    Uninstall {
        /// Confirm the removal
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List the configured components in install order
    Components,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "ship=debug,ship_kube=debug,ship_core=debug,info"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let ctx = Context {
        config: cli.config,
        kube_context: cli.kube_context,
    };

    let result = match cli.command {
        Commands::Install {
            domain,
            timeout,
            poll_interval,
            on_chart_failure,
            skip_repositories,
            dry_run,
            json,
        } => {
            let (handle, signal) = CancelSignal::pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling waits");
                    handle.cancel();
                }
            });

            let args = InstallArgs {
                domain,
                timeout,
                poll_interval,
                on_chart_failure,
                skip_repositories,
                dry_run,
                json,
            };
            commands::install::run(&ctx, &args, signal).await
        }

        Commands::Uninstall { yes } => commands::uninstall::run(&ctx, yes).await,

        Commands::Components => commands::components::run(&ctx),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
