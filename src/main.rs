#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;
use tokio::io::BufReader;
use tokio::runtime::Builder;
use tokio::signal;

use ledsync::{
    capture, control,
    controller::HomeAssistant,
    models::Config,
    sync::Supervisor,
};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    #[structopt(short, long = "config", default_value = "ledsync.toml")]
    config_path: PathBuf,
    /// Access token for the lighting controller, overrides the configuration file
    #[structopt(long, env = "HA_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[structopt(long)]
    dump_config: bool,
    /// Start sampling without waiting for a start command
    #[structopt(long)]
    autostart: bool,
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    // Load configuration
    let config = Config::load_file(&opts.config_path)
        .await?
        .with_token(opts.token.clone());

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_string()?);
        return Ok(());
    }

    info!(
        url = %config.controller.url,
        entity = %config.controller.entity,
        token = %config.masked_token(),
        interval = ?config.sync.update_interval(),
        threshold = config.sync.color_change_threshold,
        "loaded configuration"
    );

    let source = capture::from_config(&config.capture)?;

    let controller = match config.token() {
        Some(token) => Some(HomeAssistant::new(&config.controller, token)?),
        None => {
            warn!("no access token configured, the light will not be updated");
            None
        }
    };

    let (supervisor, handle) = Supervisor::new(Arc::new(config), source, controller);
    let mut supervisor = tokio::spawn(supervisor.run());

    if opts.autostart {
        handle.start().await?;
    }

    // Operator commands from standard input
    tokio::spawn({
        let handle = handle.clone();

        async move {
            if let Err(error) = control::drive(BufReader::new(tokio::io::stdin()), handle).await {
                error!(error = %error, "control input error");
            }
        }
    });

    eprintln!("Commands: start, stop, quit");

    let result = tokio::select! {
        _ = signal::ctrl_c() => None,
        result = &mut supervisor => Some(result),
    };

    let result = match result {
        Some(result) => result,
        None => {
            info!("interrupted");

            // ok: the supervisor may have exited in the meantime
            handle.quit().await.ok();
            supervisor.await
        }
    };

    result??;
    Ok(())
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = EnvFilter::try_from_env("LEDSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "ledsync=warn",
            1 => "ledsync=info",
            2 => "ledsync=debug",
            _ => "ledsync=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    let result = rt.block_on(run(opts));

    // The stdin reader blocks a thread until the next line
    rt.shutdown_background();
    result
}
