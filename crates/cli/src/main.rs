mod app;
mod cli;
mod config;

use clap::Parser as _;
use tessera_types::Hash;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use app::App;
use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

    let Cli {
        config,
        listen,
        data_dir,
        cmd,
    } = Cli::parse();

    let (path, config) = match config {
        Some(path) => Config::from_path(&path)?,
        None => Config::create_or_read_default()?,
    };
    let config = config.with_overrides(listen, data_dir);

    tracing::info!("config loaded from `{}`", path.display());

    let app = App::new(&config).await?;

    match cmd {
        Commands::Seed { file, piece_size } => {
            let piece_size = piece_size.unwrap_or(config.piece_size);
            app.seed(&file, piece_size).await?;
        }

        Commands::Download {
            root_hash,
            piece_count,
            hosts,
        } => {
            let root_hash = Hash::from_hex(&root_hash)?;
            app.download(root_hash, piece_count, hosts).await?;
        }

        Commands::Serve => {
            app.serve().await?;
        }
    }

    Ok(())
}
