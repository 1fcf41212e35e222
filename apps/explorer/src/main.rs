use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    derive_view, Credentials, HttpGateway, QueryCache, QueryClient, QueryStatus, SessionStore,
    SortDirection, SortField, ViewState,
};
use shared::domain::LaunchId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, normalize_base_url, Settings};
use render::{LaunchDetail, ListPage};

#[derive(Parser, Debug)]
#[command(name = "launch-explorer", about = "Browse SpaceX launches")]
struct Args {
    /// Overrides `api_base_url` from explorer.toml and the environment.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true, default_value = "guest")]
    username: String,
    #[arg(long, global = true, default_value = "")]
    password: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filtered, sorted, paginated launch list.
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = SortField::Date)]
        sort: SortField,
        #[arg(long, default_value_t = SortDirection::Descending)]
        direction: SortDirection,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// One launch together with the rocket that flew it.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = &args.base_url {
        settings.api_base_url = normalize_base_url(base_url);
    }

    let session = SessionStore::new(settings.authenticator());
    session
        .login(&Credentials::new(&args.username, &args.password))
        .await
        .context("login rejected")?;

    let gateway = HttpGateway::new(&settings.gateway_options())?;
    info!("explorer: using api base_url={}", gateway.base_url());
    let cache = Arc::new(QueryCache::new(settings.query_options()));
    let client = QueryClient::new(Arc::new(gateway), Arc::clone(&cache));

    let outcome = run(&client, &session, &settings, args.command).await;

    session.logout().await;
    cache.clear();
    outcome
}

async fn run(
    client: &QueryClient,
    session: &SessionStore,
    settings: &Settings,
    command: Command,
) -> Result<()> {
    session.require().await.context("not logged in")?;

    match command {
        Command::List {
            search,
            sort,
            direction,
            page,
            page_size,
            json,
        } => {
            let state = client.launches().await;
            if let Some(err) = state.error {
                return Err(err).context("could not load launches");
            }
            let launches = state.data.unwrap_or_default();
            let view = ViewState {
                search,
                sort_field: sort,
                sort_direction: direction,
                page,
                page_size: page_size.unwrap_or(settings.page_size),
            };
            let slice = derive_view(&launches, &view);

            if json {
                let page = ListPage::new(&slice, &view);
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                println!("{}", render::launch_table(&slice, &view));
            }
        }
        Command::Show { id, json } => {
            let detail = client.launch_detail(&LaunchId::from(id)).await;
            let status = detail.status();
            if let Some(err) = detail.parent.error {
                return Err(err).context("could not load launch");
            }
            let launch = detail
                .parent
                .data
                .context("launch request finished without data")?;

            if status == QueryStatus::Error {
                if let Some(err) = &detail.child.error {
                    warn!("explorer: rocket unavailable error={err}");
                }
            }
            let rocket = detail.child.data.as_deref();

            if json {
                let detail = LaunchDetail {
                    launch: &launch,
                    rocket,
                };
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("{}", render::launch_detail(&launch, rocket));
            }
        }
    }
    Ok(())
}
