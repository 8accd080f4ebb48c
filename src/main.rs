use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aklow_gateway::{
    api::{self, routes::PROXY_ROUTES, AppState},
    auth::{SessionClaims, SessionSigner},
    config::GatewayConfig,
    db,
};

#[derive(Parser)]
#[command(name = "aklow")]
#[command(about = "Tenant-aware API gateway for the AKLOW web app")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Issue a development session token
    Token {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        user: String,

        #[arg(long)]
        email: Option<String>,

        /// Lifetime in hours
        #[arg(long, default_value = "12")]
        hours: i64,
    },
    /// Print the backend proxy route table
    Routes,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "aklow_gateway=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let db = db::Database::open_default(config.data_dir.clone())?;
    db.migrate()?;

    let app = api::create_router(AppState::new(config, db)?);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("AKLOW gateway listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(&host, port).await?,
        Some(Commands::Token {
            tenant,
            user,
            email,
            hours,
        }) => {
            let config = GatewayConfig::from_env()?;
            let signer = SessionSigner::new(&config.session_secret);
            let token = signer.issue(&SessionClaims {
                sub: user,
                tenant_id: tenant,
                email,
                exp: (chrono::Utc::now() + chrono::Duration::hours(hours)).timestamp(),
            })?;
            println!("{}", token);
        }
        Some(Commands::Routes) => {
            for route in PROXY_ROUTES {
                println!(
                    "{:<7} {:<45} -> {:<12} {}{}",
                    route.verb.as_str(),
                    route.path,
                    route.backend.as_str(),
                    route.upstream,
                    route
                        .entitlement
                        .map(|e| format!("  [{}]", e))
                        .unwrap_or_default()
                );
            }
        }
        None => serve("127.0.0.1", 3000).await?,
    }

    Ok(())
}
