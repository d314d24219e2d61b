//! direkt: serve the ERP demo router, or print its remoting API description.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use direkt_core::{parse_version, Operation, Rights, RouterConfig, ServerConfig};
use direkt_rs::{Application, ErpModule, MemoryStore, StaticUsers};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "direkt")]
#[command(about = "Batched JSON RPC router for ERP handler groups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP router until Ctrl-C.
    Serve(ServeArgs),
    /// Print the remoting API description as JSON and exit.
    Api(PathArgs),
}

#[derive(Args)]
struct PathArgs {
    /// Router endpoint path
    #[arg(long, env = "DIREKT_PATH", default_value = "router")]
    path: String,
    /// API descriptor path
    #[arg(long, env = "DIREKT_API_PATH", default_value = "api")]
    api_path: String,
    /// Client namespace advertised in the API description
    #[arg(long, env = "DIREKT_NAMESPACE")]
    namespace: Option<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
    #[command(flatten)]
    paths: PathArgs,
    /// Version of the host ERP (e.g. 3.5)
    #[arg(long, env = "DIREKT_HOST_VERSION")]
    host_version: Option<String>,
    /// Oldest host version the handlers support
    #[arg(long, env = "DIREKT_MIN_HOST_VERSION")]
    min_host_version: Option<String>,
    /// Leave the `where` trace out of exception envelopes
    #[arg(long)]
    no_debug: bool,
    /// JSON file with the login -> rights table; built-in demo users otherwise
    #[arg(long, env = "DIREKT_USERS")]
    users: Option<PathBuf>,
}

fn demo_users() -> StaticUsers {
    StaticUsers::new()
        .user("admin", Rights::new().grant_all("category").grant_all("order"))
        .user(
            "viewer",
            Rights::new()
                .grant("category", Operation::Read)
                .grant("order", Operation::Read),
        )
}

fn application(paths: &PathArgs) -> Result<Application, direkt_rs::CoreError> {
    let mut app = Application::new();
    app.set_server_config(ServerConfig::default().with_paths(&paths.path, &paths.api_path));
    app.set_router_config(RouterConfig {
        namespace: paths.namespace.clone(),
        ..RouterConfig::default()
    });
    app.register(&mut ErpModule::new().store(MemoryStore::new()))?;
    Ok(app)
}

fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut app = application(&args.paths)?;
    app.set_server_config(ServerConfig::new(&args.host, args.port).with_paths(&args.paths.path, &args.paths.api_path));

    let mut router = app.router_config().clone();
    router.host_version = args.host_version.as_deref().map(parse_version).transpose()?;
    router.min_host_version = args.min_host_version.as_deref().map(parse_version).transpose()?;
    router.debug = !args.no_debug;
    app.set_router_config(router);

    let users = match &args.users {
        Some(path) => StaticUsers::from_file(path)?,
        None => demo_users(),
    };
    tracing::info!(users = users.len(), "authenticator ready");
    app.set_authenticator(users);
    app.run()
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "direkt=info,direkt_core=info,direkt_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args),
        Commands::Api(paths) => {
            let app = application(&paths)?;
            println!("{}", serde_json::to_string_pretty(&app.api_descriptor())?);
            Ok(())
        }
    }
}
