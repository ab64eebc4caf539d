use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rpc_core::config::RpcConfig;
use rpc_core::error::Result;
use rpc_core::plugins::registry::HandlerRegistry;
use rpc_core::services::connection::FramedConnection;
use rpc_core::services::echo::{self, Echo};
use rpc_core::services::rpc_handler::RpcRequestHandler;
use rpc_core::services::server::RpcServer;
use rpc_core::transport::request_id::RequestIds;
use rpc_core::{InFlightRequests, RequestDispatcher, RpcClient, RpcTransport, SerializerRegistry};

#[derive(Parser, Debug)]
#[command(name = "rpc-core")]
#[command(about = "Request/response RPC over TCP")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 9999)]
    port: u16,

    #[arg(long, env = "RPC_CORE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the echo service.
    Serve,
    /// Call the echo service.
    Call { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rpc_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RpcConfig::from_file(path)?,
        None => RpcConfig::default(),
    };
    let serializers = Arc::new(SerializerRegistry::with_defaults()?);
    let addr = format!("{}:{}", cli.host, cli.port);

    match cli.command {
        Commands::Serve => {
            let mut rpc_handler = RpcRequestHandler::new(serializers);
            echo::register(&mut rpc_handler);
            let mut handlers = HandlerRegistry::new();
            handlers.register_handler(Arc::new(rpc_handler));

            let dispatcher = RequestDispatcher::new(Arc::new(handlers));
            RpcServer::bind(&addr, dispatcher, &config).await?.serve().await
        }
        Commands::Call { text } => {
            let in_flight = Arc::new(InFlightRequests::new(&config));
            let connection = FramedConnection::connect(&addr, in_flight.clone(), &config).await?;
            let transport = RpcTransport::new(connection, in_flight.clone());
            let client = RpcClient::new(Arc::new(transport), serializers, Arc::new(RequestIds::new()));

            let reply = client.call::<Echo>(&text).await?;
            println!("{reply}");
            in_flight.shutdown();
            Ok(())
        }
    }
}
