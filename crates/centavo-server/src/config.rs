use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "centavo-server")]
#[command(about = "Centavo personal-finance API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, default_value_t = centavo_store::DEFAULT_MAX_CONNECTIONS, env = "DATABASE_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Address the HTTP server listens on
    #[arg(long, default_value = "0.0.0.0:8080", env = "BIND_ADDR")]
    pub bind_addr: SocketAddr,
}

#[derive(Subcommand, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Apply migrations and serve the API (default)
    #[default]
    Serve,
    /// Apply migrations and exit
    Migrate,
}
