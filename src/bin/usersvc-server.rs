//! usersvc 服务端

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use usersvc::{Config, UserServer, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "usersvc-server")]
#[command(about = "User CRUD service", long_about = None)]
struct Args {
    /// 配置文件路径（TOML），缺省使用内置默认值
    #[arg(short, long, env = "USERSVC_CONFIG")]
    config: Option<String>,

    /// 覆盖监听端口
    #[arg(long, env = "USERSVC_PORT")]
    port: Option<u16>,

    /// 不向注册中心自注册
    #[arg(long)]
    no_register: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path).with_context(|| format!("failed to load {}", path))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_register {
        config.registry.enabled = false;
    }

    init_tracing(&config.log)?;

    let server = UserServer::from_config(&config).await?;
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    server.serve(shutdown).await?;
    Ok(())
}
