//! usersvc 命令行客户端

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::warn;

use usersvc::{CallContext, ClientConfig, Config, NewUser, User, UserClient, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "usersvc-client")]
#[command(about = "Discovers usersvc instances and calls them", long_about = None)]
struct Args {
    /// 配置文件路径（TOML）
    #[arg(short, long, env = "USERSVC_CONFIG")]
    config: Option<String>,

    /// 覆盖 Consul 地址
    #[arg(long, env = "CONSUL_ADDR")]
    consul: Option<String>,

    /// 直接使用给定实例，不连接 Consul（可重复）
    #[arg(long = "instance")]
    instances: Vec<String>,

    /// 整个调用的超时时间（毫秒）
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出所有用户
    List,
    /// 按 ID 查询用户
    Get { id: String, token: String },
    /// 创建用户
    Create {
        name: String,
        email: String,
        password: String,
    },
    /// 修改用户
    Patch {
        id: String,
        token: String,
        name: String,
        email: String,
    },
}

fn client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            Config::load_from_file(path)
                .with_context(|| format!("failed to load {}", path))?
                .client
        }
        None => ClientConfig::default(),
    };
    if let Some(consul) = &args.consul {
        config.consul_url = consul.clone();
    }
    if !args.instances.is_empty() {
        config.static_instances = args.instances.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log = match &args.config {
        Some(path) => Config::load_from_file(path)?.log,
        None => Default::default(),
    };
    init_tracing(&log)?;

    let config = client_config(&args)?;
    let client = UserClient::connect(&config).await?;
    if !client.wait_ready(1, Duration::from_secs(2)).await {
        warn!(service = %config.service, "No instances discovered yet");
    }

    let ctx = CallContext::with_timeout(Duration::from_millis(args.timeout_ms));
    let output = match args.command {
        Command::List => serde_json::to_string_pretty(&client.list_users(&ctx).await?)?,
        Command::Get { id, token } => serde_json::to_string_pretty(&client.get_user(&ctx, &id, &token).await?)?,
        Command::Create { name, email, password } => {
            let created = client
                .create_user(&ctx, NewUser { name, email, password })
                .await?;
            serde_json::to_string_pretty(&created)?
        }
        Command::Patch { id, token, name, email } => {
            let user = User {
                id: id.clone(),
                name,
                email,
                password: String::new(),
            };
            client.patch_user(&ctx, &id, user, &token).await?
        }
    };

    println!("{}", output);
    Ok(())
}
