use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use poolctl_core::log::LogEntry;
use tokio::net::TcpListener;
use tracing::info;

use poolctl_mock_server::{state::new_state, MockBackend};

/// In-memory backend for trying the console without a real deployment.
/// Accounts: admin/admin-pass and alice/alice-pass.
#[derive(Parser)]
#[command(name = "poolctl-mock-server")]
struct Cli {
    #[arg(long, env = "POOLCTL_MOCK_BIND", default_value = "127.0.0.1")]
    bind: String,

    #[arg(long, env = "POOLCTL_MOCK_PORT", default_value_t = 8000)]
    port: u16,

    /// Pre-populate keys, proxies and request logs
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut backend = MockBackend::seeded();
    if cli.demo {
        seed_demo(&mut backend)?;
    }

    let addr = SocketAddr::new(cli.bind.parse()?, cli.port);
    let listener = TcpListener::bind(addr).await?;
    info!("poolctl-mock-server listening on http://{addr}");

    poolctl_mock_server::serve(listener, new_state(backend)).await
}

fn seed_demo(backend: &mut MockBackend) -> Result<()> {
    let alice = backend
        .user_id("alice")
        .ok_or_else(|| anyhow::anyhow!("seed user alice missing"))?;
    for (i, verify) in [true, false, true].into_iter().enumerate() {
        backend
            .add_key(alice, &format!("pst-demo-{i}"), verify)
            .map_err(|r| anyhow::anyhow!(r.detail))?;
    }
    backend
        .set_config(
            "upstream_proxies",
            "http://10.0.0.1:3128,http://10.0.0.2:3128,socks5://10.0.0.3:1080",
        )
        .map_err(|r| anyhow::anyhow!(r.detail))?;
    backend.cool_down_proxy("http://10.0.0.2:3128", 45, "429 Too Many Requests");

    let entries = (0..120)
        .map(|i| {
            let code = match i % 10 {
                0 => 429,
                7 => 502,
                _ => 200,
            };
            LogEntry {
                created_at: Some(format!("2024-05-{:02}T{:02}:15:00", 1 + i / 24, i % 24)),
                action: Some("generate-image".into()),
                status: Some(if code == 200 { "success" } else { "failed" }.into()),
                status_code: Some(code),
                latency_ms: Some(800.0 + (i as f64) * 3.7),
                ip_address: Some(format!("192.0.2.{}", i % 250)),
                reject_reason: (code == 429).then(|| "rate limited".to_string()),
                ..Default::default()
            }
        })
        .rev()
        .collect();
    backend.seed_logs("alice", entries);
    Ok(())
}
