use std::time::Duration;

use replikr_testserver::TestServer;

/// Serves one mock replica per port given on the command line, e.g.
/// `replikr-testserver 2302 2308 2309`. `--delay-ms N` adds an artificial
/// per-request delay to every replica.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut ports: Vec<u16> = Vec::new();
    let mut delay: Option<Duration> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--delay-ms" {
            let ms: u64 = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("--delay-ms requires a value"))?
                .parse()?;
            delay = Some(Duration::from_millis(ms));
        } else {
            ports.push(arg.parse()?);
        }
    }

    if ports.is_empty() {
        anyhow::bail!("usage: replikr-testserver [--delay-ms N] PORT [PORT ...]");
    }

    let mut servers = Vec::with_capacity(ports.len());
    for port in ports {
        let server = TestServer::start_on(port, delay).await?;
        println!("replica listening on {}", server.base_url());
        servers.push(server);
    }

    tokio::signal::ctrl_c().await?;
    for server in servers {
        server.shutdown().await;
    }

    Ok(())
}
