use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use conn_balancer::{
    config::AppConfig,
    conn::PoolConn,
    discovery::{Discovery, StaticDiscoverer},
    metrics,
    session::Session,
    Balancer, Conn, Context, Result,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = parse_args()?;
    let config = read_config(&args.config_path)?;

    let conns: Vec<Arc<dyn Conn>> = config
        .endpoints
        .iter()
        .map(|endpoint| Arc::new(PoolConn::from_config(endpoint)) as Arc<dyn Conn>)
        .collect();

    let balancer = Arc::new(Balancer::new(config.balancer.clone(), conns));
    info!(
        "{:?} balancer over {} endpoints",
        balancer.policy_type(),
        config.endpoints.len()
    );

    let (ctx, cancel) = Context::background().with_cancel();

    let discovery = Discovery::new(
        config.discovery.clone(),
        balancer.clone(),
        StaticDiscoverer::new(config.endpoints.clone()),
    );
    let discovery = tokio::spawn({
        let ctx = ctx.clone();
        async move { discovery.run(&ctx).await }
    });

    let session = Session::new(config.session.clone(), balancer.clone());
    let report = session.run(&ctx).await;

    let mut served = report.served.iter().collect::<Vec<_>>();
    served.sort();
    for (address, count) in served {
        info!("{address}: {count} operations");
    }
    info!("{} operations without a connection", report.unavailable);

    cancel.cancel();
    discovery.await?;

    let metrics = metrics::gather()?;
    print!("{}", String::from_utf8_lossy(&metrics));

    Ok(())
}

fn init_logging() {
    // If you want to see only balancer logs you can set env variable like this:
    // RUST_LOG=conn_balancer=debug
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}

struct Args {
    config_path: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut config_path = None;

    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == "-c" {
            let value = args.next().ok_or("config file expected")?;
            config_path = Some(PathBuf::from(value));
        }
    }

    let config_path = config_path.ok_or("provide config file with '-c' option")?;

    Ok(Args { config_path })
}

fn read_config(config_path: &Path) -> Result<AppConfig> {
    let config = fs::read_to_string(config_path)?;

    AppConfig::from_toml(&config)
}
