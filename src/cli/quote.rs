//! `finguard quote`

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    cancel: &CancellationToken,
    symbol: &str,
    count: u32,
) -> anyhow::Result<()> {
    let client = super::build_client(config)?;
    let mut failures = 0u32;

    for i in 0..count {
        info!(symbol = %symbol, request = i + 1, "Fetching price");
        match client.call(cancel, symbol).await {
            Ok(price) => println!("📈 {}", price),
            Err(e) => {
                failures += 1;
                super::report_error(&e);
                if e.is_cancelled() {
                    break;
                }
            }
        }
    }

    let counts = client.breaker().counts();
    info!(
        breaker = %client.breaker().name(),
        state = %client.breaker().state(),
        requests = counts.requests,
        failures = counts.total_failures,
        "Quote run finished"
    );

    if failures > 0 && failures == count {
        anyhow::bail!("all {} quote requests failed", count);
    }
    Ok(())
}
