use std::error::Error;
use std::sync::Arc;

use lightstream_client::facade::{StreamCredentials, StreamingFacade};
use lightstream_client::stream::client::StreamClientOptions;
use lightstream_client::stream::proto::SubscriptionMode;
use lightstream_client::stream::subscription::Subscription;
use tracing_subscriber::EnvFilter;

const FIELDS: [&str; 4] = ["UPDATE_TIME", "BID", "OFFER", "MARKET_STATE"];

fn env_var(key: &str) -> Result<String, Box<dyn Error>> {
    std::env::var(key).map_err(|_| format!("missing environment variable {key}").into())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credentials = StreamCredentials::from_session_tokens(
        env_var("LS_ENDPOINT")?,
        env_var("LS_ACCOUNT")?,
        &env_var("LS_CST")?,
        &env_var("LS_XST")?,
    );
    let epics = env_var("LS_EPICS")?;
    let items: Vec<String> = epics
        .split_whitespace()
        .map(|epic| format!("MARKET:{epic}"))
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let facade = StreamingFacade::connect(credentials, StreamClientOptions::default()).await?;

        let subscription = Arc::new(Subscription::new(SubscriptionMode::Merge, items, FIELDS));
        let (table_id, accepted) = facade
            .subscribe(subscription, |event| match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => eprintln!("failed to encode update: {err}"),
            })
            .await?;
        if !accepted {
            return Err(format!("server rejected table {table_id}").into());
        }

        tokio::signal::ctrl_c().await?;
        facade.unsubscribe(table_id).await;
        facade.destroy().await?;
        Ok::<(), Box<dyn Error>>(())
    })
}
