use std::error::Error;
use std::sync::Arc;

use lightstream_client::facade::{StreamCredentials, StreamingFacade};
use lightstream_client::stream::client::StreamClientOptions;
use lightstream_client::stream::proto::SubscriptionMode;
use lightstream_client::stream::subscription::Subscription;
use tracing_subscriber::EnvFilter;

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
    let account = credentials.account_id.clone();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let facade = StreamingFacade::connect(credentials, StreamClientOptions::default()).await?;

        let balance = Arc::new(Subscription::new(
            SubscriptionMode::Merge,
            [format!("ACCOUNT:{account}")],
            ["PNL", "DEPOSIT", "AVAILABLE_CASH", "FUNDS"],
        ));
        match facade.fetch_one(balance).await? {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => println!("no update received"),
        }

        facade.destroy().await?;
        Ok::<(), Box<dyn Error>>(())
    })
}
