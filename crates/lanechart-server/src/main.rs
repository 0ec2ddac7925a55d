mod config;
mod error;
mod hosting;
mod pipeline;
mod routes;
mod search;
mod storage;

use std::sync::Arc;

use log::info;

use config::Config;
use hosting::LucidClient;
use lanechart_generate::Generator;
use pipeline::Pipeline;
use search::SearchClient;
use storage::{FileShareClient, StorageAccount};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().inspect_err(|e| log::error!("{e}"))?;
    let account = StorageAccount::parse(&config.storage_connection_string)?;

    // clients are built once and shared by every request
    let http = reqwest::Client::new();
    let pipeline = Pipeline::new(
        Box::new(Generator::new(&config.openai)?),
        Box::new(SearchClient::new(http.clone(), &config.search)),
        Box::new(FileShareClient::new(http.clone(), account, config.share_name.clone())),
        Box::new(LucidClient::new(http, config.lucid.clone())),
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(address = config.bind.to_string(); "listening");
    axum::serve(listener, routes::router(Arc::new(pipeline))).await?;
    Ok(())
}
