use crowdcast_engine::api::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run_server().await
}
