#[tokio::main]
async fn main() -> std::io::Result<()> {
    bridge_server::run_with_config().await
}
