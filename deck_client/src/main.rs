#[tokio::main]
async fn main() {
    deck_client::frameworks::runtime::run().await;
}
