#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dribdat::start_server().await
}
