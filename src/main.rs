#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voicereport::run().await
}
