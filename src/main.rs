use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    recorder_studio::cli::app::run().await
}
