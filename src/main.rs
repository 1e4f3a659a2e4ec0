//! ovgen - oscilloscope video generator.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ovgen::app::run().await
}
