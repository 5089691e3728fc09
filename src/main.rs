#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examprep_rust::run().await {
        eprintln!("examprep-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
