#[tokio::main]
async fn main() -> std::io::Result<()> {
    scan_station::run_with_config().await
}
