/// Entry point for the pod log bridge.
///
/// Watches pods (all namespaces, or the one named by `NAMESPACE`), follows the
/// logs of every running container and writes them to stdout as JSON lines.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., invalid environment
/// variables or no reachable cluster).
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info NAMESPACE=apps cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    pod_log_bridge::run().await
}
