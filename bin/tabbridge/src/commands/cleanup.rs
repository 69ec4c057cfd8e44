use serde_json::Value;

/// Force a stale-session sweep on a running bridge.
pub async fn run(host: String, port: u16) -> anyhow::Result<()> {
    let url = format!("http://{host}:{port}/cleanup-connections");
    let client = reqwest::Client::new();
    let body: Value = client.post(&url).send().await?.json().await?;
    println!("evicted:            {}", body["evicted"]);
    println!("active connections: {}", body["activeConnections"]);
    Ok(())
}
