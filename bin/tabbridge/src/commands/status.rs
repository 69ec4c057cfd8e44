use serde_json::Value;

/// Query a running bridge's `/health` endpoint and print the result.
pub async fn run(host: String, port: u16) -> anyhow::Result<()> {
    let url = format!("http://{host}:{port}/health");
    let response = match reqwest::get(&url).await {
        Ok(response) => response,
        Err(err) => {
            println!("bridge not reachable at {url}: {err}");
            return Ok(());
        }
    };

    let body: Value = response.json().await?;
    println!("status:      {}", body["status"].as_str().unwrap_or("unknown"));
    println!("connections: {}", body["connections"]);
    println!("port:        {}", body["port"]);
    println!("timestamp:   {}", body["timestamp"].as_str().unwrap_or("-"));
    Ok(())
}
