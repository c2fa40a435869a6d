//! Client commands against a running controller's control API.

use anyhow::{bail, Context, Result};
use spoofbar_config::ServerConfig;
use spoofbar_core::CommandResponse;

/// Address a client should dial for `server`; wildcard binds are reached via loopback.
pub fn client_base_url(server: &ServerConfig) -> String {
    let host = match server.bind.as_str() {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{}:{}", host, server.port)
}

/// Print the proxy status reported by the controller.
pub async fn status(server: &ServerConfig) -> Result<()> {
    let base = client_base_url(server);
    let client = reqwest::Client::new();
    match client.get(format!("{}/api/status", base)).send().await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await.context("Invalid status response")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("SpoofBar is not running at {}", base);
        }
    }
    Ok(())
}

/// POST a `start` or `stop` command and print the controller's message.
///
/// A refused command is reported as an error so the exit code reflects it.
pub async fn send_command(server: &ServerConfig, action: &str) -> Result<()> {
    let base = client_base_url(server);
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/{}", base, action))
        .send()
        .await
        .with_context(|| format!("SpoofBar is not running at {}", base))?;
    let body: CommandResponse = resp.json().await.context("Invalid command response")?;

    if !body.success {
        bail!(body.message);
    }
    println!("{}", body.message);
    Ok(())
}
