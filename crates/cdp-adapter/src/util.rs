use anyhow::{anyhow, Context, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use serde::Deserialize;
use tokio::time::{timeout, Duration};
use url::Url;

/// Read the DevTools websocket URL that a freshly launched Chromium prints on stderr.
pub async fn extract_ws_url(child: &mut Child) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::new();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws) = ws_url_from_stderr_line(&line) {
                return Ok(ws);
            }
            if preview.len() < 8 {
                preview.push(line);
            }
        }
        Err(anyhow!(
            "chromium exited before printing its devtools url; stderr: {}",
            preview.join(" | ")
        ))
    };

    timeout(Duration::from_secs(20), reader)
        .await
        .map_err(|_| anyhow!("timed out waiting for chromium devtools websocket url"))?
}

fn ws_url_from_stderr_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// `host:port` (or a full http URL) to the `/json/version` endpoint.
pub fn version_endpoint(addr: &str) -> Result<Url> {
    let addr = addr.trim();
    let base = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    };
    let base = Url::parse(&base).with_context(|| format!("invalid debugging address '{addr}'"))?;
    base.join("/json/version")
        .context("failed to build /json/version url")
}

/// Ask a running Chrome for its browser websocket URL.
pub async fn discover_ws_url(addr: &str, deadline: Duration) -> Result<String> {
    let endpoint = version_endpoint(addr)?;
    let client = reqwest::Client::builder()
        .timeout(deadline)
        .build()
        .context("failed to build http client")?;
    let info: VersionInfo = client
        .get(endpoint.clone())
        .send()
        .await
        .with_context(|| format!("GET {endpoint}"))?
        .error_for_status()?
        .json()
        .await
        .context("unexpected /json/version payload")?;
    Ok(info.web_socket_debugger_url)
}
