// src/server/process.rs

use std::future::pending;
use std::io;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Host to connect to when probing a server bound to `host`.
fn probe_host(host: &str) -> &str {
    match host {
        "" | "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    }
}

/// Fail if something else is already listening on `host:port`.
pub(crate) async fn ensure_port_free(host: &str, port: u16) -> io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    drop(listener);
    Ok(())
}

/// Poll until `host:port` can be bound again, or `timeout` passes.
pub(crate) async fn wait_port_released(host: &str, port: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if ensure_port_free(host, port).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Resolve once `host:port` accepts a TCP connection.
pub(crate) async fn wait_port_accepting(host: &str, port: u16) {
    let host = probe_host(host);
    loop {
        if TcpStream::connect((host, port)).await.is_ok() {
            debug!(port, "dev server accepts connections");
            return;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Resolve once the readiness signal fires. A closed stream never becomes
/// ready, so this stays pending and the caller's timeout decides.
pub(crate) async fn wait_ready_signal(rx: oneshot::Receiver<()>) {
    if rx.await.is_err() {
        pending::<()>().await;
    }
}

/// Forward a child output stream to the log line by line. The first line
/// matching `ready` fires `ready_tx`.
pub(crate) fn forward_output<R>(
    stream: R,
    label: &'static str,
    ready: Option<Regex>,
    mut ready_tx: Option<oneshot::Sender<()>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "devloop::server", "[{label}] {line}");
            if let (Some(re), true) = (&ready, ready_tx.is_some()) {
                if re.is_match(&line) {
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
        }
    });
}

/// Ask a process to terminate (SIGTERM on unix).
pub(crate) async fn send_terminate(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    let status = tokio::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .await?;

    #[cfg(not(unix))]
    let status = tokio::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("failed to terminate pid {pid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn occupied_port_is_detected() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(ensure_port_free("127.0.0.1", port).await.is_err());

        drop(listener);
        assert!(wait_port_released("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn accepting_port_resolves() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::time::timeout(Duration::from_secs(2), wait_port_accepting("0.0.0.0", port))
            .await
            .expect("probe should connect");
    }

    #[tokio::test]
    async fn ready_regex_fires_once() {
        let (tx, rx) = oneshot::channel();
        let input: &'static [u8] = b"booting\nserver listening on 3000\nlistening again\n";
        forward_output(input, "stdout", Some(Regex::new("listening").unwrap()), Some(tx));
        tokio::time::timeout(Duration::from_secs(2), wait_ready_signal(rx))
            .await
            .expect("ready signal");
    }
}
