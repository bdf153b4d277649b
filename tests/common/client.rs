//! Test WebSocket client.
//!
//! Sends JSON frames and asserts on the pushes the hub sends back.

use chathub::proto::{ServerPush, SystemNotice};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// A test client over any upgraded stream; in-process tests use a duplex pipe.
pub struct TestClient<S = DuplexStream> {
    ws: WebSocketStream<S>,
    user: String,
}

#[allow(dead_code)]
impl<S> TestClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ws: WebSocketStream<S>, user: &str) -> Self {
        Self {
            ws,
            user: user.to_string(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a JSON frame.
    pub async fn send_json(&mut self, frame: Value) -> anyhow::Result<()> {
        self.send_raw(&frame.to_string()).await
    }

    /// Send a text chat message to a user or group.
    pub async fn say(&mut self, to: &str, content: &str) -> anyhow::Result<()> {
        let frame = serde_json::json!({
            "type": 0,
            "content": content,
            "sendId": self.user,
            "receiveId": to,
        });
        self.send_json(frame).await
    }

    pub async fn join(&mut self, group: &str) -> anyhow::Result<()> {
        self.send_json(serde_json::json!({ "action": "join_group", "groupId": group }))
            .await
    }

    pub async fn leave(&mut self, group: &str) -> anyhow::Result<()> {
        self.send_json(serde_json::json!({ "action": "leave_group", "groupId": group }))
            .await
    }

    /// Receive a single push.
    pub async fn recv(&mut self) -> anyhow::Result<ServerPush> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a push with a timeout. Control frames are skipped.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerPush> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = timeout(remaining, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match frame {
                Message::Text(text) => return Ok(ServerPush::decode(&text)?),
                Message::Close(_) => anyhow::bail!("connection closed"),
                _ => continue,
            }
        }
    }

    /// Receive pushes until the predicate returns true.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<ServerPush>>
    where
        F: FnMut(&ServerPush) -> bool,
    {
        let mut pushes = Vec::new();
        loop {
            let push = self.recv().await?;
            let done = predicate(&push);
            pushes.push(push);
            if done {
                return Ok(pushes);
            }
        }
    }

    /// Receive the next push, which must be a system notice.
    pub async fn recv_notice(&mut self) -> anyhow::Result<SystemNotice> {
        match self.recv().await? {
            ServerPush::System(notice) => Ok(notice),
            other => anyhow::bail!("expected system notice, got {other:?}"),
        }
    }

    /// Assert nothing arrives for `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) {
        if let Ok(push) = self.recv_timeout(dur).await {
            panic!("{} expected silence, got {push:?}", self.user);
        }
    }

    /// Wait for the hub to close the connection.
    pub async fn expect_closed(&mut self, dur: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match timeout(remaining, self.ws.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    /// Close the connection from the client side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
