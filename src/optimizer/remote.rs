// src/optimizer/remote.rs - Newline-delimited JSON client
//
// One request line, one response line, one connection per call. The
// optimizer backend is a long-running planner; connection setup cost is
// negligible next to the solve time.
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::SimulationMode;
use crate::fleet::ingest::{BoardDto, RouteFetchDto};
use crate::optimizer::{
    BoardRequest, BreakdownRequest, OptimizerClient, OptimizerError, RouteRequest,
};

#[derive(Debug, Clone)]
pub struct RemoteOptimizer {
    addr: String,
}

#[derive(Serialize)]
struct RpcRequest<'a, T: Serialize> {
    op: &'a str,
    params: T,
}

#[derive(serde::Deserialize)]
struct RpcResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

impl RemoteOptimizer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn call<T, R>(&self, op: &str, params: T) -> Result<R, OptimizerError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let stream = TcpStream::connect(&self.addr).await?;
        let (reader, mut writer) = stream.into_split();
        let mut line = serde_json::to_string(&RpcRequest { op, params })?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response_line = String::new();
        let bytes = reader.read_line(&mut response_line).await?;
        if bytes == 0 {
            return Err(OptimizerError::Protocol(format!(
                "connection closed before a response to '{}'",
                op
            )));
        }
        let response: RpcResponse = serde_json::from_str(response_line.trim_end())?;
        if !response.ok {
            return Err(OptimizerError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "no error detail".to_string()),
            ));
        }
        Ok(serde_json::from_value(response.data)?)
    }
}

#[derive(Serialize)]
struct InitializeParams<'a> {
    mode: &'a str,
}

#[derive(Serialize)]
struct Empty {}

#[async_trait]
impl OptimizerClient for RemoteOptimizer {
    async fn initialize(&self, mode: SimulationMode) -> Result<(), OptimizerError> {
        tracing::info!("Initializing {} simulation at {}", mode.as_str(), self.addr);
        let _: serde_json::Value = self
            .call(
                "initialize",
                InitializeParams {
                    mode: mode.as_str(),
                },
            )
            .await?;
        Ok(())
    }

    async fn fetch_routes(&self, request: &RouteRequest) -> Result<RouteFetchDto, OptimizerError> {
        self.call("fetch_routes", request).await
    }

    async fn fetch_board(&self, request: &BoardRequest) -> Result<BoardDto, OptimizerError> {
        self.call("fetch_board", request).await
    }

    async fn register_breakdown(&self, request: &BreakdownRequest) -> Result<(), OptimizerError> {
        let _: serde_json::Value = self.call("register_breakdown", request).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), OptimizerError> {
        let _: serde_json::Value = self.call("reset", Empty {}).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            // Read the request line, then answer.
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_ok_response_decoded() {
        let addr =
            one_shot_server("{\"ok\":true,\"data\":{\"vehicles\":[],\"orders\":[]}}\n").await;
        let client = RemoteOptimizer::new(addr);
        let request = RouteRequest {
            year: 2025,
            month: 1,
            elapsed_minutes: 30,
            minutes_per_tick: 15,
            end_date: None,
        };
        let fetch = client.fetch_routes(&request).await.unwrap();
        assert!(fetch.vehicles.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_error_detail() {
        let addr = one_shot_server("{\"ok\":false,\"error\":\"no plan yet\"}\n").await;
        let client = RemoteOptimizer::new(addr);
        let err = client.reset().await.unwrap_err();
        assert!(matches!(err, OptimizerError::Rejected(ref msg) if msg == "no plan yet"));
    }

    #[tokio::test]
    async fn test_closed_connection_is_protocol_error() {
        let addr = one_shot_server("").await;
        let client = RemoteOptimizer::new(addr);
        let err = client.reset().await.unwrap_err();
        assert!(matches!(err, OptimizerError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_io_error() {
        let client = RemoteOptimizer::new("127.0.0.1:1");
        let err = client.reset().await.unwrap_err();
        assert!(matches!(err, OptimizerError::Io(_)));
    }
}
