//! Test utilities for commonsense-client
//!
//! Runs an axum router standing in for the CommonSense service on an
//! ephemeral local port.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::{Result, SenseClient};

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on 127.0.0.1 with a random port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::post, Router};
    /// use commonsense_client::testing::TestServer;
    ///
    /// let router = Router::new().route("/login.json", post(login));
    /// let server = TestServer::start(router).await?;
    /// let mut client = server.client()?;
    /// client.login("user", "secret").await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Config builder pointed at this server, with the 500 dump disabled
    /// and short timeouts
    pub fn config_builder(&self) -> ClientConfigBuilder {
        ClientConfig::builder(self.base_url())
            .no_diagnostics_file()
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
    }

    /// A logged-out client for this server
    pub fn client(&self) -> Result<SenseClient> {
        SenseClient::with_config(self.config_builder().build())
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
