//! The PostgreSQL v3 wire session (C7): a TCP accept loop over the
//! storage/executor stack built by the other crates in this workspace.

pub mod error;
mod session;

pub use session::handle_connection;

use buffer::BufferPool;
use common::Config;
use executor::Executor;
use heap::HeapStorage;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// A bound server: the buffer pool and executor are live and the listener
/// is bound, but no connections are accepted until [`Server::run`].
pub struct Server {
    listener: TcpListener,
    executor: Arc<Executor>,
    pool: Arc<BufferPool>,
    query_timeout: Duration,
    connection_timeout: Duration,
}

impl Server {
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.pages_dir())?;
        let pool = Arc::new(BufferPool::new(config.pages_dir(), config.buffer_size));
        let executor = Arc::new(Executor::new(HeapStorage::new(pool.clone())));
        let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
        Ok(Self {
            listener,
            executor,
            pool,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            connection_timeout: Duration::from_millis(config.connection_timeout_ms),
        })
    }

    /// The address actually bound — useful when `config.port == 0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per connection, until a
    /// shutdown signal arrives — then flush the buffer pool (spec §9)
    /// before returning.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    tracing::info!(%addr, "connection accepted");
                    let executor = self.executor.clone();
                    let query_timeout = self.query_timeout;
                    let connection_timeout = self.connection_timeout;
                    tokio::spawn(async move {
                        session::handle_connection(stream, executor, query_timeout, connection_timeout)
                            .await;
                        tracing::info!(%addr, "connection closed");
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received, flushing buffer pool");
                    match self.pool.flush_all() {
                        Ok(flushed) => tracing::info!(flushed, "buffer pool flushed"),
                        Err(err) => tracing::warn!(error = %err, "flush on shutdown failed"),
                    }
                    return Ok(());
                }
            }
        }
    }
}
