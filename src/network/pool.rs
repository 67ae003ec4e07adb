//! Filer Connection Pool
//!
//! Keeps idle TCP connections per filer address and runs one
//! request/response exchange per checkout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::{read_frame, write_frame, FilerRequest, FilerResponse};
use crate::error::{Error, Result};

/// Idle connections kept per address
const MAX_IDLE_PER_ADDRESS: usize = 8;

struct PooledConnection {
    stream: TcpStream,
    last_used: Instant,
}

/// Shared pool of filer connections, keyed by address
///
/// Connections are opened lazily on first use. One instance is meant to be
/// wrapped in an `Arc` and handed to every client that needs it.
pub struct FilerConnectionPool {
    idle: Mutex<HashMap<String, Vec<PooledConnection>>>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl FilerConnectionPool {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            connect_timeout,
            request_timeout,
        }
    }

    /// Send a request to a filer and wait for its response
    pub async fn send(&self, address: &str, request: &FilerRequest) -> Result<FilerResponse> {
        debug!("Sending {} to {}", request.type_name(), address);

        match timeout(self.request_timeout, self.send_inner(address, request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    async fn send_inner(&self, address: &str, request: &FilerRequest) -> Result<FilerResponse> {
        if let Some(mut conn) = self.checkout(address).await {
            // A write failure means the peer closed the idle connection and
            // nothing was sent, so a fresh connection is safe to try.
            if write_frame(&mut conn.stream, request).await.is_ok() {
                let response = read_frame(&mut conn.stream).await?;
                self.checkin(address, conn).await;
                return Ok(response);
            }
            debug!("Dropping dead pooled connection to {}", address);
        }

        let mut stream = self.connect(address).await?;
        write_frame(&mut stream, request).await?;
        let response = read_frame(&mut stream).await?;
        self.checkin(
            address,
            PooledConnection {
                stream,
                last_used: Instant::now(),
            },
        )
        .await;

        Ok(response)
    }

    async fn connect(&self, address: &str) -> Result<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    async fn checkout(&self, address: &str) -> Option<PooledConnection> {
        let mut idle = self.idle.lock().await;
        idle.get_mut(address).and_then(|conns| conns.pop())
    }

    async fn checkin(&self, address: &str, mut conn: PooledConnection) {
        conn.last_used = Instant::now();
        let mut idle = self.idle.lock().await;
        let conns = idle.entry(address.to_string()).or_default();
        if conns.len() < MAX_IDLE_PER_ADDRESS {
            conns.push(conn);
        }
    }

    /// Drop idle connections unused for longer than `max_idle`
    pub async fn cleanup_stale(&self, max_idle: Duration) {
        let mut idle = self.idle.lock().await;
        let now = Instant::now();

        for (addr, conns) in idle.iter_mut() {
            let before = conns.len();
            conns.retain(|c| now.duration_since(c.last_used) <= max_idle);
            if conns.len() < before {
                debug!("Removed {} stale connections to {}", before - conns.len(), addr);
            }
        }
        idle.retain(|_, conns| !conns.is_empty());
    }

    /// Close all idle connections
    pub async fn close_all(&self) {
        self.idle.lock().await.clear();
    }

    /// Number of idle connections across all addresses
    pub async fn connection_count(&self) -> usize {
        self.idle.lock().await.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filer::GetFilerConfigurationResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Answers every request with a configuration reply; counts accepted sockets
    async fn spawn_filer() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    while let Ok(_request) = read_frame::<FilerRequest, _>(&mut stream).await {
                        let response =
                            FilerResponse::GetFilerConfiguration(GetFilerConfigurationResponse {
                                replication: "001".into(),
                                ..Default::default()
                            });
                        if write_frame(&mut stream, &response).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (address, accepted)
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let (address, accepted) = spawn_filer().await;
        let pool = FilerConnectionPool::new(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(pool.connection_count().await, 0);

        for _ in 0..3 {
            let response = pool
                .send(&address, &FilerRequest::GetFilerConfiguration)
                .await
                .unwrap();
            assert_eq!(response.type_name(), "GetFilerConfiguration");
        }

        assert_eq!(pool.connection_count().await, 1);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);

        pool.cleanup_stale(Duration::from_secs(60)).await;
        assert_eq!(pool.connection_count().await, 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
        pool.cleanup_stale(Duration::ZERO).await;
        assert_eq!(pool.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let pool = FilerConnectionPool::new(Duration::from_millis(500), Duration::from_secs(1));
        let result = pool.send(&address, &FilerRequest::GetFilerConfiguration).await;
        assert!(matches!(
            result,
            Err(Error::ConnectionFailed { .. }) | Err(Error::ConnectionTimeout(_))
        ));
        assert_eq!(pool.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_all() {
        let (address, _) = spawn_filer().await;
        let pool = FilerConnectionPool::new(Duration::from_secs(1), Duration::from_secs(5));
        pool.send(&address, &FilerRequest::GetFilerConfiguration)
            .await
            .unwrap();
        assert_eq!(pool.connection_count().await, 1);

        pool.close_all().await;
        assert_eq!(pool.connection_count().await, 0);
    }
}
