//! Live connections, keyed by id.
//!
//! The registry is the long-lived owner that lets other components reach a
//! connection (for example to respond on it). Entries are removed by the
//! error callback once the connection has closed itself.

use crate::connection::handler::Connection;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Thread-safe map of connection id to connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<u64, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection. Returns the previous entry with the same id, if any.
    pub fn insert(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.connections.write().unwrap().insert(conn.id(), conn)
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.write().unwrap().remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.read().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes and forgets every registered connection.
    ///
    /// Returns the number of connections closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = self
            .connections
            .write()
            .unwrap()
            .drain()
            .map(|(_, conn)| conn)
            .collect();

        for conn in &drained {
            conn.close();
        }

        debug!(count = drained.len(), "Closed all registered connections");
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Callbacks, ConnectionConfig, ConnectionStats};
    use crate::protocol::Header;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn accept_connection(
        listener: &TcpListener,
        callbacks: Callbacks,
    ) -> (Arc<Connection>, TcpStream) {
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let conn = Connection::new(
            stream,
            peer,
            ConnectionConfig::default(),
            callbacks,
            Arc::new(ConnectionStats::new()),
        );
        (conn, client)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());

        let (conn, _client) = accept_connection(&listener, Callbacks::new()).await;
        let id = conn.id();
        assert!(registry.insert(Arc::clone(&conn)).is_none());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).map(|c| c.id()), Some(id));

        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_all() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ConnectionRegistry::new();

        let (first, _c1) = accept_connection(&listener, Callbacks::new()).await;
        let (second, _c2) = accept_connection(&listener, Callbacks::new()).await;
        first.start();
        registry.insert(Arc::clone(&first));
        registry.insert(Arc::clone(&second));

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(first.is_closed());
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn test_error_callback_deregisters() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = Arc::new(ConnectionRegistry::new());

        let registry_for_errors = Arc::clone(&registry);
        let callbacks = Callbacks::new().on_error(move |conn, _| {
            registry_for_errors.remove(conn.id());
        });
        let (conn, mut client) = accept_connection(&listener, callbacks).await;
        registry.insert(Arc::clone(&conn));
        conn.start();

        // Oversized with the default ceiling
        client
            .write_all(&Header::new(u32::MAX, 0, 0).to_bytes())
            .await
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !registry.is_empty() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(registry.is_empty());
        assert!(conn.is_closed());
    }
}
