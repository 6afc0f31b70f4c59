//! The public surface of this crate (§6): `connect`, the four `fetch_*`
//! methods, and `close`.

use tokio::net::TcpStream;

use crate::codec::value::Value;
use crate::config::{self, ConnectOptions};
use crate::connection::Connection;
use crate::error::{Error, ProtocolError, Result};

/// A single connection to the server, wrapping the handshake-completed
/// state machine and exposing request methods on top of it.
pub struct Client {
    connection: Connection<TcpStream>,
}

/// Resolves connection options (§4.4), opens a TCP stream, and completes the
/// handshake (§4.3.2).
pub async fn connect(options: ConnectOptions) -> Result<Client> {
    let resolved = config::resolve(&options)?;
    let addr = (resolved.host.as_str(), resolved.port);
    let stream = TcpStream::connect(addr).await.map_err(Error::from)?;
    stream.set_nodelay(true).map_err(Error::from)?;

    let mut connection = Connection::new(stream);
    let user = resolved.user.clone();
    let database = resolved.database.clone();
    connection.handshake(&user, &database).await?;

    Ok(Client { connection })
}

impl Client {
    /// Runs `query` and returns every row, in arrival order.
    pub async fn fetch_all(&mut self, query: &str) -> Result<Vec<Value>> {
        let result = self.connection.query(query, false, false, &Value::Tuple(Vec::new())).await?;
        Ok(result.rows)
    }

    /// Runs `query`, expecting exactly one row; fails on zero or more than one.
    pub async fn fetch_one(&mut self, query: &str) -> Result<Value> {
        let result = self.connection.query(query, false, true, &Value::Tuple(Vec::new())).await?;
        one_row(result.rows)
    }

    /// Runs `query` in JSON mode. The server always returns a single row
    /// whose value is the JSON-serialized array of results (§4.3.3).
    pub async fn fetch_all_json(&mut self, query: &str) -> Result<String> {
        let result = self.connection.query(query, true, false, &Value::Tuple(Vec::new())).await?;
        unwrap_json(one_row(result.rows)?)
    }

    /// Runs `query` in JSON mode, expecting exactly one row, and returns its
    /// JSON string.
    pub async fn fetch_one_json(&mut self, query: &str) -> Result<String> {
        let result = self.connection.query(query, true, true, &Value::Tuple(Vec::new())).await?;
        unwrap_json(one_row(result.rows)?)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.connection.close().await
    }
}

fn one_row(mut rows: Vec<Value>) -> Result<Value> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(Error::Protocol(ProtocolError::MalformedDescriptor(
            "fetch_one expected exactly one row, got zero".into(),
        ))),
        n => Err(Error::Protocol(ProtocolError::MalformedDescriptor(format!(
            "fetch_one expected exactly one row, got {n}"
        )))),
    }
}

fn unwrap_json(value: Value) -> Result<String> {
    match value {
        Value::Json(s) => Ok(s),
        other => Err(Error::Protocol(ProtocolError::MalformedDescriptor(format!(
            "expected a JSON-encoded value, got {other:?}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_rejects_empty_and_multiple() {
        assert!(one_row(Vec::new()).is_err());
        assert!(one_row(vec![Value::Int32(1), Value::Int32(2)]).is_err());
        assert_eq!(one_row(vec![Value::Int32(7)]).unwrap(), Value::Int32(7));
    }

    #[test]
    fn unwrap_json_rejects_non_json_values() {
        assert!(unwrap_json(Value::Int32(1)).is_err());
        assert_eq!(unwrap_json(Value::Json("{}".into())).unwrap(), "{}");
    }
}
