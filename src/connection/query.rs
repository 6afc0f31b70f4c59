//! The Parse / Describe / Execute / Sync cycle (§4.3.3).

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::buffer::{FlatReadBuffer, WriteMessageBuffer};
use crate::codec::value::Value;
use crate::connection::Connection;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::constants::server_tag;
use crate::protocol::{self, Cardinality, FallthroughOutcome, PrepareComplete};

/// Outcome of one query cycle: the decoded rows plus bookkeeping a caller
/// might want (e.g. `fetch_one`'s arity check).
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub cardinality: Cardinality,
}

pub async fn run<T>(
    conn: &mut Connection<T>,
    text: &str,
    json_mode: bool,
    expect_one: bool,
    args: &Value,
) -> Result<QueryResult>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let prepared = parse(conn, text, json_mode, expect_one).await?;

    if !conn.registry.contains(prepared.input_type_id) || !conn.registry.contains(prepared.output_type_id) {
        describe(conn).await?;
    }

    execute(conn, &prepared, args).await
}

/// Sends `Parse` + `Sync`, drains until `ReadyForCommand`, capturing the
/// `PrepareComplete` frame along the way.
async fn parse<T>(
    conn: &mut Connection<T>,
    text: &str,
    json_mode: bool,
    expect_one: bool,
) -> Result<PrepareComplete>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut write_buf = WriteMessageBuffer::new();
    protocol::encode_parse(&mut write_buf, text, json_mode, expect_one)?;
    write_buf.write_sync()?;
    conn.send(&mut write_buf).await?;

    let mut prepared = None;
    loop {
        conn.wait_for_message().await?;
        let tag = conn.read_buf.get_message_type().expect("frame is ready");

        if tag == server_tag::READY_FOR_COMMAND {
            let ready = protocol::decode_ready_for_command(&mut conn.read_buf)?;
            conn.transaction_status = ready.transaction_status;
            break;
        } else if tag == server_tag::PREPARE_COMPLETE {
            prepared = Some(protocol::decode_prepare_complete(&mut conn.read_buf)?);
        } else if tag == server_tag::ERROR_RESPONSE {
            return Err(drain_to_ready_then_raise(conn).await);
        } else {
            absorb_fallthrough(conn, tag)?;
        }
    }

    prepared.ok_or(Error::Protocol(ProtocolError::UnexpectedFrame {
        expected: "PrepareComplete",
        actual: 0,
    }))
}

/// Sends `DescribeStatement` + `Sync`, drains until `ReadyForCommand`,
/// registering the codecs built from the `CommandDataDescription` frame.
async fn describe<T>(conn: &mut Connection<T>) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut write_buf = WriteMessageBuffer::new();
    protocol::encode_describe_statement(&mut write_buf)?;
    write_buf.write_sync()?;
    conn.send(&mut write_buf).await?;

    let mut description = None;
    loop {
        conn.wait_for_message().await?;
        let tag = conn.read_buf.get_message_type().expect("frame is ready");

        if tag == server_tag::READY_FOR_COMMAND {
            let ready = protocol::decode_ready_for_command(&mut conn.read_buf)?;
            conn.transaction_status = ready.transaction_status;
            break;
        } else if tag == server_tag::COMMAND_DATA_DESCRIPTION {
            description = Some(protocol::decode_command_data_description(&mut conn.read_buf)?);
        } else if tag == server_tag::ERROR_RESPONSE {
            return Err(drain_to_ready_then_raise(conn).await);
        } else {
            absorb_fallthrough(conn, tag)?;
        }
    }

    let description = description.ok_or(ProtocolError::UnexpectedFrame {
        expected: "CommandDataDescription",
        actual: 0,
    })?;
    conn.registry.build_from_descriptors(&description.input_descriptor)?;
    conn.registry.build_from_descriptors(&description.output_descriptor)?;
    Ok(())
}

/// Sends `Execute` (with the encoded argument tuple) + `Sync`, drains until
/// `ReadyForCommand`, decoding every `Data` frame with the output codec.
async fn execute<T>(
    conn: &mut Connection<T>,
    prepared: &PrepareComplete,
    args: &Value,
) -> Result<QueryResult>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let input_codec = conn.registry.get(prepared.input_type_id)?;
    let mut arg_buf = crate::buffer::WriteBuffer::new();
    input_codec.encode(&conn.registry, &mut arg_buf, args)?;

    let mut write_buf = WriteMessageBuffer::new();
    protocol::begin_execute(&mut write_buf)?;
    write_buf.write_bytes(arg_buf.as_slice())?;
    write_buf.end_message()?;
    write_buf.write_sync()?;
    conn.send(&mut write_buf).await?;

    let mut rows = Vec::new();
    loop {
        conn.wait_for_message().await?;
        let tag = conn.read_buf.get_message_type().expect("frame is ready");

        if tag == server_tag::READY_FOR_COMMAND {
            let ready = protocol::decode_ready_for_command(&mut conn.read_buf)?;
            conn.transaction_status = ready.transaction_status;
            break;
        } else if tag == server_tag::DATA {
            let row_bytes = protocol::decode_data_row_bytes(&mut conn.read_buf)?;
            let mut reader = FlatReadBuffer::new(row_bytes);
            let value = crate::codec::decode_value(prepared.output_type_id, &conn.registry, &mut reader)?;
            rows.push(value);
        } else if tag == server_tag::COMMAND_COMPLETE {
            let complete = protocol::decode_command_complete(&mut conn.read_buf)?;
            conn.last_status = Some(complete.status);
        } else if tag == server_tag::ERROR_RESPONSE {
            return Err(drain_to_ready_then_raise(conn).await);
        } else {
            absorb_fallthrough(conn, tag)?;
        }
    }

    Ok(QueryResult {
        rows,
        cardinality: prepared.cardinality,
    })
}

fn absorb_fallthrough<T>(conn: &mut Connection<T>, tag: u8) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    match protocol::handle_fallthrough(tag, &mut conn.read_buf)? {
        FallthroughOutcome::ParameterStatus(status) => {
            conn.server_settings.insert(status.name, status.value);
        }
        FallthroughOutcome::LogMessage(log) => {
            warn!(severity = log.severity, code = log.code, message = %log.message, "server log message during query");
        }
    }
    Ok(())
}

/// Captures the error payload, keeps draining frames until `ReadyForCommand`
/// per §4.3.3, then returns the error to the caller.
async fn drain_to_ready_then_raise<T>(conn: &mut Connection<T>) -> Error
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let err = match protocol::decode_error_response(&mut conn.read_buf) {
        Ok(err) => err,
        Err(buffer_err) => return buffer_err.into(),
    };
    loop {
        if conn.wait_for_message().await.is_err() {
            return err.into();
        }
        let tag = match conn.read_buf.get_message_type() {
            Some(tag) => tag,
            None => return err.into(),
        };
        if tag == server_tag::READY_FOR_COMMAND {
            if let Ok(ready) = protocol::decode_ready_for_command(&mut conn.read_buf) {
                conn.transaction_status = ready.transaction_status;
            }
            return err.into();
        }
        conn.read_buf.discard_message();
    }
}
