//! The handshake sequence (§4.3.2): send ClientHandshake + AuthenticationRequest,
//! then read until `ReadyForCommand`.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::buffer::WriteMessageBuffer;
use crate::connection::Connection;
use crate::error::{ProtocolError, Result};
use crate::protocol::constants::{auth_status, server_tag, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};
use crate::protocol::{self, Authentication, FallthroughOutcome};

pub async fn run<T>(conn: &mut Connection<T>, user: &str, database: &str) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut write_buf = WriteMessageBuffer::new();
    protocol::encode_client_handshake(&mut write_buf)?;
    protocol::encode_authentication_request(&mut write_buf, user, database)?;
    conn.send(&mut write_buf).await?;

    loop {
        conn.wait_for_message().await?;
        let tag = conn
            .read_buf
            .get_message_type()
            .expect("wait_for_message guarantees a tag is known");

        match tag {
            t if t == server_tag::SERVER_HANDSHAKE => {
                let handshake = protocol::decode_server_handshake(&mut conn.read_buf)?;
                if handshake.major != PROTOCOL_VERSION_MAJOR || handshake.minor != PROTOCOL_VERSION_MINOR {
                    return Err(ProtocolError::UnsupportedVersion {
                        major: handshake.major,
                        minor: handshake.minor,
                    }
                    .into());
                }
            }
            t if t == server_tag::SERVER_KEY_DATA => {
                conn.server_key_data = Some(protocol::decode_server_key_data(&mut conn.read_buf)?);
            }
            t if t == server_tag::AUTHENTICATION => {
                match protocol::decode_authentication(&mut conn.read_buf)? {
                    Authentication::Ok => {}
                    Authentication::SaslContinue { .. } => {
                        return Err(ProtocolError::UnsupportedAuth(auth_status::SASL_CONTINUE).into());
                    }
                    Authentication::SaslFinal { .. } => {
                        return Err(ProtocolError::UnsupportedAuth(auth_status::SASL_FINAL).into());
                    }
                    Authentication::Unsupported(code) => {
                        return Err(ProtocolError::UnsupportedAuth(code).into());
                    }
                }
            }
            t if t == server_tag::ERROR_RESPONSE => {
                let err = protocol::decode_error_response(&mut conn.read_buf)?;
                return Err(err.into());
            }
            t if t == server_tag::READY_FOR_COMMAND => {
                let ready = protocol::decode_ready_for_command(&mut conn.read_buf)?;
                conn.transaction_status = ready.transaction_status;
                info!("handshake complete");
                return Ok(());
            }
            other => match protocol::handle_fallthrough(other, &mut conn.read_buf)? {
                FallthroughOutcome::ParameterStatus(status) => {
                    conn.server_settings.insert(status.name, status.value);
                }
                FallthroughOutcome::LogMessage(log) => {
                    warn!(severity = log.severity, code = log.code, message = %log.message, "server log message during handshake");
                }
            },
        }
    }
}
