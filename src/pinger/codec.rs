use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::PingError;

pub const HANDSHAKE_ID: i32 = 0x00;
pub const STATUS_RESPONSE_ID: i32 = 0x00;
pub const NEXT_STATE_STATUS: i32 = 1;

/// Length-prefixed status request (packet 0x00 with an empty body).
pub const STATUS_REQUEST: [u8; 2] = [0x01, 0x00];

// favicons are base64 PNGs, so status documents can get large
const MAX_STATUS_LENGTH: i32 = 1 << 21;

pub fn put_var_int(buf: &mut BytesMut, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

pub fn put_string(buf: &mut BytesMut, value: &str) {
    put_var_int(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
}

/// Prefixes a packet body with its VarInt length.
pub fn frame(body: &[u8]) -> BytesMut {
    let mut packet = BytesMut::with_capacity(body.len() + 5);
    put_var_int(&mut packet, body.len() as i32);
    packet.put_slice(body);
    packet
}

pub fn handshake(host: &str, port: u16, protocol_version: i32) -> BytesMut {
    let mut body = BytesMut::new();
    put_var_int(&mut body, HANDSHAKE_ID);
    put_var_int(&mut body, protocol_version);
    put_string(&mut body, host);
    body.put_u16(port);
    put_var_int(&mut body, NEXT_STATE_STATUS);
    frame(&body)
}

pub async fn read_var_int<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, PingError> {
    let mut value = 0u32;
    for i in 0..5 {
        let byte = reader.read_u8().await.map_err(eof)?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(PingError::VarIntTooBig)
}

/// Reads a status response packet and returns its JSON document.
pub async fn read_status_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, PingError> {
    let _packet_length = read_var_int(reader).await?;
    let id = read_var_int(reader).await?;
    if id != STATUS_RESPONSE_ID {
        return Err(PingError::InvalidPacketId(id));
    }

    let length = read_var_int(reader).await?;
    if length <= 0 || length > MAX_STATUS_LENGTH {
        return Err(PingError::InvalidStringLength(length));
    }

    let mut body = vec![0; length as usize];
    reader.read_exact(&mut body).await.map_err(eof)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn eof(e: io::Error) -> PingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        PingError::PrematureEnd
    } else {
        PingError::Io(e)
    }
}
