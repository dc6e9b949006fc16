use crate::any::Any;
use crate::block::ID;
use crate::read::{Decoder, ReadExt};
use crate::write::{Encoder, WriteExt};
use crate::{ClientID, Clock};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

/// Version 1 update encoder. A single byte sink where all fields are written inline,
/// in the order the decoder expects them.
#[derive(Default)]
pub struct EncoderV1 {
    buf: BytesMut,
}

impl EncoderV1 {
    pub fn new() -> Self {
        EncoderV1 {
            buf: BytesMut::new(),
        }
    }

    pub fn finalize(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Write for EncoderV1 {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Encoder for EncoderV1 {
    fn reset_ds_cur_val(&mut self) {
        // no-op: v1 writes delete set clocks as absolute values
    }

    fn write_ds_clock(&mut self, clock: Clock) -> crate::Result<()> {
        self.write_var(clock)
    }

    fn write_ds_len(&mut self, len: Clock) -> crate::Result<()> {
        self.write_var(len)
    }

    fn write_left_id(&mut self, id: &ID) -> crate::Result<()> {
        self.write_var(id.client)?;
        self.write_var(id.clock)
    }

    fn write_right_id(&mut self, id: &ID) -> crate::Result<()> {
        self.write_var(id.client)?;
        self.write_var(id.clock)
    }

    fn write_client(&mut self, client: ClientID) -> crate::Result<()> {
        self.write_var(client)
    }

    fn write_info(&mut self, info: u8) -> crate::Result<()> {
        self.write_u8(info)
    }

    fn write_parent_info(&mut self, is_root: bool) -> crate::Result<()> {
        self.write_var(if is_root { 1u32 } else { 0u32 })
    }

    fn write_type_ref(&mut self, info: u8) -> crate::Result<()> {
        self.write_var(info)
    }

    fn write_len(&mut self, len: Clock) -> crate::Result<()> {
        self.write_var(len)
    }

    fn write_key(&mut self, key: &str) -> crate::Result<()> {
        self.write_string(key)
    }

    fn write_any(&mut self, any: &Any) -> crate::Result<()> {
        any.encode(self)
    }

    fn write_json(&mut self, any: &serde_json::Value) -> crate::Result<()> {
        let json = serde_json::to_string(any)?;
        self.write_string(&json)
    }
}

/// Version 1 update decoder, the exact inverse of [EncoderV1].
pub struct DecoderV1<R> {
    reader: R,
}

impl<R: Read> DecoderV1<R> {
    pub fn new(reader: R) -> Self {
        DecoderV1 { reader }
    }
}

impl<'a> DecoderV1<Cursor<&'a [u8]>> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        DecoderV1::new(Cursor::new(bytes))
    }
}

impl<R: Read> Read for DecoderV1<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read> Decoder for DecoderV1<R> {
    fn reset_ds_cur_val(&mut self) {
        // no-op: v1 reads delete set clocks as absolute values
    }

    fn read_ds_clock(&mut self) -> crate::Result<Clock> {
        self.read_var()
    }

    fn read_ds_len(&mut self) -> crate::Result<Clock> {
        self.read_var()
    }

    fn read_left_id(&mut self) -> crate::Result<ID> {
        let client = self.read_var()?;
        let clock = self.read_var()?;
        Ok(ID::new(client, clock))
    }

    fn read_right_id(&mut self) -> crate::Result<ID> {
        let client = self.read_var()?;
        let clock = self.read_var()?;
        Ok(ID::new(client, clock))
    }

    fn read_client(&mut self) -> crate::Result<ClientID> {
        self.read_var()
    }

    fn read_info(&mut self) -> crate::Result<u8> {
        self.read_u8()
    }

    fn read_parent_info(&mut self) -> crate::Result<bool> {
        match self.read_var::<u32>()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(crate::Error::OutOfRange),
        }
    }

    fn read_type_ref(&mut self) -> crate::Result<u8> {
        self.read_var()
    }

    fn read_len(&mut self) -> crate::Result<Clock> {
        self.read_var()
    }

    fn read_key(&mut self) -> crate::Result<Arc<str>> {
        let mut key = String::new();
        self.read_string(&mut key)?;
        Ok(key.into())
    }

    fn read_any(&mut self) -> crate::Result<Any> {
        Any::decode(self)
    }

    fn read_json(&mut self) -> crate::Result<serde_json::Value> {
        let mut json = String::new();
        self.read_string(&mut json)?;
        Ok(serde_json::from_str(&json)?)
    }
}
