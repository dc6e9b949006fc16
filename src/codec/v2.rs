use crate::any::Any;
use crate::block::ID;
use crate::read::{Decoder, ReadExt};
use crate::write::{Encoder, WriteExt};
use crate::{ClientID, Clock};
use bytes::Bytes;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

/// Version 2 update encoder. Fields with high run-length redundancy (info bytes, client
/// identifiers) and strings are diverted into auxiliary column streams; everything else goes to
/// the primary stream. Delete set clocks are written as deltas against a per-client cursor.
///
/// [EncoderV2::finalize] frames the columns as length-prefixed sections ahead of the primary
/// stream, which is what makes the two formats non-interchangeable per message.
#[derive(Default)]
pub struct EncoderV2 {
    rest: Vec<u8>,
    info: RleEncoder,
    client: UintRleEncoder,
    string: Vec<u8>,
    ds_cur_val: Clock,
}

impl EncoderV2 {
    pub fn new() -> Self {
        EncoderV2::default()
    }

    pub fn finalize(self) -> crate::Result<Bytes> {
        let info = self.info.finish()?;
        let client = self.client.finish()?;
        let mut out = Vec::with_capacity(
            info.len() + client.len() + self.string.len() + self.rest.len() + 16,
        );
        out.write_buf(&info)?;
        out.write_buf(&client)?;
        out.write_buf(&self.string)?;
        out.write_all(&self.rest)?;
        Ok(out.into())
    }
}

impl Write for EncoderV2 {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.rest.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Encoder for EncoderV2 {
    fn reset_ds_cur_val(&mut self) {
        self.ds_cur_val = 0;
    }

    fn write_ds_clock(&mut self, clock: Clock) -> crate::Result<()> {
        let diff = clock
            .checked_sub(self.ds_cur_val)
            .ok_or(crate::Error::OutOfRange)?;
        self.ds_cur_val = clock;
        self.write_var(diff)
    }

    fn write_ds_len(&mut self, len: Clock) -> crate::Result<()> {
        self.write_var(len)
    }

    fn write_left_id(&mut self, id: &ID) -> crate::Result<()> {
        self.client.write_u64(id.client.get())?;
        self.write_var(id.clock)
    }

    fn write_right_id(&mut self, id: &ID) -> crate::Result<()> {
        self.client.write_u64(id.client.get())?;
        self.write_var(id.clock)
    }

    fn write_client(&mut self, client: ClientID) -> crate::Result<()> {
        self.client.write_u64(client.get())
    }

    fn write_info(&mut self, info: u8) -> crate::Result<()> {
        self.info.write_u8(info)
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
        self.string.write_string(key)
    }

    fn write_any(&mut self, any: &Any) -> crate::Result<()> {
        any.encode(self)
    }

    fn write_json(&mut self, any: &serde_json::Value) -> crate::Result<()> {
        let json = serde_json::to_string(any)?;
        self.write_string(&json)
    }
}

/// Version 2 update decoder. The constructor reads the column framing up front; primary stream
/// reads then interleave with column reads in whatever order the caller issues them.
pub struct DecoderV2<'a> {
    info: RleDecoder<'a>,
    client: UintRleDecoder<'a>,
    string: Cursor<&'a [u8]>,
    rest: Cursor<&'a [u8]>,
    ds_cur_val: Clock,
}

impl<'a> DecoderV2<'a> {
    pub fn from_slice(bytes: &'a [u8]) -> crate::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let info = Self::read_section(&mut cursor, bytes)?;
        let client = Self::read_section(&mut cursor, bytes)?;
        let string = Self::read_section(&mut cursor, bytes)?;
        let rest = &bytes[cursor.position() as usize..];
        Ok(DecoderV2 {
            info: RleDecoder::new(info),
            client: UintRleDecoder::new(client),
            string: Cursor::new(string),
            rest: Cursor::new(rest),
            ds_cur_val: 0,
        })
    }

    fn read_section(
        cursor: &mut Cursor<&'a [u8]>,
        bytes: &'a [u8],
    ) -> crate::Result<&'a [u8]> {
        let len: usize = cursor.read_var()?;
        let start = cursor.position() as usize;
        let end = start.checked_add(len).ok_or(crate::Error::EndOfBuffer)?;
        if end > bytes.len() {
            return Err(crate::Error::EndOfBuffer);
        }
        cursor.set_position(end as u64);
        Ok(&bytes[start..end])
    }
}

impl<'a> Read for DecoderV2<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.rest.read(buf)
    }
}

impl<'a> Decoder for DecoderV2<'a> {
    fn reset_ds_cur_val(&mut self) {
        self.ds_cur_val = 0;
    }

    fn read_ds_clock(&mut self) -> crate::Result<Clock> {
        let diff: Clock = self.read_var()?;
        let clock = self
            .ds_cur_val
            .checked_add(diff)
            .ok_or(crate::Error::OutOfRange)?;
        self.ds_cur_val = clock;
        Ok(clock)
    }

    fn read_ds_len(&mut self) -> crate::Result<Clock> {
        self.read_var()
    }

    fn read_left_id(&mut self) -> crate::Result<ID> {
        let client = ClientID::new(self.client.read_u64()?);
        let clock = self.read_var()?;
        Ok(ID::new(client, clock))
    }

    fn read_right_id(&mut self) -> crate::Result<ID> {
        let client = ClientID::new(self.client.read_u64()?);
        let clock = self.read_var()?;
        Ok(ID::new(client, clock))
    }

    fn read_client(&mut self) -> crate::Result<ClientID> {
        Ok(ClientID::new(self.client.read_u64()?))
    }

    fn read_info(&mut self) -> crate::Result<u8> {
        self.info.read_u8()
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
        self.string.read_string(&mut key)?;
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

/// Run-length encoder for bytes: `(value, count)` pairs, flushed when the value changes.
#[derive(Default)]
struct RleEncoder {
    buf: Vec<u8>,
    last: Option<u8>,
    count: u64,
}

impl RleEncoder {
    fn write_u8(&mut self, value: u8) -> crate::Result<()> {
        if self.last == Some(value) {
            self.count += 1;
        } else {
            self.flush()?;
            self.last = Some(value);
            self.count = 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> crate::Result<()> {
        if let Some(value) = self.last.take() {
            WriteExt::write_u8(&mut self.buf, value)?;
            self.buf.write_var(self.count)?;
            self.count = 0;
        }
        Ok(())
    }

    fn finish(mut self) -> crate::Result<Vec<u8>> {
        self.flush()?;
        Ok(self.buf)
    }
}

struct RleDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    last: u8,
    remaining: u64,
}

impl<'a> RleDecoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        RleDecoder {
            cursor: Cursor::new(bytes),
            last: 0,
            remaining: 0,
        }
    }

    fn read_u8(&mut self) -> crate::Result<u8> {
        if self.remaining == 0 {
            self.last = ReadExt::read_u8(&mut self.cursor)?;
            self.remaining = self.cursor.read_var()?;
            if self.remaining == 0 {
                return Err(crate::Error::OutOfRange);
            }
        }
        self.remaining -= 1;
        Ok(self.last)
    }
}

/// Run-length encoder for unsigned integers: `(value, count)` varint pairs.
#[derive(Default)]
struct UintRleEncoder {
    buf: Vec<u8>,
    last: Option<u64>,
    count: u64,
}

impl UintRleEncoder {
    fn write_u64(&mut self, value: u64) -> crate::Result<()> {
        if self.last == Some(value) {
            self.count += 1;
        } else {
            self.flush()?;
            self.last = Some(value);
            self.count = 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> crate::Result<()> {
        if let Some(value) = self.last.take() {
            self.buf.write_var(value)?;
            self.buf.write_var(self.count)?;
            self.count = 0;
        }
        Ok(())
    }

    fn finish(mut self) -> crate::Result<Vec<u8>> {
        self.flush()?;
        Ok(self.buf)
    }
}

struct UintRleDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    last: u64,
    remaining: u64,
}

impl<'a> UintRleDecoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        UintRleDecoder {
            cursor: Cursor::new(bytes),
            last: 0,
            remaining: 0,
        }
    }

    fn read_u64(&mut self) -> crate::Result<u64> {
        if self.remaining == 0 {
            self.last = self.cursor.read_var()?;
            self.remaining = self.cursor.read_var()?;
            if self.remaining == 0 {
                return Err(crate::Error::OutOfRange);
            }
        }
        self.remaining -= 1;
        Ok(self.last)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rle_roundtrip() {
        let mut enc = RleEncoder::default();
        let input = [4u8, 4, 4, 0, 0, 7, 4];
        for b in input {
            enc.write_u8(b).unwrap();
        }
        let buf = enc.finish().unwrap();
        // 4 runs instead of 7 raw bytes
        assert_eq!(buf.len(), 8);
        let mut dec = RleDecoder::new(&buf);
        for b in input {
            assert_eq!(dec.read_u8().unwrap(), b);
        }
        assert!(dec.read_u8().is_err());
    }

    #[test]
    fn uint_rle_roundtrip() {
        let mut enc = UintRleEncoder::default();
        let input = [873265u64, 873265, 873265, 1, u64::MAX];
        for v in input {
            enc.write_u64(v).unwrap();
        }
        let buf = enc.finish().unwrap();
        let mut dec = UintRleDecoder::new(&buf);
        for v in input {
            assert_eq!(dec.read_u64().unwrap(), v);
        }
        assert!(dec.read_u64().is_err());
    }
}
