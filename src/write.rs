use crate::any::Any;
use crate::block::ID;
use crate::varint::VarInt;
use crate::{ClientID, Clock};
use std::io::Write;
use std::ops::Range;

pub trait Encoder: Write {
    /// Reset the state of currently encoded delete set.
    fn reset_ds_cur_val(&mut self);

    /// Write a clock value of currently encoded delete set client.
    fn write_ds_clock(&mut self, clock: Clock) -> crate::Result<()>;

    /// Write a number of client entries used by currently encoded delete set.
    fn write_ds_len(&mut self, len: Clock) -> crate::Result<()>;

    /// Write unique identifier of a currently encoded [crate::Block]'s left origin.
    fn write_left_id(&mut self, id: &ID) -> crate::Result<()>;

    /// Write unique identifier of a currently encoded [crate::Block]'s right origin.
    fn write_right_id(&mut self, id: &ID) -> crate::Result<()>;

    /// Write currently encoded client identifier.
    fn write_client(&mut self, client: ClientID) -> crate::Result<()>;

    /// Write currently encoded [crate::Block]'s info flags. These contain information about which
    /// fields have been provided and which should be skipped during decoding process as well as
    /// a type of block currently encoded.
    fn write_info(&mut self, info: u8) -> crate::Result<()>;

    /// Write info flag about currently encoded [crate::Block]'s parent. Is it a root type (true)
    /// or another block (false).
    fn write_parent_info(&mut self, is_root: bool) -> crate::Result<()>;

    /// Writes type ref data of currently encoded [crate::Block]'s parent.
    fn write_type_ref(&mut self, info: u8) -> crate::Result<()>;

    /// Write length parameter.
    fn write_len(&mut self, len: Clock) -> crate::Result<()>;

    /// Write a string key.
    fn write_key(&mut self, key: &str) -> crate::Result<()>;

    /// Encode a self-describing value.
    fn write_any(&mut self, any: &Any) -> crate::Result<()>;

    /// Encode a value as a nested JSON string.
    fn write_json(&mut self, any: &serde_json::Value) -> crate::Result<()>;
}

pub trait Encode {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()>;
}

impl Encode for Range<Clock> {
    fn encode_with<E: Encoder>(&self, encoder: &mut E) -> crate::Result<()> {
        encoder.write_ds_clock(self.start)?;
        encoder.write_ds_len(self.end - self.start)
    }
}

pub trait WriteExt: Write + Sized {
    fn write_u8(&mut self, num: u8) -> crate::Result<()> {
        Ok(self.write_all(&[num])?)
    }

    /// Write a variable length integer or unsigned integer.
    #[inline]
    fn write_var<T: VarInt>(&mut self, num: T) -> crate::Result<()> {
        num.write(self)?;
        Ok(())
    }

    /// Write variable length buffer (binary content).
    fn write_buf<B: AsRef<[u8]>>(&mut self, buf: B) -> crate::Result<()> {
        let buf = buf.as_ref();
        self.write_var(buf.len())?;
        Ok(self.write_all(buf)?)
    }

    /// Write variable-length utf8 string.
    #[inline]
    fn write_string(&mut self, str: &str) -> crate::Result<()> {
        self.write_buf(str)
    }

    /// Write floating point number in 4 bytes, big endian order.
    #[inline]
    fn write_f32(&mut self, num: f32) -> crate::Result<()> {
        Ok(self.write_all(&num.to_be_bytes())?)
    }

    /// Write floating point number in 8 bytes, big endian order.
    #[inline]
    fn write_f64(&mut self, num: f64) -> crate::Result<()> {
        Ok(self.write_all(&num.to_be_bytes())?)
    }

    /// Write a big integer in 8 bytes, big endian order.
    #[inline]
    fn write_i64(&mut self, num: i64) -> crate::Result<()> {
        Ok(self.write_all(&num.to_be_bytes())?)
    }
}

impl<W: Write> WriteExt for W {}
