use crate::any::Any;
use crate::block::ID;
use crate::varint::VarInt;
use crate::{ClientID, Clock};
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

pub trait Decoder: Read {
    /// Reset the value of current delete set state.
    fn reset_ds_cur_val(&mut self);

    /// Read next delete set clock value.
    fn read_ds_clock(&mut self) -> crate::Result<Clock>;

    /// Read the number of clients stored in an encoded delete set.
    fn read_ds_len(&mut self) -> crate::Result<Clock>;

    /// Read left origin of a currently decoded [crate::Block].
    fn read_left_id(&mut self) -> crate::Result<ID>;

    /// Read right origin of a currently decoded [crate::Block].
    fn read_right_id(&mut self) -> crate::Result<ID>;

    /// Read currently decoded client identifier.
    fn read_client(&mut self) -> crate::Result<ClientID>;

    /// Read info bit flags of a currently decoded [crate::Block].
    fn read_info(&mut self) -> crate::Result<u8>;

    /// Read bit flag determining whether parent of a currently decoded [crate::Block] is a root
    /// type (true) or another block (false).
    fn read_parent_info(&mut self) -> crate::Result<bool>;

    /// Read type ref info of a currently decoded [crate::Block] parent.
    fn read_type_ref(&mut self) -> crate::Result<u8>;

    /// Read length parameter.
    fn read_len(&mut self) -> crate::Result<Clock>;

    /// Read key string.
    fn read_key(&mut self) -> crate::Result<Arc<str>>;

    /// Decode a self-describing value.
    fn read_any(&mut self) -> crate::Result<Any>;

    /// Decode a value carried as an embedded JSON string.
    fn read_json(&mut self) -> crate::Result<serde_json::Value>;
}

pub trait Decode: Sized {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self>;
}

impl Decode for Range<Clock> {
    fn decode_with<D: Decoder>(decoder: &mut D) -> crate::Result<Self> {
        let clock = decoder.read_ds_clock()?;
        let len = decoder.read_ds_len()?;
        let end = clock.checked_add(len).ok_or(crate::Error::OutOfRange)?;
        Ok(clock..end)
    }
}

pub trait ReadExt: Read + Sized {
    /// Read unsigned integer with variable length.
    /// * numbers < 2^7 are stored in one byte
    /// * numbers < 2^14 are stored in two bytes
    #[inline]
    fn read_var<T: VarInt>(&mut self) -> crate::Result<T> {
        Ok(T::read(self)?)
    }

    /// Read a variable length buffer.
    fn read_buf(&mut self, buf: &mut Vec<u8>) -> crate::Result<()> {
        let len: u64 = self.read_var()?;
        let len = len as usize;
        buf.try_reserve(len)?;
        let start = buf.len();
        buf.resize(start + len, 0);
        self.read_exact(&mut buf[start..])?;
        Ok(())
    }

    /// Read string of variable length.
    fn read_string(&mut self, str: &mut String) -> crate::Result<()> {
        let mut buf = Vec::new();
        self.read_buf(&mut buf)?;
        let s = String::from_utf8(buf).map_err(|_| crate::Error::OutOfRange)?;
        str.push_str(&s);
        Ok(())
    }

    /// Read float32 in big endian order.
    fn read_f32(&mut self) -> crate::Result<f32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    /// Read float64 in big endian order.
    fn read_f64(&mut self) -> crate::Result<f64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Read a big integer in 8 bytes, big endian order.
    fn read_i64(&mut self) -> crate::Result<i64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn read_u8(&mut self) -> crate::Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl<T: Read> ReadExt for T {}
