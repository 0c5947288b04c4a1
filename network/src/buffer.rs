use byteorder::{ByteOrder, LittleEndian};
use std::{
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

/// A wrapper around a vec used for reading/writing packet data efficiently.
///
/// Writes always happen at the cursor, so a freshly created buffer behaves like an append-only
/// stream. Reads are mostly useful for inspecting encoded output.
#[derive(Clone, Default)]
pub struct PacketBuffer {
    inner: Vec<u8>,
    cursor: usize,
}

impl From<&[u8]> for PacketBuffer {
    fn from(bytes: &[u8]) -> Self {
        PacketBuffer {
            inner: Vec::from(bytes),
            cursor: 0,
        }
    }
}

impl From<Vec<u8>> for PacketBuffer {
    fn from(inner: Vec<u8>) -> Self {
        PacketBuffer { inner, cursor: 0 }
    }
}

impl Display for PacketBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:X?}", self.inner)
    }
}

impl PacketBuffer {
    /// Creates a new packet buffer with the given initial capacity.
    pub fn new(initial_size: usize) -> Self {
        PacketBuffer {
            inner: Vec::with_capacity(initial_size),
            cursor: 0,
        }
    }

    /// Return the length of this buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether or not this buffer holds any bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returs the position of the cursor in the buffer.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the number of bytes remaining in this buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.inner.len() - self.cursor
    }

    /// Returns the written bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Consumes this buffer, returning the inner vec.
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }

    #[inline]
    fn ensure_size(&mut self, size: usize) {
        if self.inner.len() < size {
            self.inner.resize(size, 0);
        }
    }

    /// Reads a byte from the buffer.
    #[inline]
    pub fn read(&mut self) -> io::Result<u8> {
        match self.inner.get(self.cursor) {
            Some(&byte) => {
                self.cursor += 1;
                Ok(byte)
            }
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    /// Reads the given number of bytes from this buffer.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<&[u8]> {
        if self.remaining() < len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        let start = self.cursor;
        self.cursor += len;
        Ok(&self.inner[start .. self.cursor])
    }

    /// Reads an unsigned variable length integer from this buffer.
    pub fn read_unsigned_varint(&mut self) -> io::Result<u32> {
        let mut result: u32 = 0;

        for i in 0 .. 5 {
            let byte = self.read()?;
            result |= ((byte & 0x7F) as u32) << (7 * i);

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "VarInt exceeds five bytes",
        ))
    }

    /// Reads a zig-zag encoded variable length integer from this buffer.
    pub fn read_varint(&mut self) -> io::Result<i32> {
        let raw = self.read_unsigned_varint()?;
        Ok((raw >> 1) as i32 ^ -((raw & 1) as i32))
    }

    /// Writes a byte to this buffer, expanding the buffer if needed.
    #[inline]
    pub fn write(&mut self, byte: u8) {
        if self.cursor >= self.inner.len() {
            self.inner.push(byte);
        } else {
            self.inner[self.cursor] = byte;
        }
        self.cursor += 1;
    }

    /// Writes the given bytes to this buffer.
    #[inline]
    pub fn write_bytes(&mut self, blob: &[u8]) {
        self.ensure_size(self.cursor + blob.len());
        self.inner[self.cursor .. self.cursor + blob.len()].copy_from_slice(blob);
        self.cursor += blob.len();
    }

    /// Writes the given bool to this buffer as a byte with value `1` corresponding to true, and
    /// `0` corresponding to false.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write(value as u8);
    }

    /// Writes the given words to this buffer as little-endian, four-byte unsigned integers.
    pub fn write_u32_words_le(&mut self, words: &[u32]) {
        let len = words.len() * 4;
        self.ensure_size(self.cursor + len);
        LittleEndian::write_u32_into(words, &mut self.inner[self.cursor .. self.cursor + len]);
        self.cursor += len;
    }

    /// Writes the given number of zero bytes to this buffer.
    pub fn write_zeros(&mut self, count: usize) {
        self.ensure_size(self.cursor + count);
        self.inner[self.cursor .. self.cursor + count].fill(0);
        self.cursor += count;
    }

    /// Returns the number of bytes the given integer would use if encoded as an unsigned variable
    /// length integer. This is anywhere from one to five bytes.
    #[inline]
    pub fn varint_size(value: u32) -> usize {
        match value {
            0 ..= 127 => 1,
            128 ..= 16383 => 2,
            16384 ..= 2097151 => 3,
            2097152 ..= 268435455 => 4,
            _ => 5,
        }
    }

    /// Writes the given unsigned variable length integer to this buffer.
    pub fn write_unsigned_varint(&mut self, mut value: u32) {
        loop {
            let next_byte = (value & 0x7F) as u8;
            value >>= 7;

            if value == 0 {
                self.write(next_byte);
                return;
            }

            self.write(next_byte | 0x80);
        }
    }

    /// Writes the given signed integer as a zig-zag encoded variable length integer.
    #[inline]
    pub fn write_varint(&mut self, value: i32) {
        self.write_unsigned_varint(((value << 1) ^ (value >> 31)) as u32);
    }

    /// Writes the given unsigned variable length long to this buffer.
    pub fn write_unsigned_varlong(&mut self, mut value: u64) {
        loop {
            let next_byte = (value & 0x7F) as u8;
            value >>= 7;

            if value == 0 {
                self.write(next_byte);
                return;
            }

            self.write(next_byte | 0x80);
        }
    }

    /// Writes the given signed long as a zig-zag encoded variable length long.
    #[inline]
    pub fn write_varlong(&mut self, value: i64) {
        self.write_unsigned_varlong(((value << 1) ^ (value >> 63)) as u64);
    }

    #[inline]
    pub fn write_i16_le(&mut self, value: i16) {
        let mut bytes = [0; 2];
        LittleEndian::write_i16(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    #[inline]
    pub fn write_f32_le(&mut self, value: f32) {
        let mut bytes = [0; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    #[inline]
    pub fn write_f64_le(&mut self, value: f64) {
        let mut bytes = [0; 8];
        LittleEndian::write_f64(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    /// Writes the given byte array to this buffer, prefixed by its length encoded as an unsigned
    /// variable length integer.
    pub fn write_byte_array(&mut self, value: &[u8]) {
        self.write_unsigned_varint(value.len() as u32);
        self.write_bytes(value);
    }
}

impl Write for PacketBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_varint_encoding() {
        let mut buffer = PacketBuffer::new(16);
        buffer.write_unsigned_varint(0);
        buffer.write_unsigned_varint(127);
        buffer.write_unsigned_varint(300);
        buffer.write_unsigned_varint(u32::MAX);

        assert_eq!(
            buffer.as_slice(),
            &[0x00, 0x7F, 0xAC, 0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F]
        );
        assert_eq!(PacketBuffer::varint_size(300), 2);
        assert_eq!(PacketBuffer::varint_size(u32::MAX), 5);
    }

    #[test]
    fn zigzag_varint() {
        let mut buffer = PacketBuffer::new(8);
        buffer.write_varint(-1);
        buffer.write_varint(1);
        buffer.write_varint(-64);
        assert_eq!(buffer.as_slice(), &[0x01, 0x02, 0x7F]);

        let mut reader = PacketBuffer::from(buffer.into_inner());
        assert_eq!(reader.read_varint().unwrap(), -1);
        assert_eq!(reader.read_varint().unwrap(), 1);
        assert_eq!(reader.read_varint().unwrap(), -64);
        assert!(reader.read_varint().is_err(), "Reading past the end should fail");
    }

    #[test]
    fn zigzag_varlong() {
        let mut buffer = PacketBuffer::new(16);
        buffer.write_varlong(-1);
        buffer.write_varlong(i64::MAX);
        assert_eq!(
            buffer.as_slice(),
            &[0x01, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn little_endian_scalars() {
        let mut buffer = PacketBuffer::new(16);
        buffer.write_i16_le(-2);
        buffer.write_f32_le(1.0);
        buffer.write_f64_le(-2.0);
        assert_eq!(
            buffer.as_slice(),
            &[0xFE, 0xFF, 0, 0, 0x80, 0x3F, 0, 0, 0, 0, 0, 0, 0, 0xC0]
        );
    }

    #[test]
    fn little_endian_words() {
        let mut buffer = PacketBuffer::new(8);
        buffer.write_u32_words_le(&[0x0403_0201, 0xFF]);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 0xFF, 0, 0, 0]);
    }
}
