use std::fmt::Debug;

/// Location of bytes reserved with [`BufWriter::ph`] and friends, to be
/// written once their value is known.
#[derive(Debug)]
#[must_use]
pub struct Placeholder<const N: usize>(usize);
impl<const N: usize> Placeholder<N> {
    fn range(&self) -> std::ops::Range<usize> {
        self.0..(self.0 + N)
    }

    /// Number of bytes written after the placeholder.
    pub fn distance(&self, w: &BufWriter) -> usize {
        w.len() - self.0 - N
    }
}

/// Big endian byte sink for class file structures.
#[derive(Default)]
pub struct BufWriter {
    buf: Vec<u8>,
}
impl BufWriter {
    pub fn into_buf(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn extend(&mut self, v: &BufWriter) {
        self.buf.extend_from_slice(&v.buf)
    }
    pub fn write(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v)
    }
    pub fn u8(&mut self, v: u8) {
        self.buf.push(v)
    }
    pub fn u16(&mut self, v: u16) {
        self.write(&v.to_be_bytes())
    }
    pub fn u32(&mut self, v: u32) {
        self.write(&v.to_be_bytes())
    }
    pub fn u64(&mut self, v: u64) {
        self.write(&v.to_be_bytes())
    }
    pub fn i8(&mut self, v: i8) {
        self.write(&v.to_be_bytes())
    }
    pub fn i16(&mut self, v: i16) {
        self.write(&v.to_be_bytes())
    }
    pub fn i32(&mut self, v: i32) {
        self.write(&v.to_be_bytes())
    }
    ///////////////////////////////////////////////////////////////////////////
    pub fn ph(&mut self) -> Placeholder<2> {
        let i = self.buf.len();
        self.u16(0);
        Placeholder(i)
    }

    pub fn ph32(&mut self) -> Placeholder<4> {
        let i = self.buf.len();
        self.u32(0);
        Placeholder(i)
    }

    pub fn fill(&mut self, ph: Placeholder<2>, v: u16) {
        self.buf[ph.range()].copy_from_slice(&v.to_be_bytes());
    }

    pub fn fill32(&mut self, ph: Placeholder<4>, v: u32) {
        self.buf[ph.range()].copy_from_slice(&v.to_be_bytes());
    }
}
impl Debug for BufWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:02X?}", self.buf))
    }
}
