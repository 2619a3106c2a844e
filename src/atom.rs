//! Box writer the handlers emit sample descriptions and sample data through.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{MuxError, Result};
use crate::format::FourCc;

/// Container-side box tree. Handlers open child boxes under the current one,
/// append body bytes and close them again; the writer owns all size fields.
pub trait AtomWriter {
    /// Opens `typ` as a child of the current box; it becomes the current box.
    fn open_child(&mut self, typ: FourCc) -> Result<()>;

    /// Appends raw bytes to the body of the current box.
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Finalizes the size of the current box and returns to its parent.
    fn close(&mut self) -> Result<()>;
}

/// In-memory box tree with 32-bit size headers patched on close.
#[derive(Debug, Default)]
pub struct AtomBuffer {
    buf: Vec<u8>,
    open: Vec<usize>,
}

impl AtomBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Result<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(MuxError::Nesting(format!(
                "{} box(es) still open",
                self.open.len()
            )));
        }
        Ok(self.buf)
    }
}

impl AtomWriter for AtomBuffer {
    fn open_child(&mut self, typ: FourCc) -> Result<()> {
        self.buf.try_reserve(8)?;
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0u8; 4]); // size placeholder
        self.buf.extend_from_slice(typ.as_bytes());
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.buf.try_reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let start = self
            .open
            .pop()
            .ok_or_else(|| MuxError::Nesting("close without open box".to_string()))?;
        let size = u32::try_from(self.buf.len() - start)
            .map_err(|_| MuxError::writer("box larger than 4 GiB"))?;
        BigEndian::write_u32(&mut self.buf[start..start + 4], size);
        Ok(())
    }
}

/// Body of the first box of type `typ` found anywhere in `data`.
#[cfg(test)]
pub(crate) fn box_body<'a>(data: &'a [u8], typ: &[u8; 4]) -> Option<&'a [u8]> {
    let pos = data.windows(4).position(|w| w == typ)?;
    let start = pos.checked_sub(4)?;
    let size = BigEndian::read_u32(&data[start..pos]) as usize;
    data.get(pos + 4..start + size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_boxes_get_sizes() {
        let mut atom = AtomBuffer::new();
        atom.open_child(FourCc::new(b"stsd")).unwrap();
        atom.append(&[0, 0, 0, 0]).unwrap();
        atom.open_child(FourCc::new(b"free")).unwrap();
        atom.append(&[1, 2, 3]).unwrap();
        atom.close().unwrap();
        atom.close().unwrap();

        let out = atom.into_inner().unwrap();
        assert_eq!(out.len(), 8 + 4 + 8 + 3);
        assert_eq!(BigEndian::read_u32(&out[0..4]), 23);
        assert_eq!(&out[4..8], b"stsd");
        assert_eq!(BigEndian::read_u32(&out[12..16]), 11);
        assert_eq!(&out[16..20], b"free");
        assert_eq!(&out[20..], &[1, 2, 3]);
    }

    #[test]
    fn test_unbalanced_close_fails() {
        let mut atom = AtomBuffer::new();
        assert!(atom.close().is_err());
        atom.open_child(FourCc::new(b"moov")).unwrap();
        assert_eq!(atom.depth(), 1);
        assert!(atom.into_inner().is_err());
    }

    #[test]
    fn test_box_body_lookup() {
        let mut atom = AtomBuffer::new();
        atom.open_child(FourCc::new(b"avc1")).unwrap();
        atom.append(&[0xEE; 4]).unwrap();
        atom.open_child(FourCc::new(b"avcC")).unwrap();
        atom.append(&[1, 0x42]).unwrap();
        atom.close().unwrap();
        atom.close().unwrap();
        let out = atom.into_inner().unwrap();

        assert_eq!(box_body(&out, b"avcC"), Some(&[1u8, 0x42][..]));
        assert_eq!(box_body(&out, b"avc1").map(|b| b.len()), Some(4 + 10));
        assert_eq!(box_body(&out, b"esds"), None);
    }
}
