//! MPEG-4 Systems (ISO/IEC 14496-1) object descriptors.
//!
//! A [`Descriptor`] is a tag byte, a base-128 size field and a body made of raw
//! bytes and/or already serialized child descriptors. The `esds` box every
//! MPEG-4 audio/visual sample entry carries is built from these.

use crate::atom::AtomWriter;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::format::FourCc;
use crate::utils::reserve_blocks;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    EsDescriptor = 0x03,
    DecoderConfig = 0x04,
    DecoderSpecificInfo = 0x05,
    SlConfig = 0x06,
}

#[derive(Clone, Debug)]
pub struct Descriptor {
    tag: Tag,
    body: Vec<u8>,
}

impl Descriptor {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            body: Vec::new(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        reserve_blocks(&mut self.body, data.len())?;
        self.body.extend_from_slice(data);
        Ok(())
    }

    /// Serializes `child` in place at the end of this descriptor's body.
    pub fn append_child(&mut self, child: &Descriptor) -> Result<()> {
        reserve_blocks(&mut self.body, child.len())?;
        child.write_into(&mut self.body);
        Ok(())
    }

    /// Encoded length: tag, size field and body.
    pub fn len(&self) -> usize {
        1 + size_field_len(self.body.len()) + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.len())?;
        self.write_into(&mut out);
        Ok(out)
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        out.push(self.tag as u8);
        let len = self.body.len();
        let n = size_field_len(len);
        for i in (0..n).rev() {
            let mut b = ((len >> (7 * i)) & 0x7F) as u8;
            if i > 0 {
                b |= 0x80;
            }
            out.push(b);
        }
        out.extend_from_slice(&self.body);
    }
}

/// Number of bytes the base-128 size field takes for a body of `len` bytes.
pub fn size_field_len(len: usize) -> usize {
    let mut n = 1;
    let mut rest = len >> 7;
    while rest > 0 {
        n += 1;
        rest >>= 7;
    }
    n
}

/// `objectTypeIndication` values used by the handlers.
pub mod object_type {
    pub const MPEG4_VISUAL: u8 = 0x20;
    pub const AAC: u8 = 0x40;
    /// User-private range; used for raw wave audio.
    pub const PRIVATE: u8 = 0xC0;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
    Visual = 4,
    Audio = 5,
}

/// Inputs of the standard ES descriptor tree.
pub struct EsParams<'a> {
    pub es_id: u16,
    pub object_type: u8,
    pub stream_type: StreamType,
    pub decoder: &'a DecoderConfig,
    /// Decoder-specific info body (codec configuration bytes).
    pub specific_info: &'a [u8],
}

/// ES descriptor
///   decoder config (object type, stream type, buffer size, bitrates)
///     decoder specific info
///   SL config
pub fn build_es_descriptor(params: &EsParams<'_>) -> Result<Descriptor> {
    let mut es = Descriptor::new(Tag::EsDescriptor);
    let mut b = [0u8; 13];
    b[0..2].copy_from_slice(&params.es_id.to_be_bytes());
    b[2] = 0; // no dependency, URL or OCR stream
    es.append(&b[..3])?;

    let mut dcfg = Descriptor::new(Tag::DecoderConfig);
    b[0] = params.object_type;
    b[1] = ((params.stream_type as u8) << 2) | 1; // upstream = 0, reserved = 1
    b[2..5].copy_from_slice(&params.decoder.buffer_size.to_be_bytes()[1..]);
    b[5..9].copy_from_slice(&params.decoder.max_bitrate.to_be_bytes());
    b[9..13].copy_from_slice(&params.decoder.avg_bitrate.to_be_bytes());
    dcfg.append(&b)?;

    let mut dsi = Descriptor::new(Tag::DecoderSpecificInfo);
    dsi.append(params.specific_info)?;
    dcfg.append_child(&dsi)?;
    es.append_child(&dcfg)?;

    let mut sl = Descriptor::new(Tag::SlConfig);
    sl.append(&[0x02])?; // predefined: reserved for MP4 files
    es.append_child(&sl)?;
    Ok(es)
}

/// Body of an `esds` full box: version & flags, then the serialized ES descriptor tree.
pub fn esds_payload(params: &EsParams<'_>) -> Result<Vec<u8>> {
    let es = build_es_descriptor(params)?;
    let mut payload = Vec::new();
    payload.try_reserve_exact(4 + es.len())?;
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(&es.to_bytes()?);
    Ok(payload)
}

/// Writes an `esds` box with a payload from [`esds_payload`] under the current box.
pub fn write_esds(atom: &mut dyn AtomWriter, payload: &[u8]) -> Result<()> {
    atom.open_child(FourCc::new(b"esds"))?;
    atom.append(payload)?;
    atom.close()
}
