//! Shared fixtures: synthetic TBI byte streams and a minimal BGZF writer.

#![allow(dead_code)]

use biometal_tabix::VirtualOffset;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

/// Standard BGZF end-of-file marker
pub const BGZF_EOF: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, 6, 0, 66, 67, 2, 0, 27, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

pub fn vo(block: u64, offset: u16) -> VirtualOffset {
    VirtualOffset::new(block, offset)
}

struct ReferenceFixture {
    name: String,
    bins: Vec<(u32, Vec<(VirtualOffset, VirtualOffset)>)>,
    linear: Vec<VirtualOffset>,
}

/// Builds a decompressed TBI byte stream field by field
pub struct TbiBuilder {
    magic: [u8; 4],
    format: i32,
    columns: (i32, i32, i32),
    meta: u8,
    skip: i32,
    references: Vec<ReferenceFixture>,
    unplaced: Option<u64>,
}

impl TbiBuilder {
    /// VCF preset: columns 1/2/0, '#' comments
    pub fn vcf() -> Self {
        TbiBuilder {
            magic: *b"TBI\x01",
            format: 2,
            columns: (1, 2, 0),
            meta: b'#',
            skip: 0,
            references: Vec::new(),
            unplaced: None,
        }
    }

    pub fn magic(mut self, magic: &[u8; 4]) -> Self {
        self.magic = *magic;
        self
    }

    pub fn format(mut self, format: i32) -> Self {
        self.format = format;
        self
    }

    pub fn columns(mut self, reference: i32, start: i32, end: i32) -> Self {
        self.columns = (reference, start, end);
        self
    }

    pub fn meta(mut self, meta: u8) -> Self {
        self.meta = meta;
        self
    }

    pub fn skip(mut self, skip: i32) -> Self {
        self.skip = skip;
        self
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.references.push(ReferenceFixture {
            name: name.to_string(),
            bins: Vec::new(),
            linear: Vec::new(),
        });
        self
    }

    /// Add a bin to the most recent reference
    pub fn bin(mut self, bin_id: u32, chunks: &[(VirtualOffset, VirtualOffset)]) -> Self {
        self.current().bins.push((bin_id, chunks.to_vec()));
        self
    }

    /// Set the linear index of the most recent reference
    pub fn linear(mut self, entries: &[VirtualOffset]) -> Self {
        self.current().linear = entries.to_vec();
        self
    }

    pub fn unplaced(mut self, count: u64) -> Self {
        self.unplaced = Some(count);
        self
    }

    fn current(&mut self) -> &mut ReferenceFixture {
        self.references.last_mut().expect("call reference() first")
    }

    pub fn build(&self) -> Vec<u8> {
        let mut names = Vec::new();
        for reference in &self.references {
            names.extend_from_slice(reference.name.as_bytes());
            names.push(0);
        }

        let mut data = Vec::new();
        data.extend_from_slice(&self.magic);
        data.extend_from_slice(&(self.references.len() as i32).to_le_bytes());
        data.extend_from_slice(&self.format.to_le_bytes());
        data.extend_from_slice(&self.columns.0.to_le_bytes());
        data.extend_from_slice(&self.columns.1.to_le_bytes());
        data.extend_from_slice(&self.columns.2.to_le_bytes());
        data.extend_from_slice(&i32::from(self.meta).to_le_bytes());
        data.extend_from_slice(&self.skip.to_le_bytes());
        data.extend_from_slice(&(names.len() as i32).to_le_bytes());
        data.extend_from_slice(&names);

        for reference in &self.references {
            data.extend_from_slice(&(reference.bins.len() as i32).to_le_bytes());
            for (bin_id, chunks) in &reference.bins {
                data.extend_from_slice(&bin_id.to_le_bytes());
                data.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
                for (minv, maxv) in chunks {
                    data.extend_from_slice(&minv.encode().to_le_bytes());
                    data.extend_from_slice(&maxv.encode().to_le_bytes());
                }
            }
            data.extend_from_slice(&(reference.linear.len() as i32).to_le_bytes());
            for entry in &reference.linear {
                data.extend_from_slice(&entry.encode().to_le_bytes());
            }
        }

        if let Some(count) = self.unplaced {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data
    }
}

/// Compress one BGZF block (header with BC subfield, deflate, CRC32, ISIZE)
pub fn bgzf_block(data: &[u8]) -> Vec<u8> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(data).unwrap();
    let deflated = deflate.finish().unwrap();

    let mut block = vec![31, 139, 8, 4, 0, 0, 0, 0, 0, 255];
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(&[66, 67]);
    block.extend_from_slice(&2u16.to_le_bytes());
    let bsize_pos = block.len();
    block.extend_from_slice(&0u16.to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());

    let bsize = (block.len() - 1) as u16;
    block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());
    block
}

/// BGZF-compress `data` in blocks of at most `block_size` input bytes, plus EOF marker
pub fn bgzf_compress(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for piece in data.chunks(block_size.max(1)) {
        out.extend_from_slice(&bgzf_block(piece));
    }
    out.extend_from_slice(&BGZF_EOF);
    out
}

/// Index shaped like the volvox test VCF: two contigs, VCF preset,
/// first data record at virtual offset 0:10501.
pub fn volvox_tbi() -> Vec<u8> {
    TbiBuilder::vcf()
        .reference("ctgA")
        .bin(4681, &[(vo(0, 10501), vo(0, 30210))])
        .bin(73, &[(vo(0, 30210), vo(0, 31000))])
        .bin(4683, &[(vo(0, 40000), vo(9000, 120))])
        .linear(&[vo(0, 10501), vo(0, 30210), vo(0, 40000)])
        .reference("ctgB")
        .bin(4681, &[(vo(9000, 120), vo(9500, 0))])
        .linear(&[vo(9000, 120)])
        .build()
}

/// The volvox index as it ships on disk: BGZF-compressed
pub fn volvox_tbi_gz() -> Vec<u8> {
    bgzf_compress(&volvox_tbi(), 65280)
}
