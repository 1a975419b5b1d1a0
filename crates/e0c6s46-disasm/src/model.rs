use anyhow::Result;
use e0c6s46_rs::Bus;
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    /// Word address of the first two bytes.
    pub base: u32,
    pub bytes: Vec<u8>,
    pub perms: &'static str, // e.g., "r-x"
    pub kind: &'static str,  // e.g., "raw"
}

impl Segment {
    pub fn words(&self) -> u32 {
        (self.bytes.len() / 2) as u32
    }

    pub fn end(&self) -> u32 {
        self.base + self.words()
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    pub segments: Vec<Segment>,
}

pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    anyhow::ensure!(payload.len() >= 2, "image holds no complete instruction word");
    let seg = Segment { name: "rom".into(), base, bytes: payload.to_vec(), perms: "r-x", kind: "raw" };
    Ok(Image { segments: vec![seg] })
}

/// Drop everything at or above word `limit`. Returns the number of bytes cut.
pub fn clamp_words(img: &mut Image, limit: u32) -> usize {
    let mut cut = 0;
    for s in &mut img.segments {
        let keep = (limit.saturating_sub(s.base) as usize * 2).min(s.bytes.len());
        cut += s.bytes.len() - keep;
        s.bytes.truncate(keep);
    }
    img.segments.retain(|s| s.words() > 0);
    cut
}

pub fn read_word(img: &Image, addr: u32) -> Option<[u8; 2]> {
    let s = img.segments.iter().find(|s| addr >= s.base && addr < s.end())?;
    let off = ((addr - s.base) * 2) as usize;
    Some([s.bytes[off], s.bytes[off + 1]])
}

pub fn is_mapped(img: &Image, addr: u32) -> bool {
    img.segments.iter().any(|s| addr >= s.base && addr < s.end())
}

impl Bus for Image {
    fn read_word(&self, addr: u32) -> Option<[u8; 2]> {
        read_word(self, addr)
    }

    fn words(&self) -> Range<u32> {
        let start = self.segments.iter().map(|s| s.base).min().unwrap_or(0);
        let end = self.segments.iter().map(Segment::end).max().unwrap_or(0);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_maps_skip_and_len() {
        let path = std::env::temp_dir().join("_e0c6s46_model.b");
        std::fs::write(&path, [0u8, 1, 0x0E, 0x41, 0x01, 0x23, 0xFF]).unwrap();
        let img = load_raw_bin(&path, 0x100, 2, Some(4)).unwrap();
        assert_eq!(img.segments.len(), 1);
        let s = &img.segments[0];
        assert_eq!(s.base, 0x100);
        assert_eq!(s.bytes, vec![0x0E, 0x41, 0x01, 0x23]);
        assert_eq!(read_word(&img, 0x101), Some([0x01, 0x23]));
        assert!(read_word(&img, 0x102).is_none());
        assert_eq!(img.words(), 0x100..0x102);
        assert!(load_raw_bin(&path, 0, 6, None).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn clamp_cuts_at_rom_end() {
        let seg = Segment { name: "rom".into(), base: 0x0FE, bytes: vec![0; 8], perms: "r-x", kind: "raw" };
        let mut img = Image { segments: vec![seg] };
        assert_eq!(clamp_words(&mut img, 0x100), 4);
        assert_eq!(img.words(), 0x0FE..0x100);
        assert_eq!(clamp_words(&mut img, 0x100), 0);
        assert_eq!(clamp_words(&mut img, 0x10), 4);
        assert!(img.segments.is_empty());
    }
}
