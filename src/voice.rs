//! Voice packs — per-voice style-embedding matrices in NumPy format.
//!
//! A voice pack is a float32 array of shape `[rows, …, dim]` (trailing
//! dimensions are flattened into one): row `i` is the style vector the
//! model conditions on when the input is `i` tokens long.  The hub serves
//! either one `.npy` file per voice or a single NPZ archive with one array
//! per voice (an NPZ file is a ZIP archive whose members are `.npy` files).
//!
//! Only the subset of the NPY format actually used by voice packs is
//! supported: versions 1.0 / 2.0, float32, C-contiguous layout.

use std::{collections::HashMap, io::Read, path::Path};

use anyhow::{bail, Context, Result};
use zip::ZipArchive;

// ─────────────────────────────────────────────────────────────────────────────
// VoicePack
// ─────────────────────────────────────────────────────────────────────────────

/// A loaded voice: a flat row-major style matrix.
pub struct VoicePack {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl VoicePack {
    /// Parse a raw `.npy` byte buffer into a voice pack.
    pub fn from_npy(bytes: &[u8]) -> Result<Self> {
        let (shape, data) = parse_npy(bytes)?;
        let rows = shape.first().copied().unwrap_or(0);
        // Kokoro packs are shipped as [rows, 1, dim]; collapse the middle.
        let dim: usize = shape.iter().skip(1).product::<usize>().max(1);
        if rows == 0 || data.len() != rows * dim {
            bail!("Voice pack has invalid shape {:?}", shape);
        }
        Ok(Self { rows, dim, data })
    }

    /// Read and parse a `.npy` file.
    pub fn from_npy_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read voice pack: {}", path.display()))?;
        Self::from_npy(&bytes).with_context(|| format!("Bad voice pack: {}", path.display()))
    }

    /// Style dimension of this voice.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Style vector for an input of `token_count` tokens, clamped to the
    /// matrix bounds.
    pub fn style_row(&self, token_count: usize) -> &[f32] {
        let i = token_count.min(self.rows - 1);
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

/// Load an NPZ archive holding one voice pack per member
/// (member name without `.npy` is the voice name).
pub fn load_voice_archive(path: &Path) -> Result<HashMap<String, VoicePack>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open voice archive: {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Not a ZIP archive: {}", path.display()))?;

    let mut voices = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("Failed to read ZIP entry")?;
        let name = entry.name().trim_end_matches(".npy").to_string();

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).context("Failed to read NPY entry")?;

        let pack = VoicePack::from_npy(&buf)
            .with_context(|| format!("Failed to parse voice '{}'", name))?;
        voices.insert(name, pack);
    }
    Ok(voices)
}

// ─────────────────────────────────────────────────────────────────────────────
// NPY header parser
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a raw `.npy` byte buffer: returns the shape and the flat f32 data.
fn parse_npy(data: &[u8]) -> Result<(Vec<usize>, Vec<f32>)> {
    // Magic: 6 bytes "\x93NUMPY"
    if data.len() < 10 || &data[..6] != b"\x93NUMPY" {
        bail!("Not a valid NPY file (bad magic)");
    }

    let major = data[6];
    let minor = data[7];

    // Header length: 2 bytes (v1) or 4 bytes (v2), little-endian.
    let (header_len, header_start) = match (major, minor) {
        (1, _) => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        (2, _) => {
            if data.len() < 12 {
                bail!("NPY v2 file too short");
            }
            let len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
            (len, 12)
        }
        _ => bail!("Unsupported NPY version {}.{}", major, minor),
    };

    let header_end = header_start + header_len;
    if data.len() < header_end {
        bail!("NPY file truncated in header");
    }
    let header = std::str::from_utf8(&data[header_start..header_end])
        .context("NPY header is not valid UTF-8")?;

    let dtype = header_field(header, "descr").context("NPY header missing 'descr'")?;
    let dtype = dtype.trim().trim_matches('\'').trim_matches('"');
    if !matches!(dtype, "<f4" | "=f4" | "|f4" | ">f4") {
        bail!("Unsupported dtype '{}' — only float32 is supported", dtype);
    }
    let big_endian = dtype.starts_with('>');

    let fortran = header_field(header, "fortran_order")
        .unwrap_or("False")
        .trim()
        .to_ascii_lowercase();
    if fortran == "true" {
        bail!("Fortran-order arrays are not supported");
    }

    let shape_str = header_field(header, "shape").context("NPY header missing 'shape'")?;
    let shape = parse_shape(shape_str.trim())?;
    let n_elements: usize = shape.iter().product();

    let data_bytes = &data[header_end..];
    if data_bytes.len() < n_elements * 4 {
        bail!(
            "NPY data section too short: expected {} bytes, got {}",
            n_elements * 4,
            data_bytes.len()
        );
    }

    let values: Vec<f32> = data_bytes[..n_elements * 4]
        .chunks_exact(4)
        .map(|b| {
            let arr = [b[0], b[1], b[2], b[3]];
            if big_endian {
                f32::from_be_bytes(arr)
            } else {
                f32::from_le_bytes(arr)
            }
        })
        .collect();

    Ok((shape, values))
}

/// Extract a field value from the Python-literal dict header string.
fn header_field<'a>(header: &'a str, field: &str) -> Option<&'a str> {
    let key_sq = format!("'{}':", field);
    let key_dq = format!("\"{}\":", field);

    let start = header
        .find(key_sq.as_str())
        .map(|p| p + key_sq.len())
        .or_else(|| header.find(key_dq.as_str()).map(|p| p + key_dq.len()))?;

    let rest = header[start..].trim_start();

    // Value is either a quoted string, a tuple, or a bare word.
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..end + 1])
    } else if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.chars().next()?;
        let inner = &rest[1..];
        let end = inner.find(quote)?;
        Some(&inner[..end])
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

/// Parse a Python-style shape tuple like `(511, 1, 256)` or `(100,)`.
fn parse_shape(s: &str) -> Result<Vec<usize>> {
    let inner = s.trim_start_matches('(').trim_end_matches(')');
    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    inner
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().with_context(|| format!("Bad shape dim: '{}'", t)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Build a minimal v1.0 NPY byte buffer.
    fn make_npy(shape: &[usize], values: &[f32]) -> Vec<u8> {
        let header_str = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
            shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        );
        // Total header block (magic + version + len + header) padded to 64,
        // terminated with \n.
        let raw_len = header_str.len() + 1;
        let padded_len = ((raw_len + 63) / 64) * 64;
        let mut header = header_str;
        for _ in 0..(padded_len - raw_len) {
            header.push(' ');
        }
        header.push('\n');

        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x93NUMPY");
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        for &v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_parse_npy_2d() {
        let values: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let (shape, data) = parse_npy(&make_npy(&[2, 3], &values)).unwrap();
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(data, values);
    }

    #[test]
    fn test_bad_magic() {
        assert!(parse_npy(b"NOTANPY").is_err());
    }

    #[test]
    fn test_voice_pack_rows() {
        let values: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let pack = VoicePack::from_npy(&make_npy(&[2, 3], &values)).unwrap();
        assert_eq!(pack.dim(), 3);
        assert_eq!(pack.style_row(0), &[0.0, 1.0, 2.0]);
        assert_eq!(pack.style_row(1), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_style_row_clamps() {
        let values: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let pack = VoicePack::from_npy(&make_npy(&[2, 3], &values)).unwrap();
        // Past-the-end token counts clamp to the last row.
        assert_eq!(pack.style_row(999), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_middle_dimension_collapses() {
        // Shipped shape [rows, 1, dim].
        let values: Vec<f32> = (0..8).map(|x| x as f32).collect();
        let pack = VoicePack::from_npy(&make_npy(&[2, 1, 4], &values)).unwrap();
        assert_eq!(pack.dim(), 4);
        assert_eq!(pack.style_row(1), &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_empty_pack_rejected() {
        assert!(VoicePack::from_npy(&make_npy(&[0, 3], &[])).is_err());
    }

    #[test]
    fn test_load_voice_archive() {
        let dir = std::env::temp_dir()
            .join(format!("kokorotts-voices-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("voices.npz");

        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for name in ["af.npy", "bm_george.npy"] {
            zip.start_file(name, options).unwrap();
            zip.write_all(&make_npy(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
                .unwrap();
        }
        zip.finish().unwrap();

        let voices = load_voice_archive(&path).unwrap();
        assert_eq!(voices.len(), 2);
        assert!(voices.contains_key("af"));
        assert_eq!(voices["bm_george"].style_row(0), &[0.0, 1.0, 2.0]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
