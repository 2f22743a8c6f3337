//! Minimal `.npy` reader/writer for 2-D little-endian `f32` arrays.

use anyhow::{bail, Context};
use inference::PredictionArray;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

fn header_text(rows: usize, cols: usize) -> Vec<u8> {
    let dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    // magic + version + u16 length, then the dict padded with spaces and a newline
    let prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + dict.len() + 1;
    let total = unpadded.div_ceil(ALIGN) * ALIGN;
    let mut text = dict.into_bytes();
    text.resize(total - prefix - 1, b' ');
    text.push(b'\n');
    text
}

pub fn write_npy(path: &Path, array: &PredictionArray) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    let header = header_text(array.rows, array.cols);
    let header_len = u16::try_from(header.len()).context("npy header too long")?;
    w.write_all(MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_all(&header_len.to_le_bytes())?;
    w.write_all(&header)?;
    for v in &array.data {
        w.write_all(&v.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let start = dict.find(&format!("'{key}':"))? + key.len() + 3;
    let rest = dict[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',')?
    };
    Some(rest[..end].trim())
}

fn parse_shape(text: &str) -> anyhow::Result<(usize, usize)> {
    let inner = text.trim_start_matches('(').trim_end_matches(')');
    let dims: Vec<usize> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("bad npy shape {text}"))?;
    match dims.as_slice() {
        [rows] => Ok((*rows, 1)),
        [rows, cols] => Ok((*rows, *cols)),
        _ => bail!("expected a 1-D or 2-D array, got shape {text}"),
    }
}

pub fn read_npy(path: &Path) -> anyhow::Result<PredictionArray> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut r = BufReader::new(file);
    let mut magic = [0u8; 6];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        bail!("{} is not an npy file", path.display());
    }
    let mut version = [0u8; 2];
    r.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut b = [0u8; 2];
            r.read_exact(&mut b)?;
            u16::from_le_bytes(b) as usize
        }
        2 | 3 => {
            let mut b = [0u8; 4];
            r.read_exact(&mut b)?;
            u32::from_le_bytes(b) as usize
        }
        v => bail!("unsupported npy version {v} in {}", path.display()),
    };
    let mut header = vec![0u8; header_len];
    r.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);

    let descr = dict_value(&header, "descr").context("npy header without descr")?;
    if descr.trim_matches('\'') != "<f4" {
        bail!("{}: only little-endian f32 arrays are supported, got {descr}", path.display());
    }
    if dict_value(&header, "fortran_order") != Some("False") {
        bail!("{}: fortran-ordered arrays are not supported", path.display());
    }
    let (rows, cols) = parse_shape(dict_value(&header, "shape").context("npy header without shape")?)?;

    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    if bytes.len() != rows * cols * 4 {
        bail!(
            "{}: expected {} data bytes for shape ({rows}, {cols}), found {}",
            path.display(),
            rows * cols * 4,
            bytes.len()
        );
    }
    let data = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(PredictionArray::new(rows, cols, data)?)
}
