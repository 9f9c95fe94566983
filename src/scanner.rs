use crate::error::{InfotextError, Result};
use crate::params::ImageInfo;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// PNG file signature (first 8 bytes of any valid PNG)
const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const PNG_READER_CAPACITY: usize = 128 * 1024;

/// Reads the text chunks and IHDR size of a PNG file.
///
/// Pixel data (IDAT chunks) is never decoded; only chunk headers and text
/// metadata are read.
pub fn read_image_info(path: &Path) -> Result<ImageInfo> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(PNG_READER_CAPACITY, file);
    read_image_info_from(&mut reader).map_err(|error| match error {
        InfotextError::NotPng(_) => InfotextError::NotPng(path.display().to_string()),
        other => other,
    })
}

/// Same as [`read_image_info`] for any seekable byte source.
pub fn read_image_info_from<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let mut info = ImageInfo::default();

    let mut sig = [0u8; 8];
    reader.read_exact(&mut sig)?;
    if sig != PNG_SIGNATURE {
        return Err(InfotextError::NotPng("bad signature".to_string()));
    }

    loop {
        // Read chunk length (4 bytes, big-endian)
        let length = match reader.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(_) => break, // EOF
        };

        let mut chunk_type = [0u8; 4];
        if reader.read_exact(&mut chunk_type).is_err() {
            break;
        }

        match &chunk_type {
            b"IHDR" => {
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data)?;
                reader.seek(SeekFrom::Current(4))?; // Skip CRC
                if let Some((width, height)) = parse_ihdr_size(&data) {
                    info.width = Some(width);
                    info.height = Some(height);
                }
            }
            b"tEXt" | b"zTXt" | b"iTXt" => {
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data)?;
                reader.seek(SeekFrom::Current(4))?; // Skip CRC

                match decode_text_chunk(&chunk_type, &data) {
                    Some((key, value)) => {
                        info.text.insert(key, value);
                    }
                    None => log::debug!(
                        "Skipping undecodable {} chunk",
                        String::from_utf8_lossy(&chunk_type)
                    ),
                }
            }
            b"IEND" => {
                break; // End of PNG
            }
            _ => {
                // Skip chunk data + CRC (4 bytes)
                reader.seek(SeekFrom::Current(length as i64 + 4))?;
            }
        }
    }

    Ok(info)
}

fn parse_ihdr_size(data: &[u8]) -> Option<(u32, u32)> {
    let mut cursor = data.get(..8)?;
    let width = cursor.read_u32::<BigEndian>().ok()?;
    let height = cursor.read_u32::<BigEndian>().ok()?;
    Some((width, height))
}

/// Decodes a `tEXt`, `zTXt` or `iTXt` body into its keyword and text.
fn decode_text_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Option<(String, String)> {
    let (keyword, body) = split_at_nul(data)?;
    let keyword = std::str::from_utf8(keyword).ok()?.to_string();

    let text = match chunk_type {
        // tEXt is Latin-1; WebUI writes UTF-8 anyway, so try that first.
        b"tEXt" => String::from_utf8(body.to_vec())
            .unwrap_or_else(|_| body.iter().map(|&b| b as char).collect()),
        b"zTXt" => {
            let (&method, payload) = body.split_first()?;
            if method != 0 {
                return None;
            }
            // Some writers put a stray NUL before the zlib stream.
            inflate(payload.strip_prefix(&[0u8]).unwrap_or(payload))?
        }
        b"iTXt" => {
            let [flag, method, rest @ ..] = body else {
                return None;
            };
            let (_language, rest) = split_at_nul(rest)?;
            let (_translated_keyword, payload) = split_at_nul(rest)?;
            match (*flag, *method) {
                (0, _) => String::from_utf8(payload.to_vec()).ok()?,
                (1, 0) => inflate(payload)?,
                _ => return None,
            }
        }
        _ => return None,
    };
    Some((keyword, text))
}

fn split_at_nul(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let nul = data.iter().position(|&b| b == 0)?;
    Some((&data[..nul], &data[nul + 1..]))
}

fn inflate(data: &[u8]) -> Option<String> {
    let mut text = String::new();
    ZlibDecoder::new(data).read_to_string(&mut text).ok()?;
    Some(text)
}

/// Recursively collects PNG files under `dir`, sorted by path.
pub fn scan_png_files(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .max_open(32)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                log::warn!("Skipping unreadable entry under {}: {}", dir.display(), error);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_png_path(path))
        .collect();
    paths.sort();
    paths
}

pub fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RawSource;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::{Cursor, Write};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn build_chunk(chunk_type: [u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&0u32.to_be_bytes()); // CRC ignored by parser
        out
    }

    fn build_test_png(width: u32, height: u32, text_chunks: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();

        let mut ihdr_data = Vec::new();
        ihdr_data.extend_from_slice(&width.to_be_bytes());
        ihdr_data.extend_from_slice(&height.to_be_bytes());
        ihdr_data.extend_from_slice(&[
            8, // bit depth
            2, // color type (RGB)
            0, // compression method
            0, // filter method
            0, // interlace method
        ]);
        bytes.extend_from_slice(&build_chunk(*b"IHDR", &ihdr_data));

        for (chunk_type, chunk_data) in text_chunks {
            bytes.extend_from_slice(&build_chunk(chunk_type, &chunk_data));
        }

        bytes.extend_from_slice(&build_chunk(*b"IEND", &[]));
        bytes
    }

    fn text_chunk(key: &str, value: &str) -> ([u8; 4], Vec<u8>) {
        let mut data = key.as_bytes().to_vec();
        data.push(0);
        data.extend_from_slice(value.as_bytes());
        (*b"tEXt", data)
    }

    fn zlib(payload: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(payload)
            .expect("failed to write zlib payload");
        encoder.finish().expect("failed to finish zlib payload")
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "sd_infotext_scanner_{}_{}_{}",
            tag,
            std::process::id(),
            timestamp
        ));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn test_reads_size_and_all_text_chunk_types() {
        let mut ztxt_data = b"comment\0".to_vec();
        ztxt_data.push(0);
        ztxt_data.extend_from_slice(&zlib(b"from ztxt"));

        let mut itxt_data = b"description\0".to_vec();
        itxt_data.extend_from_slice(&[1, 0, 0, 0]);
        itxt_data.extend_from_slice(&zlib(b"from itxt"));

        let png = build_test_png(
            640,
            384,
            vec![
                text_chunk("parameters", "from text"),
                (*b"zTXt", ztxt_data),
                (*b"iTXt", itxt_data),
            ],
        );

        let info = read_image_info_from(&mut Cursor::new(png)).expect("chunk extraction failed");
        assert_eq!(info.width, Some(640));
        assert_eq!(info.height, Some(384));
        assert_eq!(info.get("parameters"), Some("from text"));
        assert_eq!(info.get("comment"), Some("from ztxt"));
        assert_eq!(info.get("description"), Some("from itxt"));
    }

    #[test]
    fn test_decode_text_chunk_variants() {
        let mut ztxt = b"k\0\0\0".to_vec();
        ztxt.extend_from_slice(&zlib(b"stray nul"));
        assert_eq!(
            decode_text_chunk(b"zTXt", &ztxt),
            Some(("k".to_string(), "stray nul".to_string()))
        );

        let itxt = b"k\0\0\0en\0\0plain itxt".to_vec();
        assert_eq!(
            decode_text_chunk(b"iTXt", &itxt),
            Some(("k".to_string(), "plain itxt".to_string()))
        );

        assert_eq!(
            decode_text_chunk(b"tEXt", b"k\0caf\xe9"),
            Some(("k".to_string(), "caf\u{e9}".to_string()))
        );

        assert_eq!(decode_text_chunk(b"iTXt", b"k\0\x02\0\0\0x"), None);
        assert_eq!(decode_text_chunk(b"zTXt", b"k\0\x01data"), None);
        assert_eq!(decode_text_chunk(b"tEXt", b"no separator"), None);
    }

    #[test]
    fn test_rejects_non_png_bytes() {
        let error = read_image_info_from(&mut Cursor::new(b"GIF89a..........".to_vec()))
            .expect_err("gif should be rejected");
        assert!(matches!(error, InfotextError::NotPng(_)));
    }

    #[test]
    fn test_novelai_chunks_become_novelai_source() {
        let png = build_test_png(
            1024,
            1024,
            vec![
                text_chunk("Software", "NovelAI"),
                text_chunk("Description", "cinematic portrait of a hero"),
                text_chunk(
                    "Comment",
                    r#"{"uc":"low quality","steps":28,"sampler":"k_euler","scale":6.5,"seed":1234}"#,
                ),
            ],
        );

        let info = read_image_info_from(&mut Cursor::new(png)).expect("chunk extraction failed");
        match RawSource::from_image_info(&info) {
            RawSource::NovelAiComment {
                description,
                width,
                height,
                ..
            } => {
                assert_eq!(description, "cinematic portrait of a hero");
                assert_eq!((width, height), (Some(1024), Some(1024)));
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_read_image_info_from_file_and_scan() {
        let dir = temp_dir("scan");
        let nested = dir.join("nested");
        fs::create_dir_all(&nested).expect("failed to create nested dir");

        let png = build_test_png(
            512,
            512,
            vec![text_chunk("parameters", "a cat\nSteps: 20, Sampler: Euler, Seed: 1")],
        );
        fs::write(dir.join("b.png"), &png).expect("failed to write png");
        fs::write(nested.join("a.PNG"), &png).expect("failed to write png");
        fs::write(dir.join("notes.txt"), b"not an image").expect("failed to write txt");

        let found = scan_png_files(&dir);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|path| is_png_path(path)));

        let info = read_image_info(&dir.join("b.png")).expect("failed to read png");
        assert_eq!(
            info.get("parameters"),
            Some("a cat\nSteps: 20, Sampler: Euler, Seed: 1")
        );

        let error = read_image_info(&dir.join("notes.txt")).expect_err("txt is not a png");
        assert!(matches!(error, InfotextError::NotPng(_)));

        let _ = fs::remove_dir_all(dir);
    }
}
