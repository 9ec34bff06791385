use std::{fs, io::{self, Write}, path::Path};

use log::debug;
use resvg::{tiny_skia, usvg};

use crate::error::{Error, Result};

/// SVG user units per inch of figure size.
pub const UNITS_PER_INCH: f64 = 100.0;

/// Streams an SVG document into any writer.
pub(crate) struct SvgWriter<W: Write> {
    writer: W,
}

/// Implement std::io::Write so `write!` / `writeln!` work.
impl<W: Write> Write for SvgWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.writer.write(buf) }

    fn flush(&mut self) -> io::Result<()> { self.writer.flush() }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> { self.writer.write_all(buf) }
}

impl SvgWriter<Vec<u8>> {
    /// Buffer the document in memory until it is complete.
    pub(crate) fn in_memory() -> Self { Self { writer: Vec::new() } }

    pub(crate) fn into_bytes(self) -> Vec<u8> { self.writer }
}

impl<W: Write> SvgWriter<W> {
    /// Write the XML declaration, opening <svg> tag and white background.
    pub(crate) fn write_header(&mut self, width: f64, height: f64) -> io::Result<()> {
        writeln!(self, r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#)?;
        writeln!(self, r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#)?;
        writeln!(self, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
        Ok(())
    }

    /// Shared text and frame styles.
    pub(crate) fn write_styles(&mut self) -> io::Result<()> {
        writeln!(self, r##"<defs>
<style>
    text {{ font-family: "DejaVu Sans", Arial, sans-serif; fill: #000000; }}
    .frame {{ fill: none; stroke: #000000; stroke-width: 1; }}
    .grid {{ fill: none; stroke: #808080; stroke-width: 0.8; stroke-opacity: 0.6; stroke-dasharray: 4 3; }}
</style>
</defs>"##)?;
        Ok(())
    }

    /// Write the closing </svg> tag.
    pub(crate) fn write_footer(&mut self) -> io::Result<()> {
        writeln!(self, "</svg>")
    }
}

/// Escape text for use inside SVG elements and attributes.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Output encoding, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageFormat { Png, Svg }

impl ImageFormat {
    pub(crate) fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("png") => Ok(ImageFormat::Png),
            Some("svg") => Ok(ImageFormat::Svg),
            other => Err(Error::Render {
                path: path.to_path_buf(),
                reason: format!("unsupported image extension {other:?}; use .png or .svg"),
            }),
        }
    }
}

/// Encode a finished SVG document and write it to `path`.
///
/// PNG output is rasterised at `dpi` (figure inches are [`UNITS_PER_INCH`] user units).
pub(crate) fn write_image(svg: &[u8], path: &Path, dpi: f64) -> Result<()> {
    let bytes = match ImageFormat::from_path(path)? {
        ImageFormat::Svg => svg.to_vec(),
        ImageFormat::Png => rasterize(svg, dpi / UNITS_PER_INCH)
            .map_err(|reason| Error::Render { path: path.to_path_buf(), reason })?,
    };
    write_atomic(&bytes, path)
}

/// Write `bytes` to a temporary file next to `path` and move it into place once complete.
///
/// Missing parent directories are created. A failure never leaves a partial file behind.
pub(crate) fn write_atomic(bytes: &[u8], path: &Path) -> Result<()> {
    let fail = |reason: String| Error::Render { path: path.to_path_buf(), reason };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| fail(format!("cannot create directory: {e}")))?;
    }

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    file.write_all(bytes).map_err(|e| fail(e.to_string()))?;
    file.flush().map_err(|e| fail(e.to_string()))?;
    file.persist(path).map_err(|e| fail(e.error.to_string()))?;

    debug!("[render] wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Render an SVG document to PNG bytes, scaling user units by `scale`.
fn rasterize(svg: &[u8], scale: f64) -> std::result::Result<Vec<u8>, String> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_data(svg, &options).map_err(|e| format!("invalid SVG: {e}"))?;

    let scale = scale as f32;
    let width = (tree.size().width() * scale).ceil() as u32;
    let height = (tree.size().height() * scale).ceil() as u32;
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| format!("cannot allocate {width}x{height} canvas"))?;

    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    pixmap.encode_png().map_err(|e| format!("PNG encoding failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("Shark & <Ray>"), "Shark &amp; &lt;Ray&gt;");
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ImageFormat::from_path(Path::new("out/map.PNG")).unwrap(), ImageFormat::Png);
        assert_eq!(ImageFormat::from_path(Path::new("map.svg")).unwrap(), ImageFormat::Svg);
        assert!(matches!(ImageFormat::from_path(Path::new("map.jpg")), Err(Error::Render { .. })));
    }

    #[test]
    fn writes_svg_and_png() {
        let mut writer = SvgWriter::in_memory();
        writer.write_header(40.0, 20.0).unwrap();
        writer.write_footer().unwrap();
        let svg = writer.into_bytes();

        let dir = tempfile::tempdir().unwrap();
        write_image(&svg, &dir.path().join("a.svg"), 100.0).unwrap();
        write_image(&svg, &dir.path().join("a.png"), 200.0).unwrap();

        assert!(fs::read_to_string(dir.path().join("a.svg")).unwrap().contains("<svg"));
        let png = fs::read(dir.path().join("a.png")).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/groups.csv");
        write_atomic(b"old", &path).unwrap();
        write_atomic(b"new", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
