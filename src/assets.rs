use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use base64::Engine as _;
use image::ImageFormat;

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum AssetError {
    #[error("{}", .0)]
    Io(io::Error),
    #[error("Embedded image is not valid base64: {}", .0)]
    Base64(base64::DecodeError),
    #[error("Embedded image could not be converted: {}", .0)]
    Image(image::ImageError),
}

/// Converts vector images into something the compiler can include
pub trait Rasterizer {
    fn rasterize(&self, source: &Path, target: &Path) -> io::Result<()>;
}

/// `rsvg-convert`, producing PDF
#[derive(Debug, Clone)]
pub struct RsvgConvert {
    command: String,
}

impl RsvgConvert {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for RsvgConvert {
    fn default() -> Self {
        Self::new("rsvg-convert")
    }
}

impl Rasterizer for RsvgConvert {
    fn rasterize(&self, source: &Path, target: &Path) -> io::Result<()> {
        let status = Command::new(&self.command)
            .arg(source)
            .args(["-f", "pdf", "-o"])
            .arg(target)
            .stdout(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {status}", self.command),
            ))
        }
    }
}

impl<R: Rasterizer + ?Sized> Rasterizer for &R {
    fn rasterize(&self, source: &Path, target: &Path) -> io::Result<()> {
        (**self).rasterize(source, target)
    }
}

/// Places images into the build directory
///
/// Materialized files are reused for as long as they are newer than their sources,
/// so a cached build directory only converts what has changed.
#[derive(Debug)]
pub struct AssetEngine<R> {
    source_dir: PathBuf,
    build_dir: PathBuf,
    rasterizer: R,
}

fn is_vector(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

/// Whether `target` exists and was modified no earlier than `source`
fn is_fresh(source: &Path, target: &Path) -> bool {
    let Ok(target) = fs::metadata(target).and_then(|meta| meta.modified()) else {
        return false;
    };
    match fs::metadata(source).and_then(|meta| meta.modified()) {
        Ok(source) => target >= source,
        // source is gone, whatever was materialized is all there is
        Err(_) => true,
    }
}

#[cfg(unix)]
fn link(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn link(original: &Path, link: &Path) -> io::Result<()> {
    fs::hard_link(original, link).or_else(|_| fs::copy(original, link).map(|_| ()))
}

impl<R: Rasterizer> AssetEngine<R> {
    pub fn new(source_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>, rasterizer: R) -> Self {
        Self {
            source_dir: source_dir.into(),
            build_dir: build_dir.into(),
            rasterizer,
        }
    }

    /// Makes the image at `src` (relative to the source directory) available in the build directory
    ///
    /// Returns the reference to use in the document, relative to the build directory.
    /// Vector images are rasterized to PDF, everything else is linked to the original.
    /// A failing rasterizer is not an error here: the missing file is reported by the compiler.
    pub fn ensure_asset(&self, src: &Path) -> Result<PathBuf, AssetError> {
        let source = self.source_dir.join(src);
        let reference = if is_vector(src) {
            src.with_extension("pdf")
        } else {
            src.to_path_buf()
        };
        let target = self.build_dir.join(&reference);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_fresh(&source, &target) {
            tracing::trace!(asset = %reference.display(), "asset is up to date");
            return Ok(self.relative(&target, reference));
        }

        if is_vector(src) {
            if let Err(err) = self.rasterizer.rasterize(&source, &target) {
                tracing::debug!(source = %source.display(), "could not rasterize: {err}");
            }
        } else {
            // dangling or stale link
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target)?;
            }
            let original = fs::canonicalize(&source).unwrap_or(source);
            if let Err(err) = link(&original, &target) {
                tracing::warn!(source = %original.display(), "could not link asset: {err}");
            }
        }
        Ok(self.relative(&target, reference))
    }

    fn relative(&self, target: &Path, fallback: PathBuf) -> PathBuf {
        pathdiff::diff_paths(target, &self.build_dir).unwrap_or(fallback)
    }

    /// Rasterizes a fixed vector asset (not relative to the source directory) into `reference`, unless done already
    pub fn ensure_converted(&self, source: &Path, reference: &Path) -> Result<PathBuf, AssetError> {
        let target = self.build_dir.join(reference);
        if !target.exists() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if let Err(err) = self.rasterizer.rasterize(source, &target) {
                tracing::debug!(source = %source.display(), "could not rasterize: {err}");
            }
        }
        Ok(reference.to_path_buf())
    }

    /// Writes base64-encoded raster image into the build directory, as grayscale JPEG
    ///
    /// The name is derived from the encoded payload, so unchanged outputs land on the same file
    /// and are not decoded again.
    pub fn materialize_embedded(&self, encoded: &str) -> Result<PathBuf, AssetError> {
        let digest = sha1_smol::Sha1::from(encoded.as_bytes()).digest().to_string();
        let reference = PathBuf::from("img").join(format!("{digest}.jpg"));
        let target = self.build_dir.join(&reference);
        if target.exists() {
            return Ok(reference);
        }

        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let image = image::load_from_memory(&bytes)?;
        let gray = image::DynamicImage::ImageLuma8(image.to_luma8());

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut jpeg = Cursor::new(Vec::new());
        gray.write_to(&mut jpeg, ImageFormat::Jpeg)?;
        fs::write(&target, jpeg.into_inner())?;
        Ok(reference)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::Cell, time::Duration};

    use super::*;

    /// Writes a stub PDF and counts invocations
    #[derive(Debug, Default)]
    pub struct CountingRasterizer {
        pub calls: Cell<usize>,
    }

    impl Rasterizer for CountingRasterizer {
        fn rasterize(&self, _source: &Path, target: &Path) -> io::Result<()> {
            self.calls.set(self.calls.get() + 1);
            fs::write(target, b"%PDF-1.4\n")
        }
    }

    /// Always fails, like a missing binary
    pub struct MissingRasterizer;

    impl Rasterizer for MissingRasterizer {
        fn rasterize(&self, _source: &Path, _target: &Path) -> io::Result<()> {
            Err(io::ErrorKind::NotFound.into())
        }
    }

    // 1x1 RGBA PNG
    pub const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn dirs() -> (tempfile::TempDir, tempfile::TempDir) {
        (
            tempfile::tempdir().expect("Should be able to create source dir"),
            tempfile::tempdir().expect("Should be able to create build dir"),
        )
    }

    #[test]
    fn vector_is_rasterized_once() {
        // arrange
        let (source, build) = dirs();
        fs::create_dir(source.path().join("img")).unwrap();
        fs::write(source.path().join("img/plot.svg"), "<svg/>").unwrap();
        let rasterizer = CountingRasterizer::default();
        let engine = AssetEngine::new(source.path(), build.path(), &rasterizer);

        // act
        let first = engine.ensure_asset(Path::new("img/plot.svg")).unwrap();
        let second = engine.ensure_asset(Path::new("img/plot.svg")).unwrap();

        // assert
        assert_eq!(first, PathBuf::from("img/plot.pdf"));
        assert_eq!(first, second);
        assert_eq!(rasterizer.calls.get(), 1);
        assert!(build.path().join("img/plot.pdf").is_file());
    }

    #[test]
    fn stale_vector_is_rasterized_again() {
        // arrange
        let (source, build) = dirs();
        let svg = source.path().join("plot.svg");
        fs::write(&svg, "<svg/>").unwrap();
        let rasterizer = CountingRasterizer::default();
        let engine = AssetEngine::new(source.path(), build.path(), &rasterizer);
        engine.ensure_asset(Path::new("plot.svg")).unwrap();

        // act
        let later = fs::metadata(build.path().join("plot.pdf"))
            .unwrap()
            .modified()
            .unwrap()
            + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&svg)
            .unwrap()
            .set_modified(later)
            .unwrap();
        engine.ensure_asset(Path::new("plot.svg")).unwrap();

        // assert
        assert_eq!(rasterizer.calls.get(), 2);
    }

    #[test]
    fn raster_is_linked() {
        // arrange
        let (source, build) = dirs();
        fs::write(source.path().join("photo.png"), b"not really a png").unwrap();
        let rasterizer = CountingRasterizer::default();
        let engine = AssetEngine::new(source.path(), build.path(), &rasterizer);

        // act
        let reference = engine.ensure_asset(Path::new("photo.png")).unwrap();
        let again = engine.ensure_asset(Path::new("photo.png")).unwrap();

        // assert
        assert_eq!(reference, PathBuf::from("photo.png"));
        assert_eq!(again, reference);
        assert_eq!(rasterizer.calls.get(), 0);
        assert_eq!(
            fs::read(build.path().join("photo.png")).unwrap(),
            b"not really a png"
        );
        #[cfg(unix)]
        assert!(fs::symlink_metadata(build.path().join("photo.png"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[test]
    fn failing_rasterizer_is_not_an_error() {
        // arrange
        let (source, build) = dirs();
        fs::write(source.path().join("plot.svg"), "<svg/>").unwrap();
        let engine = AssetEngine::new(source.path(), build.path(), MissingRasterizer);

        // act
        let reference = engine.ensure_asset(Path::new("plot.svg"));

        // assert
        assert_eq!(reference.unwrap(), PathBuf::from("plot.pdf"));
        assert!(!build.path().join("plot.pdf").exists());
    }

    #[test]
    fn embedded_image_is_named_by_content() {
        // arrange
        let (source, build) = dirs();
        let engine = AssetEngine::new(source.path(), build.path(), MissingRasterizer);

        // act
        let first = engine.materialize_embedded(PIXEL_PNG).unwrap();
        let second = engine.materialize_embedded(PIXEL_PNG).unwrap();

        // assert
        let digest = sha1_smol::Sha1::from(PIXEL_PNG).digest().to_string();
        assert_eq!(first, PathBuf::from(format!("img/{digest}.jpg")));
        assert_eq!(first, second);
        let written = image::open(build.path().join(&first)).unwrap();
        assert_eq!(written.color(), image::ColorType::L8);
    }

    #[test]
    fn embedded_garbage_is_an_error() {
        let (source, build) = dirs();
        let engine = AssetEngine::new(source.path(), build.path(), MissingRasterizer);
        assert!(matches!(
            engine.materialize_embedded("!!not base64!!"),
            Err(AssetError::Base64(_))
        ));
        assert!(matches!(
            engine.materialize_embedded("aGVsbG8="),
            Err(AssetError::Image(_))
        ));
    }
}
