//! Turning the generated document into a PDF: build directory, branding asset, compiler call.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tempfile::TempDir;

use crate::{
    assets::{AssetEngine, AssetError, Rasterizer, RsvgConvert},
    config::Options,
    gen::{document::Assembler, latex::template, GenerationError},
    notebook::{Notebook, NotebookError},
};

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum BuildError {
    #[error("{}", .0)]
    Notebook(NotebookError),
    #[error("Could not generate document: {}", .0)]
    Generation(GenerationError),
    #[error("{}", .0)]
    Asset(AssetError),
    #[error("Build directory problem: {}", .0)]
    Io(io::Error),
}

/// Result of a conversion that got as far as the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(PathBuf),
    Failed { diagnostics: String },
}

impl BuildOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, BuildOutcome::Built(_))
    }
}

/// Directory the document is compiled in
#[derive(Debug)]
pub enum BuildDir {
    /// Removed once dropped
    Temporary(TempDir),
    /// Kept between runs
    Cached(PathBuf),
}

impl BuildDir {
    /// Prepares a build directory for the notebook at `notebook`
    ///
    /// Cached directories are named after the notebook path, so that each notebook has its own.
    pub fn prepare(notebook: &Path, options: &Options) -> io::Result<Self> {
        if options.use_cache {
            let path = options.cache_root.join(cache_name(notebook));
            fs::create_dir_all(&path)?;
            tracing::debug!(dir = %path.display(), "Building in cache");
            Ok(BuildDir::Cached(path))
        } else {
            let dir = tempfile::Builder::new().prefix("nbtex").tempdir()?;
            tracing::debug!(dir = %dir.path().display(), "Building in temporary directory");
            Ok(BuildDir::Temporary(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            BuildDir::Temporary(dir) => dir.path(),
            BuildDir::Cached(path) => path,
        }
    }
}

fn cache_name(notebook: &Path) -> String {
    notebook
        .to_string_lossy()
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}

/// Typesetting program
pub trait Compiler {
    /// Compiles `<jobname>.tex` inside `dir`, producing `<jobname>.pdf` there
    ///
    /// `Ok(Some(diagnostics))` means the compiler ran, but failed.
    fn compile(&self, dir: &Path, jobname: &str, interactive: bool) -> io::Result<Option<String>>;
}

impl<C: Compiler + ?Sized> Compiler for &C {
    fn compile(&self, dir: &Path, jobname: &str, interactive: bool) -> io::Result<Option<String>> {
        (**self).compile(dir, jobname, interactive)
    }
}

/// `xelatex`, or anything taking the same arguments
#[derive(Debug, Clone)]
pub struct Xelatex {
    command: String,
}

impl Xelatex {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Compiler for Xelatex {
    fn compile(&self, dir: &Path, jobname: &str, interactive: bool) -> io::Result<Option<String>> {
        let mut command = Command::new(&self.command);
        // minted calls pygments
        command.current_dir(dir).arg("-shell-escape");
        if interactive {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            command
                .args(["-interaction", "nonstopmode"])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        command.arg(format!("{jobname}.tex"));
        tracing::debug!(?command, "Running compiler");

        let output = command.output()?;
        if output.status.success() {
            Ok(None)
        } else {
            Ok(Some(diagnostics(&output.stdout, &output.stderr)))
        }
    }
}

/// Captured compiler log, stderr after stdout
fn diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Converts the notebook at `notebook` into a PDF at `destination` with the external tools named in `options`
pub fn convert(
    notebook: &Path,
    destination: &Path,
    options: &Options,
) -> Result<BuildOutcome, BuildError> {
    convert_with(
        notebook,
        destination,
        options,
        RsvgConvert::new(options.rasterizer_command.as_str()),
        &Xelatex::new(options.latex_command.as_str()),
    )
}

/// Same as [`convert`], with the collaborator programs given explicitly
pub fn convert_with<R: Rasterizer, C: Compiler>(
    notebook: &Path,
    destination: &Path,
    options: &Options,
    rasterizer: R,
    compiler: &C,
) -> Result<BuildOutcome, BuildError> {
    let parsed = Notebook::open(notebook)?;
    let source_dir = notebook
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let build = BuildDir::prepare(notebook, options)?;
    let assets = AssetEngine::new(source_dir, build.path(), rasterizer);

    if let Some(branding) = &options.branding {
        assets.ensure_converted(branding, Path::new(template::BRANDING_REFERENCE))?;
    }

    let mut document = String::new();
    Assembler::new(&assets, &options.render).write_document(&mut document, &parsed)?;
    fs::write(
        build.path().join(format!("{}.tex", options.jobname)),
        document,
    )?;

    if let Some(diagnostics) = compiler.compile(build.path(), &options.jobname, options.interactive)? {
        tracing::error!("Compiler failed:\n{diagnostics}");
        return Ok(BuildOutcome::Failed { diagnostics });
    }

    // TODO: second compiler pass, so that cross references resolve
    fs::copy(
        build.path().join(format!("{}.pdf", options.jobname)),
        destination,
    )?;
    Ok(BuildOutcome::Built(destination.to_path_buf()))
}

/// Where the PDF for `notebook` goes, given the `-o` argument
///
/// - no argument: `<stem>.pdf` in the working directory
/// - an existing directory: `<stem>.pdf` inside it
/// - a path that doesn't exist and doesn't end in `.pdf`: a directory, created here
/// - anything else: the file itself
pub fn output_path(notebook: &Path, requested: Option<&Path>) -> io::Result<PathBuf> {
    let file_name = PathBuf::from(notebook.file_stem().unwrap_or(notebook.as_os_str()))
        .with_extension("pdf");
    let Some(requested) = requested else {
        return Ok(file_name);
    };
    if requested.is_dir() {
        return Ok(requested.join(file_name));
    }
    let is_pdf = requested
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !requested.exists() && !is_pdf {
        fs::create_dir_all(requested)?;
        return Ok(requested.join(file_name));
    }
    Ok(requested.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::assets::tests::CountingRasterizer;

    use super::*;

    /// Records the jobs it's given, and writes a stub PDF unless told to fail
    #[derive(Default)]
    struct FakeCompiler {
        fail: Option<&'static str>,
        jobs: RefCell<Vec<(PathBuf, bool)>>,
    }

    impl Compiler for FakeCompiler {
        fn compile(&self, dir: &Path, jobname: &str, interactive: bool) -> io::Result<Option<String>> {
            assert!(dir.join(format!("{jobname}.tex")).exists());
            self.jobs.borrow_mut().push((dir.to_path_buf(), interactive));
            match self.fail {
                Some(diagnostics) => Ok(Some(diagnostics.to_owned())),
                None => fs::write(dir.join(format!("{jobname}.pdf")), b"%PDF-1.4\n").map(|_| None),
            }
        }
    }

    const NOTEBOOK: &str = r##"{
        "metadata": {"authors": [{"name": "Ana"}]},
        "cells": [
            {"cell_type": "markdown", "source": ["# Title\n"], "metadata": {}},
            {"cell_type": "code", "source": ["print(1)"], "metadata": {},
             "outputs": [{"output_type": "stream", "name": "stdout", "text": ["1\n"]}]}
        ]
    }"##;

    struct Workspace {
        dir: TempDir,
        notebook: PathBuf,
        options: Options,
    }

    fn workspace(use_cache: bool) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let notebook = dir.path().join("notes.ipynb");
        fs::write(&notebook, NOTEBOOK).unwrap();
        fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();
        let options = Options {
            use_cache,
            cache_root: dir.path().join("cache"),
            branding: Some(dir.path().join("logo.svg")),
            ..Options::default()
        };
        Workspace {
            dir,
            notebook,
            options,
        }
    }

    #[test]
    fn builds_to_destination() {
        // arrange
        let ws = workspace(false);
        let destination = ws.dir.path().join("notes.pdf");
        let compiler = FakeCompiler::default();
        let rasterizer = CountingRasterizer::default();

        // act
        let outcome =
            convert_with(&ws.notebook, &destination, &ws.options, &rasterizer, &compiler).unwrap();

        // assert
        assert_eq!(outcome, BuildOutcome::Built(destination.clone()));
        assert!(destination.exists());
        assert_eq!(rasterizer.calls.get(), 1);
        let jobs = compiler.jobs.borrow();
        assert_eq!(jobs.len(), 1);
        assert!(!jobs[0].1);
        // temporary directory is gone
        assert!(!jobs[0].0.exists());
    }

    #[test]
    fn failure_keeps_destination_untouched() {
        // arrange
        let ws = workspace(false);
        let destination = ws.dir.path().join("notes.pdf");
        let compiler = FakeCompiler {
            fail: Some("! Undefined control sequence."),
            ..FakeCompiler::default()
        };

        // act
        let outcome = convert_with(
            &ws.notebook,
            &destination,
            &ws.options,
            CountingRasterizer::default(),
            &compiler,
        )
        .unwrap();

        // assert
        assert_eq!(
            outcome,
            BuildOutcome::Failed {
                diagnostics: "! Undefined control sequence.".to_owned()
            }
        );
        assert!(!outcome.is_built());
        assert!(!destination.exists());
    }

    #[test]
    fn cache_is_reused() {
        // arrange
        let ws = workspace(true);
        let destination = ws.dir.path().join("notes.pdf");
        let compiler = FakeCompiler::default();
        let rasterizer = CountingRasterizer::default();

        // act
        for _ in 0..2 {
            let outcome =
                convert_with(&ws.notebook, &destination, &ws.options, &rasterizer, &compiler)
                    .unwrap();
            assert!(outcome.is_built());
        }

        // assert
        // branding is converted only once
        assert_eq!(rasterizer.calls.get(), 1);
        let jobs = compiler.jobs.borrow();
        assert_eq!(jobs[0].0, jobs[1].0);
        assert!(jobs[0].0.starts_with(ws.dir.path().join("cache")));
        let tex = fs::read_to_string(jobs[0].0.join("notebook.tex")).unwrap();
        assert!(tex.contains("pdftitle={Title}"));
        assert!(tex.contains("print(1)"));
        assert!(jobs[0].0.join(template::BRANDING_REFERENCE).exists());
    }

    #[test]
    fn missing_notebook() {
        let ws = workspace(false);
        let result = convert_with(
            &ws.dir.path().join("missing.ipynb"),
            &ws.dir.path().join("out.pdf"),
            &ws.options,
            CountingRasterizer::default(),
            &FakeCompiler::default(),
        );
        assert!(matches!(result, Err(BuildError::Notebook(NotebookError::Io(_)))));
    }

    #[test]
    fn diagnostics_include_stderr() {
        assert_eq!(diagnostics(b"! Error", b""), "! Error");
        assert_eq!(diagnostics(b"! Error", b"fatal\n"), "! Error\nfatal\n");
        assert_eq!(diagnostics(b"", b"fatal"), "fatal");
    }

    #[test]
    fn cache_names() {
        assert_eq!(cache_name(Path::new("notes.ipynb")), "notes.ipynb");
        assert_eq!(cache_name(Path::new("t1/notes.ipynb")), "t1_notes.ipynb");
    }

    #[test]
    fn output_paths() {
        // arrange
        let dir = tempfile::tempdir().unwrap();
        let notebook = Path::new("lectures/sets.ipynb");
        let fresh = dir.path().join("out");
        let file = dir.path().join("custom.pdf");

        // act, assert
        assert_eq!(output_path(notebook, None).unwrap(), PathBuf::from("sets.pdf"));
        assert_eq!(
            output_path(notebook, Some(dir.path())).unwrap(),
            dir.path().join("sets.pdf")
        );
        assert_eq!(output_path(notebook, Some(&fresh)).unwrap(), fresh.join("sets.pdf"));
        assert!(fresh.is_dir());
        assert_eq!(output_path(notebook, Some(&file)).unwrap(), file);
        assert!(!file.exists());
    }
}
