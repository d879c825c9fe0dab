//! *Notebooks in, lecture notes out.*
//!
//! This crate turns Jupyter notebooks into LaTeX documents of the format used for our lecture notes,
//! and (optionally) into PDFs with `xelatex`.
//! Markdown is generally less descriptive than (la)tex, so cells can carry some metadata
//! (`pretex`, `notoc`, `img_width`, `lang`, `scale`) and markdown can contain some custom inline tags
//! (`<footnote text="..."/>`, `<hfill/>`, `<bigskip/>`, `<noindent/>`) to account for that.
//!
//! # Pipeline
//! - [`notebook`] reads the `.ipynb` file.
//! - [`lexer`] turns the markdown of every cell into a flat list of [`data::Token`]s.
//! - [`gen::latex`] writes these tokens as LaTeX. Tables are the only place where output can't be written right away:
//! column specification goes before the header, but is only known after it. So header is written aside and spliced in once it's over.
//! Footnotes are parsed and written recursively, with a state of their own.
//! - [`gen::document`] writes the whole document: fixed preamble, cells, their outputs.
//! Error tracebacks go through [`ansi`] first, images through [`assets`].
//! - [`build`] runs the compiler in a temporary (or cached) directory and copies the PDF out.
//!
//! Everything is written through [`std::fmt::Write`], so the document can go into a `String`, or anything else.
//!
//! ### Async
//! There is none. Conversion is a single pass over the notebook, waiting is only ever done on external programs.

use std::path::Path;

pub mod ansi;
pub mod assets;
pub mod build;
pub mod config;
/// This module defines types that are used to represent parsed data
pub mod data;
pub mod gen;
pub mod lexer;
pub mod notebook;

/// Reexports
pub use build::{convert, convert_with, output_path, BuildError, BuildOutcome, Compiler};
pub use config::{Options, RenderOptions, UnknownTokens};
pub use gen::GenerationError;
pub use notebook::Notebook;

use assets::{AssetEngine, Rasterizer};
use gen::document::Assembler;

pub fn lex(input: &str) -> Vec<data::Token<'_>> {
    lexer::lex(input)
}

/// Generates LaTeX document for the `notebook`
///
/// Images are looked up in `source_dir` and placed into `build_dir`, the directory the document is to be compiled in.
pub fn assemble<R: Rasterizer>(
    notebook: &Notebook,
    source_dir: &Path,
    build_dir: &Path,
    rasterizer: R,
    options: &RenderOptions,
) -> Result<String, GenerationError> {
    let assets = AssetEngine::new(source_dir, build_dir, rasterizer);
    let mut buf = String::new();
    Assembler::new(&assets, options).write_document(&mut buf, notebook)?;
    Ok(buf)
}
