//! Whole-document generation: fixed template parts, cells and their outputs, in order.

use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ansi,
    assets::{AssetEngine, Rasterizer},
    config::RenderOptions,
    notebook::{Cell, CellKind, Notebook, Output},
};

use super::{
    latex::{template, CellMeta, LatexWriter},
    Res,
};

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[ \t]+(.*\S)\s*$").expect("Title regex should be valid"));

/// Verbatim environment attributes shared by every output
const OUTPUT_FRAME: &str = "breaklines=true,frame=single";

/// Writes notebooks as complete LaTeX documents
#[derive(Debug)]
pub struct Assembler<'a, R> {
    assets: &'a AssetEngine<R>,
    options: &'a RenderOptions,
}

/// Title of the notebook, if its first cell starts with a top-level heading
pub fn title(notebook: &Notebook) -> Option<&str> {
    let first = notebook.cells.first()?;
    if first.kind != CellKind::Markdown {
        return None;
    }
    let line = first.source.first_line()?;
    TITLE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|title| title.as_str())
}

impl<'a, R: Rasterizer> Assembler<'a, R> {
    pub fn new(assets: &'a AssetEngine<R>, options: &'a RenderOptions) -> Self {
        Self { assets, options }
    }

    pub fn write_document<W: Write + ?Sized>(&self, output: &mut W, notebook: &Notebook) -> Res {
        let authors = notebook.authors();
        output.write_str(template::PREAMBLE)?;
        if let Some(title) = title(notebook) {
            write!(
                output,
                "\\hypersetup{{\n\tpdfauthor={{{authors}}},\n\tpdftitle={{{title}}},\n\tpdfsubject={{{}}},\n}}\n",
                self.options.subject
            )?;
        }
        writeln!(output, "\\newcommand\\authors{{{authors}}}")?;
        output.write_str(template::BEGIN_DOCUMENT)?;

        let writer = LatexWriter::new(self.assets, self.options);
        for cell in &notebook.cells {
            self.write_cell(output, &writer, cell)?;
        }

        output.write_str(template::EPILOGUE)?;
        Ok(())
    }

    fn write_cell<W: Write + ?Sized>(
        &self,
        output: &mut W,
        writer: &LatexWriter<'_, R>,
        cell: &Cell,
    ) -> Res {
        let meta = CellMeta::new(&cell.metadata);
        let source = cell.source.joined();
        match cell.kind {
            CellKind::Markdown => writer.write_markdown(output, &meta, &source)?,
            CellKind::Code => {
                let language = meta.lang().unwrap_or(self.options.default_language.as_str());
                write!(
                    output,
                    "\\begin{{minted}}[breaklines=true,frame=single,rulecolor=black!30]{{{language}}}\n{source}\n\\end{{minted}}\n"
                )?;
            }
            CellKind::Other => {}
        }

        // rich display replaces the plain echo of the same value
        let has_display = cell.outputs.iter().any(Output::is_display);
        cell.outputs
            .iter()
            .filter(|out| !has_display || out.is_display())
            .try_for_each(|out| self.write_output(output, &meta, out))
    }

    fn write_output<W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &CellMeta<'_>,
        out: &Output,
    ) -> Res {
        match out {
            Output::Display { png: Some(png) } => match self.assets.materialize_embedded(png) {
                Ok(reference) => {
                    let scale = meta
                        .scale()
                        .unwrap_or_else(|| self.options.image_scale.to_string().into());
                    write!(
                        output,
                        "\n\\begin{{center}}\\includegraphics[scale={scale}]{{{}}}\\end{{center}}",
                        reference.display()
                    )?;
                }
                Err(err) => {
                    tracing::error!("Could not decode displayed image: {err}");
                    placeholder(output, "[Unreadable image in display_data output]")?;
                }
            },
            Output::Display { png: None } => {
                tracing::warn!("Display output has no PNG image");
                placeholder(output, "[Missing image in display_data output]")?;
            }
            Output::Result { text } => {
                write!(
                    output,
                    "\\begin{{minted}}[{OUTPUT_FRAME},rulecolor=green!30]{{{}}}\n{}\n\\end{{minted}}\n",
                    self.options.default_language,
                    text.joined()
                )?;
            }
            Output::Error { traceback } => {
                // ¤ stands for the backslash inside this environment
                write!(
                    output,
                    "\\begin{{Verbatim}}[{OUTPUT_FRAME},rulecolor=red!30,commandchars={}\\{{\\}},fontsize=\\small]\n{}\\end{{Verbatim}}\n",
                    ansi::COMMAND_CHAR,
                    ansi::translate(traceback)
                )?;
            }
            Output::Stream { text } => {
                let text = text.joined();
                let newline = if text.ends_with('\n') { "" } else { "\n" };
                write!(
                    output,
                    "\\begin{{Verbatim}}[{OUTPUT_FRAME},rulecolor=blue!30]\n{text}{newline}\\end{{Verbatim}}\n"
                )?;
            }
            Output::Other { kind } => {
                tracing::warn!(kind = %kind, "Unknown output type");
                placeholder(output, &format!("[Unknown output type {kind}]"))?;
            }
        }
        Ok(())
    }
}

fn placeholder<W: Write + ?Sized>(output: &mut W, message: &str) -> Res {
    write!(
        output,
        "\\begin{{Verbatim}}[{OUTPUT_FRAME},rulecolor=red!30]\n{message}\n\\end{{Verbatim}}\n"
    )?;
    Ok(())
}
