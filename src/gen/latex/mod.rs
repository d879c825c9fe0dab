mod context;
mod meta;
pub mod template;

pub use context::{RenderState, Sink};
pub use meta::CellMeta;

use std::{fmt::Write, path::Path};

use crate::{
    assets::{AssetEngine, Rasterizer},
    config::{RenderOptions, UnknownTokens},
    data::Token,
    lexer,
};

use super::{GenerationError, OutputGenerator, Res};

/// Characters that do not make a table header row non-empty
const HEADER_FILLER: &[char] = &[' ', '&', '\t', '\\', '\n'];

/// LaTeX generator for markdown cells
#[derive(Debug)]
pub struct LatexWriter<'a, R> {
    assets: &'a AssetEngine<R>,
    options: &'a RenderOptions,
}

impl<'a, R: Rasterizer> LatexWriter<'a, R> {
    pub fn new(assets: &'a AssetEngine<R>, options: &'a RenderOptions) -> Self {
        Self { assets, options }
    }

    /// Parses and writes markdown source of a single cell
    pub fn write_markdown<W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &CellMeta<'_>,
        source: &str,
    ) -> Res {
        if let Some(pretex) = meta.pretex() {
            write!(output, "{pretex} ")?;
        }
        let tokens = lexer::lex(source);
        self.write_tokens_to(output, meta, &mut RenderState::default(), &tokens)
    }

    /// Footnote text is markdown too, so it gets its own parse and its own render state
    fn write_footnote(
        &self,
        output: &mut dyn Write,
        meta: &CellMeta<'_>,
        tag: &str,
    ) -> Res {
        let text = match lexer::footnote_text(tag) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(tag, "Skipping footnote: {err}");
                return Ok(());
            }
        };
        let tokens = lexer::lex(&text);
        output.write_str("\\footnote{")?;
        self.write_tokens_to(output, meta, &mut RenderState::default(), &tokens)?;
        output.write_str("}")?;
        Ok(())
    }

    fn write_image<W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &CellMeta<'_>,
        src: &str,
    ) -> Res {
        let reference = match self.assets.ensure_asset(Path::new(src)) {
            Ok(reference) => reference.to_string_lossy().into_owned(),
            Err(err) => {
                tracing::warn!(src, "Could not place image: {err}");
                src.to_owned()
            }
        };
        let tweaks = meta
            .img_width()
            .map(|width| format!("[width={width}]"))
            .unwrap_or_default();
        write!(
            output,
            "\n\\begin{{center}}\\includegraphics{tweaks}{{{reference}}}\\end{{center}}"
        )?;
        Ok(())
    }

    fn unknown(&self, token: &Token<'_>) -> Res {
        let name = match token {
            Token::Unsupported(kind) => kind.name().to_owned(),
            token => format!("{token:?}"),
        };
        match self.options.unknown_tokens {
            UnknownTokens::Halt => Err(GenerationError::UnknownToken(name)),
            UnknownTokens::Prompt => {
                tracing::warn!(token = %name, "No handler for token, press Enter to go on");
                let _ = std::io::stdin().read_line(&mut String::new());
                Ok(())
            }
        }
    }
}

impl<R: Rasterizer> OutputGenerator<CellMeta<'_>, RenderState> for LatexWriter<'_, R> {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &CellMeta<'_>,
        context: &mut RenderState,
        token: &Token<'_>,
    ) -> Res {
        match token {
            Token::ParagraphOpen => {
                let separated = std::mem::take(&mut context.needs_indent);
                context.sink(output).write_str(if separated {
                    "\n\\medskip "
                } else {
                    "\n\\noindent "
                })?;
            }
            Token::ParagraphClose => {
                context.needs_indent = true;
                context.sink(output).write_char('\n')?;
            }
            Token::Text(text) => context.sink(output).write_str(text)?,
            Token::EmphasisOpen => context.sink(output).write_str("\\emph{")?,
            Token::StrongOpen => context.sink(output).write_str("\\textbf{")?,
            Token::EmphasisClose | Token::StrongClose | Token::LinkClose => {
                context.sink(output).write_char('}')?
            }
            Token::LinkOpen { href } => write!(context.sink(output), "\\href{{{href}}}{{")?,
            Token::InlineCode {
                content,
                class: Some(class),
            } => write!(
                context.sink(output),
                "\\mintinline[breaklines]{{{class}}}£{content}£"
            )?,
            // untagged inline code is assumed to be in the default language
            Token::InlineCode {
                content,
                class: None,
            } => write!(
                context.sink(output),
                "\\mintinline[breaklines, breakafter=/, breakaftersymbolpre=]{{{}}}£{content}£",
                self.options.default_language
            )?,
            Token::CodeBlock { content } => write!(
                context.sink(output),
                "\\begin{{verbatim}}\n{content}\\end{{verbatim}}\n"
            )?,
            Token::Fence { info, content } => {
                context.needs_indent = false;
                let language = info
                    .split_whitespace()
                    .next()
                    .unwrap_or(self.options.default_language.as_str());
                write!(
                    context.sink(output),
                    "\\begin{{minted}}[xleftmargin=1em]{{{language}}}\n{content}\\end{{minted}}\n"
                )?;
            }
            // first level heading is the title of the document
            Token::HeadingOpen { level: 1 } => context
                .sink(output)
                .write_str("\\begin{center}{\\bfseries\\Large \n")?,
            Token::HeadingOpen { level } => {
                let index = usize::from(*level).clamp(2, 6) - 2;
                let command = template::HEADINGS[index];
                let star = if meta.notoc() { "*" } else { "" };
                write!(context.sink(output), "\\{command}{star}{{")?;
            }
            Token::HeadingClose { level } => {
                context.needs_indent = false;
                if *level == 1 {
                    write!(
                        context.sink(output),
                        "}}\\\\[.5ex] {} \\\\[.2ex]\\small \\today \\end{{center}}\\vspace{{2em}}",
                        self.options.byline
                    )?;
                } else {
                    context.sink(output).write_str("}\n")?;
                }
            }
            Token::Image { src, .. } => self.write_image(&mut context.sink(output), meta, src)?,
            Token::BlockquoteOpen => context.sink(output).write_str("\\begin{quotation}")?,
            Token::BlockquoteClose => context.sink(output).write_str("\\end{quotation}")?,
            Token::InlineMath(content) => write!(context.sink(output), "${content}$")?,
            Token::DisplayMath(content) => write!(context.sink(output), "\\[{content}\\]")?,
            Token::BulletListOpen => context.sink(output).write_str("\\begin{itemize}")?,
            Token::BulletListClose => context.sink(output).write_str("\\end{itemize}")?,
            Token::OrderedListOpen => context.sink(output).write_str("\\begin{enumerate}")?,
            Token::OrderedListClose => context.sink(output).write_str("\\end{enumerate}")?,
            Token::ListItemOpen => context.sink(output).write_str("\n\\item ")?,
            // items are not separated like paragraphs are
            Token::ListItemClose => context.needs_indent = false,
            Token::SoftBreak => context.sink(output).write_char('\n')?,
            Token::TableOpen => context
                .sink(output)
                .write_str("\n\\begin{center}\\begin{tabular}")?,
            Token::TableClose => {
                // header that was never closed goes out as it is
                while let Some(header) = context.redirect.pop() {
                    context.sink(output).write_str(&header)?;
                }
                context
                    .sink(output)
                    .write_str("\\bottomrule\\end{tabular}\n\\end{center}\n")?;
            }
            // column count is not known until the header is over, so it's written aside
            Token::TheadOpen => {
                context.column_count = 0;
                context.redirect.push(String::new());
            }
            Token::TheadClose => {
                let header = context.redirect.pop().unwrap_or_default();
                let columns = vec!["l"; context.column_count].join(" ");
                let mut out = context.sink(output);
                write!(out, "{{{columns}}}\\toprule\n")?;
                if !header.trim_matches(HEADER_FILLER).is_empty() {
                    out.write_str(&header)?;
                    out.write_str("\\midrule")?;
                }
            }
            Token::TbodyOpen | Token::TbodyClose => {}
            Token::RowOpen => context.first_column = true,
            Token::RowClose => context.sink(output).write_str(" \\\\\n")?,
            Token::HeaderCellOpen | Token::CellOpen => {
                if matches!(token, Token::HeaderCellOpen) {
                    context.column_count += 1;
                }
                let first = std::mem::replace(&mut context.first_column, false);
                context
                    .sink(output)
                    .write_str(if first { "\t" } else { " & " })?;
            }
            Token::HeaderCellClose | Token::CellClose => {}
            Token::InlineHtml(content) => match content.trim() {
                "<hfill/>" => context.sink(output).write_str("\\hfill ")?,
                "<bigskip/>" => context.sink(output).write_str("\\bigskip")?,
                "<noindent/>" => context.sink(output).write_str("\\noindent ")?,
                tag if tag.starts_with("<footnote") => {
                    let mut sink = context.sink(output);
                    self.write_footnote(&mut sink as &mut dyn Write, meta, tag)?
                }
                tag => tracing::trace!(tag, "Ignoring inline tag"),
            },
            Token::Unsupported(_) => self.unknown(token)?,
        }
        Ok(())
    }
}
