pub mod document;
pub mod latex;

use std::fmt::Write;

use crate::{assets::AssetError, data::Token};

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum GenerationError {
    #[error("{}", .0)]
    IOs(std::fmt::Error),
    #[error("{}", .0)]
    Asset(AssetError),
    #[error("No handler for token {}", .0)]
    #[from(ignore)]
    UnknownToken(String),
}

pub type Res = Result<(), GenerationError>;

pub trait OutputGenerator<Meta, Context> {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &Meta,
        context: &mut Context,
        token: &Token<'_>,
    ) -> Res;

    fn write_tokens_to<'token, 'source: 'token, W: Write + ?Sized>(
        &self,
        output: &mut W,
        meta: &Meta,
        context: &mut Context,
        tokens: impl IntoIterator<Item = &'token Token<'source>>,
    ) -> Res {
        tokens
            .into_iter()
            .try_for_each(|t| self.write_to(output, meta, context, t))
    }
}

/// Whitespace-insensitive comparison of generated LaTeX
#[cfg(test)]
macro_rules! tex_sim {
    ($a:expr, $b:expr) => {
        let real = $a
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();
        let expected = $b
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();

        text_diff::assert_diff(real.as_str(), expected.as_str(), "", 0);
    };
}
#[cfg(test)]
pub(crate) use tex_sim;
