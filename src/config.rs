use std::path::PathBuf;

use smart_default::SmartDefault;

/// What to do with a token the generator has no handler for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTokens {
    /// Stop the conversion with an error
    #[default]
    Halt,
    /// Tell the operator and wait for them to acknowledge, then carry on
    Prompt,
}

#[derive(Debug, Clone, SmartDefault)]
pub struct RenderOptions {
    /// Language of code cells and untagged inline code
    #[default("python".into())]
    pub default_language: String,
    /// Line written under the document title
    #[default("Informática – Facultad de Ciencias Matemáticas (UCM)".into())]
    pub byline: String,
    /// PDF subject metadata
    #[default("Informática FCM-UCM".into())]
    pub subject: String,
    /// Scale of displayed images, unless the cell says otherwise
    #[default(0.5)]
    pub image_scale: f64,
    pub unknown_tokens: UnknownTokens,
}

#[derive(Debug, Clone, SmartDefault)]
pub struct Options {
    /// Show compiler output and let it stop on errors
    pub interactive: bool,
    /// Build in a persistent directory under `cache_root`, instead of a temporary one
    pub use_cache: bool,
    #[default(".cache".into())]
    pub cache_root: PathBuf,
    #[default("xelatex".into())]
    pub latex_command: String,
    #[default("rsvg-convert".into())]
    pub rasterizer_command: String,
    /// Name of the `.tex`/`.pdf` pair in the build directory
    #[default("notebook".into())]
    pub jobname: String,
    /// Vector logo used in the footer, converted to `img/cc-byncsa.pdf`
    #[default(Some("img/cc-byncsa.svg".into()))]
    pub branding: Option<PathBuf>,
    pub render: RenderOptions,
}
