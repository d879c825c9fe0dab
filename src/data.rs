use std::borrow::Cow;

type Tx<'source> = Cow<'source, str>;

/// Markup features the parser knows about, but for which there's no LaTeX counterpart (yet).
///
/// These are still tokens, so that the generator can tell the user what exactly it did not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    HardBreak,
    Rule,
    HtmlBlock,
    FootnoteReference,
    FootnoteDefinition,
    TaskListMarker,
    Strikethrough,
    Other(&'static str),
}

impl Unsupported {
    pub fn name(&self) -> &'static str {
        match self {
            Unsupported::HardBreak => "hardbreak",
            Unsupported::Rule => "hr",
            Unsupported::HtmlBlock => "html_block",
            Unsupported::FootnoteReference => "footnote_ref",
            Unsupported::FootnoteDefinition => "footnote_block",
            Unsupported::TaskListMarker => "task_list_marker",
            Unsupported::Strikethrough => "s_open",
            Unsupported::Other(name) => name,
        }
    }
}

/// Tokens, as they come out of the markup parser.
///
/// Containers are flattened into explicit open/close pairs, in pre-order.
/// Leaf blocks that carry their text (code, images) are collapsed into a single token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'source> {
    ParagraphOpen,
    ParagraphClose,
    Text(Tx<'source>),
    EmphasisOpen,
    EmphasisClose,
    StrongOpen,
    StrongClose,
    LinkOpen {
        href: Tx<'source>,
    },
    LinkClose,
    InlineCode {
        content: Tx<'source>,
        // as set by `{.class}` attribute right after the span
        class: Option<Tx<'source>>,
    },
    /// Indented code block
    CodeBlock {
        content: Tx<'source>,
    },
    Fence {
        info: Tx<'source>,
        content: Tx<'source>,
    },
    HeadingOpen {
        // 1..=6
        level: u8,
    },
    HeadingClose {
        level: u8,
    },
    Image {
        src: Tx<'source>,
        alt: String,
    },
    BlockquoteOpen,
    BlockquoteClose,
    InlineMath(Tx<'source>),
    DisplayMath(Tx<'source>),
    BulletListOpen,
    BulletListClose,
    OrderedListOpen,
    OrderedListClose,
    ListItemOpen,
    ListItemClose,
    SoftBreak,
    TableOpen,
    TableClose,
    TheadOpen,
    TheadClose,
    TbodyOpen,
    TbodyClose,
    RowOpen,
    RowClose,
    HeaderCellOpen,
    HeaderCellClose,
    CellOpen,
    CellClose,
    /// Raw inline tag, like `<hfill/>` or `<footnote text="..."/>`
    InlineHtml(Tx<'source>),
    Unsupported(Unsupported),
}
