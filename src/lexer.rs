use std::borrow::Cow;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, multispace0, multispace1, space0},
    combinator::{all_consuming, map},
    error::{context, ContextError, ParseError},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult, Parser,
};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Tag, TextMergeStream};

use crate::data::{Token, Unsupported};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Malformed tag: {}", .0)]
    Malformed(String),
    #[error("Tag has no \"text\" attribute: {}", .0)]
    NoText(String),
    #[error("Unknown entity &{};", .0)]
    Entity(String),
}

fn tx(s: CowStr<'_>) -> Cow<'_, str> {
    match s {
        CowStr::Borrowed(s) => Cow::Borrowed(s),
        s => Cow::Owned(s.into_string()),
    }
}

/// Tail of a `Cow`, staying borrowed if possible
fn tail<'s>(s: &Cow<'s, str>, from: usize) -> Cow<'s, str> {
    match s {
        Cow::Borrowed(s) => Cow::Borrowed(&s[from..]),
        Cow::Owned(s) => Cow::Owned(s[from..].to_owned()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Attribute<'source> {
    Class(&'source str),
    Id(&'source str),
    Pair(&'source str, &'source str),
}

fn name_kernel<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, &'source str, E> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | ':'))
        .parse(input)
}

/// Quoted (either way) attribute value
fn quoted<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, &'source str, E> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
    ))
    .parse(input)
}

fn attribute<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, Attribute<'source>, E> {
    alt((
        map(preceded(char('.'), name_kernel), Attribute::Class),
        map(preceded(char('#'), name_kernel), Attribute::Id),
        map(
            separated_pair(name_kernel, char('='), alt((quoted, name_kernel))),
            |(key, value)| Attribute::Pair(key, value),
        ),
    ))
    .parse(input)
}

/// Parses attribute block, like `{.python}` or `{#ident .class key=value}`
///
/// These may follow an inline code span to tell its language.
fn attributes<'source, E: ParseError<&'source str> + ContextError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, Vec<Attribute<'source>>, E> {
    context(
        "attributes",
        delimited(
            char('{'),
            many0(preceded(space0, attribute)),
            pair(space0, char('}')),
        ),
    )
    .parse(input)
}

/// Class set by the attribute block, and the length of the block itself
fn code_class(input: &str) -> Option<(String, usize)> {
    let (rest, attrs) = attributes::<nom::error::Error<&str>>(input).ok()?;
    let class = attrs.into_iter().find_map(|attr| match attr {
        Attribute::Class(class) => Some(class),
        Attribute::Pair("class", class) => Some(class),
        _ => None,
    })?;
    Some((class.to_owned(), input.len() - rest.len()))
}

fn html_attribute<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, (&'source str, &'source str), E> {
    preceded(
        multispace1,
        separated_pair(
            name_kernel,
            tuple((multispace0, char('='), multispace0)),
            quoted,
        ),
    )
    .parse(input)
}

/// Parses a self-closing inline tag: `<name key="value" .../>`
fn inline_tag<'source, E: ParseError<&'source str> + ContextError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, (&'source str, Vec<(&'source str, &'source str)>), E> {
    context(
        "inline tag",
        delimited(
            char('<'),
            pair(name_kernel, many0(html_attribute)),
            preceded(multispace0, tag("/>")),
        ),
    )
    .parse(input)
}

/// Replaces XML entities with their characters
fn unescape(value: &str) -> Result<Cow<'_, str>, LexError> {
    if !value.contains('&') {
        return Ok(Cow::Borrowed(value));
    }
    let mut res = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        res.push_str(&rest[..start]);
        let Some(len) = rest[start..].find(';') else {
            return Err(LexError::Entity(rest[start + 1..].to_owned()));
        };
        let entity = &rest[start + 1..start + len];
        let c = match entity {
            "quot" => Some('"'),
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        res.push(c.ok_or_else(|| LexError::Entity(entity.to_owned()))?);
        rest = &rest[start + len + 1..];
    }
    res.push_str(rest);
    Ok(Cow::Owned(res))
}

/// Markup text of a `<footnote text="..."/>` tag
pub fn footnote_text(input: &str) -> Result<Cow<'_, str>, LexError> {
    let (_, (name, attrs)) = all_consuming(terminated(
        inline_tag::<nom::error::Error<&str>>,
        multispace0,
    ))
    .parse(input.trim_start())
    .map_err(|_| LexError::Malformed(input.to_owned()))?;
    if name != "footnote" {
        return Err(LexError::Malformed(input.to_owned()));
    }
    let (_, text) = attrs
        .into_iter()
        .find(|(key, _)| *key == "text")
        .ok_or_else(|| LexError::NoText(input.to_owned()))?;
    unescape(text)
}

#[derive(Debug)]
enum Frame<'source> {
    Paragraph,
    Heading(u8),
    BlockQuote,
    Code {
        info: Option<Cow<'source, str>>,
        content: String,
    },
    Image {
        src: Cow<'source, str>,
        alt: String,
        // formatting inside alt text is dropped
        depth: usize,
    },
    List {
        ordered: bool,
    },
    Item,
    Table {
        body_open: bool,
    },
    Head,
    Row,
    Cell {
        head: bool,
    },
    Emphasis,
    Strong,
    Link,
    // open was reported as unsupported already, children go on as usual
    Silent,
    // children are dropped
    Swallow,
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_MATH);
    options
}

/// Parses markdown into a flat token stream
///
/// Each container is reported with an open and a close token, while code blocks and images come whole.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut events =
        TextMergeStream::new(pulldown_cmark::Parser::new_ext(input, parser_options())).peekable();
    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut tokens = Vec::new();

    while let Some(event) = events.next() {
        // leaf blocks collect their text
        match (stack.last_mut(), &event) {
            (Some(Frame::Swallow), Event::Text(_) | Event::Html(_) | Event::SoftBreak) => continue,
            (Some(Frame::Code { content, .. }), Event::Text(text)) => {
                content.push_str(text);
                continue;
            }
            (Some(Frame::Image { alt, .. }), Event::Text(text) | Event::Code(text)) => {
                alt.push_str(text);
                continue;
            }
            (Some(Frame::Image { alt, .. }), Event::SoftBreak) => {
                alt.push(' ');
                continue;
            }
            (Some(Frame::Image { depth, .. }), Event::Start(_)) => {
                *depth += 1;
                continue;
            }
            (Some(Frame::Image { depth, .. }), Event::End(_)) if *depth > 0 => {
                *depth -= 1;
                continue;
            }
            (Some(Frame::Image { .. }), Event::End(_)) => {}
            (Some(Frame::Image { .. }), _) => continue,
            _ => {}
        }

        match event {
            Event::Start(start) => {
                let (frame, token) = match start {
                    Tag::Paragraph => (Frame::Paragraph, Some(Token::ParagraphOpen)),
                    Tag::Heading { level, .. } => {
                        let level = level as u8;
                        (Frame::Heading(level), Some(Token::HeadingOpen { level }))
                    }
                    Tag::BlockQuote { .. } => (Frame::BlockQuote, Some(Token::BlockquoteOpen)),
                    Tag::CodeBlock(kind) => (
                        Frame::Code {
                            info: match kind {
                                CodeBlockKind::Fenced(info) => Some(tx(info)),
                                CodeBlockKind::Indented => None,
                            },
                            content: String::new(),
                        },
                        None,
                    ),
                    Tag::List(start) => {
                        let ordered = start.is_some();
                        let token = if ordered {
                            Token::OrderedListOpen
                        } else {
                            Token::BulletListOpen
                        };
                        (Frame::List { ordered }, Some(token))
                    }
                    Tag::Item => (Frame::Item, Some(Token::ListItemOpen)),
                    Tag::Table(_) => (Frame::Table { body_open: false }, Some(Token::TableOpen)),
                    Tag::TableHead => {
                        tokens.extend([Token::TheadOpen, Token::RowOpen]);
                        (Frame::Head, None)
                    }
                    Tag::TableRow => {
                        let table = stack.iter_mut().rev().find_map(|frame| match frame {
                            Frame::Table { body_open } => Some(body_open),
                            _ => None,
                        });
                        if let Some(body_open) = table {
                            if !*body_open {
                                *body_open = true;
                                tokens.push(Token::TbodyOpen);
                            }
                        }
                        (Frame::Row, Some(Token::RowOpen))
                    }
                    Tag::TableCell => {
                        let head = matches!(stack.last(), Some(Frame::Head));
                        let token = if head {
                            Token::HeaderCellOpen
                        } else {
                            Token::CellOpen
                        };
                        (Frame::Cell { head }, Some(token))
                    }
                    Tag::Emphasis => (Frame::Emphasis, Some(Token::EmphasisOpen)),
                    Tag::Strong => (Frame::Strong, Some(Token::StrongOpen)),
                    Tag::Link { dest_url, .. } => (
                        Frame::Link,
                        Some(Token::LinkOpen {
                            href: tx(dest_url),
                        }),
                    ),
                    Tag::Image { dest_url, .. } => (
                        Frame::Image {
                            src: tx(dest_url),
                            alt: String::new(),
                            depth: 0,
                        },
                        None,
                    ),
                    Tag::Strikethrough => (
                        Frame::Silent,
                        Some(Token::Unsupported(Unsupported::Strikethrough)),
                    ),
                    Tag::FootnoteDefinition(_) => (
                        Frame::Silent,
                        Some(Token::Unsupported(Unsupported::FootnoteDefinition)),
                    ),
                    Tag::HtmlBlock => (
                        Frame::Swallow,
                        Some(Token::Unsupported(Unsupported::HtmlBlock)),
                    ),
                    _ => (
                        Frame::Silent,
                        Some(Token::Unsupported(Unsupported::Other("container"))),
                    ),
                };
                tokens.extend(token);
                stack.push(frame);
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    continue;
                };
                match frame {
                    Frame::Paragraph => tokens.push(Token::ParagraphClose),
                    Frame::Heading(level) => tokens.push(Token::HeadingClose { level }),
                    Frame::BlockQuote => tokens.push(Token::BlockquoteClose),
                    Frame::Code {
                        info: Some(info),
                        content,
                    } => tokens.push(Token::Fence {
                        info,
                        content: content.into(),
                    }),
                    Frame::Code {
                        info: None,
                        content,
                    } => tokens.push(Token::CodeBlock {
                        content: content.into(),
                    }),
                    Frame::Image { src, alt, .. } => tokens.push(Token::Image { src, alt }),
                    Frame::List { ordered: true } => tokens.push(Token::OrderedListClose),
                    Frame::List { ordered: false } => tokens.push(Token::BulletListClose),
                    Frame::Item => tokens.push(Token::ListItemClose),
                    Frame::Table { body_open } => {
                        if body_open {
                            tokens.push(Token::TbodyClose);
                        }
                        tokens.push(Token::TableClose);
                    }
                    Frame::Head => tokens.extend([Token::RowClose, Token::TheadClose]),
                    Frame::Row => tokens.push(Token::RowClose),
                    Frame::Cell { head: true } => tokens.push(Token::HeaderCellClose),
                    Frame::Cell { head: false } => tokens.push(Token::CellClose),
                    Frame::Emphasis => tokens.push(Token::EmphasisClose),
                    Frame::Strong => tokens.push(Token::StrongClose),
                    Frame::Link => tokens.push(Token::LinkClose),
                    Frame::Silent | Frame::Swallow => {}
                }
            }
            Event::Text(text) => tokens.push(Token::Text(tx(text))),
            Event::Code(content) => {
                let content = tx(content);
                let mut class = None;
                if matches!(events.peek(), Some(Event::Text(next)) if next.starts_with('{')) {
                    if let Some(Event::Text(next)) = events.next() {
                        let next = tx(next);
                        let rest = match code_class(&next) {
                            Some((found, len)) => {
                                class = Some(Cow::Owned(found));
                                tail(&next, len)
                            }
                            None => next,
                        };
                        tokens.push(Token::InlineCode { content, class });
                        if !rest.is_empty() {
                            tokens.push(Token::Text(rest));
                        }
                        continue;
                    }
                }
                tokens.push(Token::InlineCode { content, class });
            }
            Event::InlineMath(content) => tokens.push(Token::InlineMath(tx(content))),
            Event::DisplayMath(content) => tokens.push(Token::DisplayMath(tx(content))),
            Event::InlineHtml(content) => tokens.push(Token::InlineHtml(tx(content))),
            Event::Html(_) => tokens.push(Token::Unsupported(Unsupported::HtmlBlock)),
            Event::FootnoteReference(_) => {
                tokens.push(Token::Unsupported(Unsupported::FootnoteReference))
            }
            Event::SoftBreak => tokens.push(Token::SoftBreak),
            Event::HardBreak => tokens.push(Token::Unsupported(Unsupported::HardBreak)),
            Event::Rule => tokens.push(Token::Unsupported(Unsupported::Rule)),
            Event::TaskListMarker(_) => {
                tokens.push(Token::Unsupported(Unsupported::TaskListMarker))
            }
            #[allow(unreachable_patterns)]
            _ => tokens.push(Token::Unsupported(Unsupported::Other("event"))),
        }
    }
    tokens
}
