use std::{borrow::Cow, path::Path, str::FromStr};

use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Text fields of an `.ipynb` file are either a single string, or a list of lines.
/// Both are seen in the wild, so both are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Multiline {
    Single(String),
    Lines(Vec<String>),
}

impl Default for Multiline {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

impl Multiline {
    pub fn lines(&self) -> &[String] {
        match self {
            Multiline::Single(s) => std::slice::from_ref(s),
            Multiline::Lines(lines) => lines,
        }
    }

    /// Concatenated text (fragments already carry their newlines)
    pub fn joined(&self) -> Cow<'_, str> {
        match self {
            Multiline::Single(s) => Cow::Borrowed(s),
            Multiline::Lines(lines) if lines.len() == 1 => Cow::Borrowed(&lines[0]),
            Multiline::Lines(lines) => Cow::Owned(lines.concat()),
        }
    }

    pub fn first_line(&self) -> Option<&str> {
        match self {
            Multiline::Single(s) => s.lines().next(),
            Multiline::Lines(lines) => lines.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotebookMeta {
    #[serde(default)]
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub metadata: NotebookMeta,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
    /// raw cells and anything newer; these are not rendered
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Cell {
    #[serde(rename = "cell_type")]
    pub kind: CellKind,
    #[serde(default)]
    pub source: Multiline,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// A single output attached to a code cell.
///
/// Everything besides the four known kinds is kept as [`Output::Other`] with its type name,
/// so that it can be reported in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Display { png: Option<String> },
    Result { text: Multiline },
    Error { traceback: Vec<String> },
    Stream { text: Multiline },
    Other { kind: String },
}

#[derive(Deserialize)]
struct RawOutput {
    output_type: String,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    traceback: Vec<String>,
    #[serde(default)]
    text: Multiline,
}

impl<'de> Deserialize<'de> for Output {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawOutput {
            output_type,
            mut data,
            traceback,
            text,
        } = RawOutput::deserialize(deserializer)?;
        Ok(match output_type.as_str() {
            "display_data" => Output::Display {
                png: match data.remove("image/png") {
                    Some(Value::String(png)) => Some(png),
                    Some(Value::Array(lines)) => {
                        Some(lines.iter().filter_map(Value::as_str).collect())
                    }
                    _ => None,
                },
            },
            "execute_result" => Output::Result {
                text: match data.remove("text/plain") {
                    Some(value) => serde_json::from_value(value)
                        .map_err(<D::Error as serde::de::Error>::custom)?,
                    None => Multiline::default(),
                },
            },
            "error" => Output::Error { traceback },
            "stream" => Output::Stream { text },
            _ => Output::Other { kind: output_type },
        })
    }
}

impl Output {
    pub fn is_display(&self) -> bool {
        matches!(self, Output::Display { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Could not read notebook: {}", .0)]
    Io(#[from] std::io::Error),
    #[error("Notebook is not valid JSON: {}", .0)]
    Json(#[from] serde_json::Error),
}

impl FromStr for Notebook {
    type Err = NotebookError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(input)?)
    }
}

impl Notebook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NotebookError> {
        std::fs::read_to_string(path.as_ref())?.parse()
    }

    /// Author names, separated with commas
    pub fn authors(&self) -> String {
        self.metadata.authors.iter().map(|a| a.name.as_str()).join(", ")
    }
}
