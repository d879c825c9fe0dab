use std::borrow::Cow;

use serde_json::{Map, Value};

/// Metadata of the cell being rendered
///
/// Keys in use:
/// - `pretex`: raw LaTeX, written before the cell
/// - `notoc`: headings of this cell are kept out of the table of contents
/// - `img_width`: width of the images in this cell
/// - `lang`: language of a code cell
/// - `scale`: scale of the displayed images of a code cell
#[derive(Debug, Clone, Copy, Default)]
pub struct CellMeta<'cell> {
    map: Option<&'cell Map<String, Value>>,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strings as they are, numbers as written
fn literal(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}

impl<'cell> CellMeta<'cell> {
    pub fn new(map: &'cell Map<String, Value>) -> Self {
        Self { map: Some(map) }
    }

    fn get(&self, key: &str) -> Option<&'cell Value> {
        self.map.and_then(|map| map.get(key))
    }

    pub fn pretex(&self) -> Option<&'cell str> {
        self.get("pretex").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn notoc(&self) -> bool {
        self.get("notoc").is_some_and(truthy)
    }

    pub fn img_width(&self) -> Option<Cow<'cell, str>> {
        self.get("img_width").and_then(literal)
    }

    pub fn lang(&self) -> Option<&'cell str> {
        self.get("lang").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn scale(&self) -> Option<Cow<'cell, str>> {
        self.get("scale").and_then(literal)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("Test metadata must be an object"),
        }
    }

    #[test]
    fn reads_known_keys() {
        // arrange
        let map = map(json!({
            "pretex": "\\newpage",
            "notoc": true,
            "img_width": "5cm",
            "lang": "haskell",
            "scale": 0.25,
        }));

        // act
        let meta = CellMeta::new(&map);

        // assert
        assert_eq!(meta.pretex(), Some("\\newpage"));
        assert!(meta.notoc());
        assert_eq!(meta.img_width().as_deref(), Some("5cm"));
        assert_eq!(meta.lang(), Some("haskell"));
        assert_eq!(meta.scale().as_deref(), Some("0.25"));
    }

    #[test]
    fn missing_keys() {
        let meta = CellMeta::default();
        assert_eq!(meta.pretex(), None);
        assert!(!meta.notoc());
        assert_eq!(meta.img_width(), None);
        assert_eq!(meta.lang(), None);
        assert_eq!(meta.scale(), None);
    }

    #[test]
    fn notoc_truthiness() {
        for (value, expected) in [
            (json!(false), false),
            (json!(0), false),
            (json!(""), false),
            (json!(1), true),
            (json!("yes"), true),
        ] {
            let map = map(json!({ "notoc": value }));
            assert_eq!(CellMeta::new(&map).notoc(), expected, "{value}");
        }
    }
}
