//! Response document model
//!
//! Every inbound OCI-P message is parsed once into an [`OciDocument`]: the
//! raw body plus a generic tree mirroring the XML structure. Callers
//! navigate the tree with dot-separated paths (`BroadsoftDocument.command.version`),
//! pull tabular data out of the protocol's `colHeading`/`row`/`col`
//! convention, and check for the server's error-reply tag.
//!
//! Tree mapping rules:
//! - child elements are keyed by local name (namespace prefixes stripped);
//! - repeated siblings collapse into a list, preserving document order;
//! - attributes live in the owning element's map under an `@` prefix
//!   (`@type` for the command type attribute);
//! - text-only elements become plain text; an element carrying both
//!   attributes and text keeps the text under the reserved `$text` key.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{DocumentError, Result};

/// Path of the command element inside every response envelope
const COMMAND_PATH: &str = "BroadsoftDocument.command";
/// Type attribute value marking a server error reply
const ERROR_RESPONSE_TYPE: &str = "c:ErrorResponse";

static ERROR_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Error (\d+)\]").unwrap());

/// A node in the parsed response tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text content of a leaf element or an attribute
    Text(String),
    /// Repeated sibling elements, in document order
    List(Vec<Value>),
    /// Child elements and attributes of an element
    Map(HashMap<String, Value>),
}

impl Value {
    fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Text content, if this node is a leaf
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// View any node as a slice: lists as-is, single nodes as one element
    fn as_slice(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

/// Details of a server error reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Numeric code from the `[Error <digits>]` marker, 0 when absent
    pub code: u32,
    /// Full summary text of the error reply
    pub summary: String,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCI-P error {}: {}", self.code, self.summary)
    }
}

impl std::error::Error for ErrorDetails {}

/// A parsed OCI-P response message, immutable after construction
#[derive(Debug, Clone)]
pub struct OciDocument {
    body: String,
    tree: Value,
    error: bool,
    error_text: Option<String>,
}

impl OciDocument {
    /// Parse a response body into a document
    pub fn parse(body: impl Into<String>) -> Result<Self> {
        let body = body.into();
        let tree = parse_tree(&body)?;
        let mut doc = OciDocument {
            body,
            tree,
            error: false,
            error_text: None,
        };
        let is_error = doc
            .get_str(&format!("{COMMAND_PATH}.@type"))
            .map(|kind| kind == ERROR_RESPONSE_TYPE)
            .unwrap_or(false);
        if is_error {
            doc.error = true;
            doc.error_text = doc.error_details().ok().map(|d| d.summary);
        }
        Ok(doc)
    }

    /// Raw body this document was parsed from
    pub fn body(&self) -> &str {
        &self.body
    }

    /// True if the server answered with an error-tagged reply
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Summary text of an error reply, if this document is one
    pub fn error_summary(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    /// Resolve a dot-separated path through the tree
    ///
    /// Segments may index into lists with `row[2]` syntax; attribute
    /// nodes are addressed with their `@` key (`command.@type`).
    pub fn get(&self, path: &str) -> Result<&Value> {
        let mut current = &self.tree;
        for segment in path.split('.') {
            let (name, index) = split_segment(segment, path)?;
            let map = current
                .as_map()
                .ok_or_else(|| DocumentError::path_not_found(path))?;
            current = map
                .get(name)
                .ok_or_else(|| DocumentError::path_not_found(path))?;
            if let Some(index) = index {
                current = current
                    .as_slice()
                    .get(index)
                    .ok_or_else(|| DocumentError::path_not_found(path))?;
            }
        }
        Ok(current)
    }

    /// Resolve a path to a text value
    pub fn get_str(&self, path: &str) -> Result<&str> {
        self.get(path)?
            .as_text()
            .ok_or_else(|| DocumentError::NotText { path: path.into() })
    }

    /// Extract a table following the `colHeading`/`row`/`col` convention
    ///
    /// Returns one heading→cell map per row, preserving row order. Cells
    /// align with headings by position; the protocol carries no alignment
    /// key. Fails if `colHeading` or `row` is absent under `path`.
    pub fn get_table(&self, path: &str) -> Result<Vec<HashMap<String, String>>> {
        let node = self.get(path)?;
        let map = node
            .as_map()
            .ok_or_else(|| DocumentError::malformed_table(path, "not an element"))?;

        let headings = map
            .get("colHeading")
            .ok_or_else(|| DocumentError::path_not_found(format!("{path}.colHeading")))?;
        let headings = text_items(headings)
            .ok_or_else(|| DocumentError::malformed_table(path, "non-text column heading"))?;

        let rows = map
            .get("row")
            .ok_or_else(|| DocumentError::path_not_found(format!("{path}.row")))?;

        let mut table = Vec::new();
        for (i, row) in rows.as_slice().iter().enumerate() {
            let cols = row
                .as_map()
                .and_then(|m| m.get("col"))
                .ok_or_else(|| DocumentError::path_not_found(format!("{path}.row[{i}].col")))?;
            let cols = text_items(cols)
                .ok_or_else(|| DocumentError::malformed_table(path, "non-text cell"))?;
            table.push(
                headings
                    .iter()
                    .zip(cols)
                    .map(|(h, c)| (h.to_string(), c.to_string()))
                    .collect(),
            );
        }
        Ok(table)
    }

    /// Code and summary of an error reply
    ///
    /// Only meaningful when [`is_error`](Self::is_error) holds; fails with
    /// `PathNotFound` when the document carries no summary.
    pub fn error_details(&self) -> Result<ErrorDetails> {
        let summary = self.get_str(&format!("{COMMAND_PATH}.summary"))?;
        let code = ERROR_CODE_RE
            .captures(summary)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);
        Ok(ErrorDetails {
            code,
            summary: summary.to_string(),
        })
    }
}

/// Split a path segment into name and optional `[index]` suffix
fn split_segment<'a>(segment: &'a str, path: &str) -> Result<(&'a str, Option<usize>)> {
    match segment.find('[') {
        None => Ok((segment, None)),
        Some(open) => {
            let index = segment[open..]
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| DocumentError::path_not_found(path))?;
            Ok((&segment[..open], Some(index)))
        }
    }
}

/// Collect the text items of a node that is either a leaf or a list of leaves
fn text_items(node: &Value) -> Option<Vec<&str>> {
    node.as_slice().iter().map(Value::as_text).collect()
}

/// Partially built element during the parse walk
struct Frame {
    name: String,
    children: HashMap<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Frame {
            name,
            children: HashMap::new(),
            text: String::new(),
        }
    }

    fn insert_child(&mut self, name: String, value: Value) {
        match self.children.remove(&name) {
            None => {
                self.children.insert(name, value);
            }
            Some(Value::List(mut items)) => {
                items.push(value);
                self.children.insert(name, Value::List(items));
            }
            Some(existing) => {
                self.children.insert(name, Value::List(vec![existing, value]));
            }
        }
    }

    fn into_value(mut self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::Text(self.text)
        } else {
            if !self.text.is_empty() {
                self.children.insert("$text".into(), Value::Text(self.text));
            }
            Value::Map(self.children)
        };
        (self.name, value)
    }
}

/// Strip any namespace prefix and decode a name
fn local_name(raw: &[u8]) -> String {
    let raw = match raw.iter().rposition(|&b| b == b':') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };
    String::from_utf8_lossy(raw).into_owned()
}

fn parse_tree(body: &str) -> Result<Value> {
    let mut reader = Reader::from_str(body);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = true;

    let mut stack = vec![Frame::new(String::new())];
    loop {
        match reader.read_event().map_err(DocumentError::parse)? {
            Event::Start(start) => {
                let mut frame = Frame::new(local_name(start.name().as_ref()));
                for attr in start.attributes() {
                    let attr = attr.map_err(DocumentError::parse)?;
                    let key = format!("@{}", local_name(attr.key.local_name().as_ref()));
                    let value = attr.unescape_value().map_err(DocumentError::parse)?;
                    frame.children.insert(key, Value::Text(value.into_owned()));
                }
                stack.push(frame);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(DocumentError::parse)?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| DocumentError::parse("unbalanced end tag"))?;
                let (name, value) = frame.into_value();
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| DocumentError::parse("unbalanced end tag"))?;
                parent.insert_child(name, value);
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions carry no data
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(DocumentError::parse("truncated document"));
    }
    let (_, root) = stack.remove(0).into_value();
    match &root {
        Value::Map(_) => Ok(root),
        _ => Err(DocumentError::parse("no root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> OciDocument {
        OciDocument::parse(body).unwrap()
    }

    #[test]
    fn test_get_resolves_nested_values() {
        let d = doc(
            r#"<BroadsoftDocument protocol="OCI">
                <command xsi:type="SystemSoftwareVersionGetResponse">
                    <version>Rel_21.sp1_1.551</version>
                </command>
            </BroadsoftDocument>"#,
        );
        assert_eq!(
            d.get_str("BroadsoftDocument.command.version").unwrap(),
            "Rel_21.sp1_1.551"
        );
        assert_eq!(
            d.get_str("BroadsoftDocument.command.@type").unwrap(),
            "SystemSoftwareVersionGetResponse"
        );
    }

    #[test]
    fn test_get_missing_path_fails() {
        let d = doc("<BroadsoftDocument><command><a>x</a></command></BroadsoftDocument>");
        let err = d.get("BroadsoftDocument.command.missing").unwrap_err();
        assert!(matches!(err, DocumentError::PathNotFound { .. }));
    }

    #[test]
    fn test_repeated_siblings_become_lists() {
        let d = doc(
            "<BroadsoftDocument><command>\
             <item>a</item><item>b</item><item>c</item>\
             </command></BroadsoftDocument>",
        );
        assert_eq!(d.get_str("BroadsoftDocument.command.item[1]").unwrap(), "b");
        assert!(d.get("BroadsoftDocument.command.item[3]").is_err());
    }

    #[test]
    fn test_table_extraction_preserves_order() {
        let d = doc(
            "<BroadsoftDocument><command><userTable>\
             <colHeading>User Id</colHeading><colHeading>Last Name</colHeading>\
             <row><col>u1</col><col>A</col></row>\
             <row><col>u2</col><col>B</col></row>\
             </userTable></command></BroadsoftDocument>",
        );
        let table = d.get_table("BroadsoftDocument.command.userTable").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0]["User Id"], "u1");
        assert_eq!(table[0]["Last Name"], "A");
        assert_eq!(table[1]["User Id"], "u2");
        assert_eq!(table[1]["Last Name"], "B");
    }

    #[test]
    fn test_single_row_table_normalizes_to_one_entry() {
        let d = doc(
            "<BroadsoftDocument><command><userTable>\
             <colHeading>User Id</colHeading>\
             <row><col>only</col></row>\
             </userTable></command></BroadsoftDocument>",
        );
        let table = d.get_table("BroadsoftDocument.command.userTable").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0]["User Id"], "only");
    }

    #[test]
    fn test_table_without_rows_fails() {
        let d = doc(
            "<BroadsoftDocument><command><userTable>\
             <colHeading>User Id</colHeading>\
             </userTable></command></BroadsoftDocument>",
        );
        let err = d
            .get_table("BroadsoftDocument.command.userTable")
            .unwrap_err();
        assert!(matches!(err, DocumentError::PathNotFound { .. }));
    }

    #[test]
    fn test_error_reply_detection() {
        let d = doc(
            r#"<BroadsoftDocument><command xsi:type="c:ErrorResponse">
               <summary>[Error 4500] Invalid password</summary>
               </command></BroadsoftDocument>"#,
        );
        assert!(d.is_error());
        let details = d.error_details().unwrap();
        assert_eq!(details.code, 4500);
        assert_eq!(details.summary, "[Error 4500] Invalid password");
        assert_eq!(d.error_summary(), Some("[Error 4500] Invalid password"));
    }

    #[test]
    fn test_non_error_type_is_not_error() {
        let d = doc(
            r#"<BroadsoftDocument><command xsi:type="SuccessResponse"/></BroadsoftDocument>"#,
        );
        assert!(!d.is_error());
    }

    #[test]
    fn test_summary_without_marker_yields_code_zero() {
        let d = doc(
            r#"<BroadsoftDocument><command xsi:type="c:ErrorResponse">
               <summary>something went wrong</summary>
               </command></BroadsoftDocument>"#,
        );
        let details = d.error_details().unwrap();
        assert_eq!(details.code, 0);
        assert_eq!(details.summary, "something went wrong");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let d = doc("<BroadsoftDocument><command><name>A &amp; B</name></command></BroadsoftDocument>");
        assert_eq!(d.get_str("BroadsoftDocument.command.name").unwrap(), "A & B");
    }

    #[test]
    fn test_malformed_xml_fails() {
        assert!(OciDocument::parse("<BroadsoftDocument><unclosed>").is_err());
        assert!(OciDocument::parse("no xml at all").is_err());
    }
}
