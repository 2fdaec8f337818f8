use std::collections::BTreeMap;

use super::RpcError;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Nil => "nil",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Builds a `methodCall`. ROS API calls only ever pass strings.
pub fn encode_call(method: &str, params: &[&str]) -> String {
    let mut out = String::with_capacity(128);
    out.push_str("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    escape_into(&mut out, method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param><value><string>");
        escape_into(&mut out, param);
        out.push_str("</string></value></param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Parses a `methodResponse` document. A `<fault>` response becomes
/// `RpcError::Fault`.
pub fn parse_response(body: &str) -> Result<Value, RpcError> {
    let mut parser = Parser::new(body);
    parser.skip_misc();
    parser.expect_open("methodResponse")?;
    parser.skip_misc();

    let tag = parser.next_tag()?;
    let result = match (tag.name, tag.kind) {
        ("params", TagKind::Open) => {
            parser.expect_open("param")?;
            let value = parser.value()?;
            parser.expect_close("param")?;
            parser.expect_close("params")?;
            Ok(value)
        }
        ("fault", TagKind::Open) => {
            let value = parser.value()?;
            parser.expect_close("fault")?;
            Err(fault_from(value))
        }
        (name, _) => {
            return Err(RpcError::Malformed(format!(
                "unexpected <{}> in methodResponse",
                name
            )))
        }
    };
    parser.expect_close("methodResponse")?;
    result
}

fn fault_from(value: Value) -> RpcError {
    let kind = value.kind();
    let Value::Struct(members) = value else {
        return RpcError::Malformed(format!("fault carries a {} instead of a struct", kind));
    };
    let code = members.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
    let message = members
        .get("faultString")
        .and_then(Value::as_str)
        .unwrap_or("unknown fault")
        .to_string();
    RpcError::Fault { code, message }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    Empty,
}

struct Tag<'a> {
    name: &'a str,
    kind: TagKind,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    // Whitespace, the XML declaration and comments.
    fn skip_misc(&mut self) {
        loop {
            self.skip_ws();
            let rest = self.rest();
            let terminator = if rest.starts_with("<?") {
                "?>"
            } else if rest.starts_with("<!--") {
                "-->"
            } else {
                return;
            };
            match rest.find(terminator) {
                Some(end) => self.pos += end + terminator.len(),
                None => {
                    self.pos = self.src.len();
                    return;
                }
            }
        }
    }

    fn next_tag(&mut self) -> Result<Tag<'a>, RpcError> {
        self.skip_misc();
        let rest = self.rest();
        if !rest.starts_with('<') {
            return Err(self.malformed("expected a tag"));
        }
        let end = rest
            .find('>')
            .ok_or_else(|| self.malformed("unterminated tag"))?;
        let inner = &rest[1..end];
        self.pos += end + 1;

        let (kind, inner) = if let Some(stripped) = inner.strip_prefix('/') {
            (TagKind::Close, stripped)
        } else if let Some(stripped) = inner.strip_suffix('/') {
            (TagKind::Empty, stripped)
        } else {
            (TagKind::Open, inner)
        };
        let name = inner.split_whitespace().next().unwrap_or("");
        Ok(Tag { name, kind })
    }

    fn peek_tag(&mut self) -> Result<Tag<'a>, RpcError> {
        let saved = self.pos;
        let tag = self.next_tag();
        self.pos = saved;
        tag
    }

    fn expect_open(&mut self, name: &str) -> Result<(), RpcError> {
        let tag = self.next_tag()?;
        if tag.name == name && tag.kind == TagKind::Open {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected <{}>, found <{}>", name, tag.name)))
        }
    }

    fn expect_close(&mut self, name: &str) -> Result<(), RpcError> {
        let tag = self.next_tag()?;
        if tag.name == name && tag.kind == TagKind::Close {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected </{}>, found <{}>", name, tag.name)))
        }
    }

    fn text(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn value(&mut self) -> Result<Value, RpcError> {
        let tag = self.next_tag()?;
        if tag.name != "value" || tag.kind == TagKind::Close {
            return Err(self.malformed(&format!("expected <value>, found <{}>", tag.name)));
        }
        if tag.kind == TagKind::Empty {
            return Ok(Value::String(String::new()));
        }

        // A bare text node inside <value> is a string.
        let raw = self.text();
        let next = self.peek_tag()?;
        if next.name == "value" && next.kind == TagKind::Close {
            self.next_tag()?;
            return Ok(Value::String(unescape(raw)?));
        }

        let inner = self.next_tag()?;
        let value = match (inner.name, inner.kind) {
            ("string", TagKind::Empty) => Value::String(String::new()),
            ("nil", TagKind::Empty) => Value::Nil,
            ("array", TagKind::Empty) => Value::Array(Vec::new()),
            ("struct", TagKind::Empty) => Value::Struct(BTreeMap::new()),
            ("string", TagKind::Open) => {
                let text = self.text();
                self.expect_close("string")?;
                Value::String(unescape(text)?)
            }
            (name @ ("int" | "i4" | "i8"), TagKind::Open) => {
                let text = self.text().trim();
                self.expect_close(name)?;
                Value::Int(
                    text.parse()
                        .map_err(|_| self.malformed(&format!("bad integer {:?}", text)))?,
                )
            }
            ("boolean", TagKind::Open) => {
                let text = self.text().trim();
                self.expect_close("boolean")?;
                match text {
                    "1" => Value::Bool(true),
                    "0" => Value::Bool(false),
                    other => return Err(self.malformed(&format!("bad boolean {:?}", other))),
                }
            }
            ("double", TagKind::Open) => {
                let text = self.text().trim();
                self.expect_close("double")?;
                Value::Double(
                    text.parse()
                        .map_err(|_| self.malformed(&format!("bad double {:?}", text)))?,
                )
            }
            ("array", TagKind::Open) => {
                let items = self.array_data()?;
                self.expect_close("array")?;
                Value::Array(items)
            }
            ("struct", TagKind::Open) => {
                let members = self.struct_members()?;
                Value::Struct(members)
            }
            (name, _) => return Err(self.malformed(&format!("unsupported value type <{}>", name))),
        };

        self.expect_close("value")?;
        Ok(value)
    }

    fn array_data(&mut self) -> Result<Vec<Value>, RpcError> {
        let data = self.next_tag()?;
        match (data.name, data.kind) {
            ("data", TagKind::Empty) => return Ok(Vec::new()),
            ("data", TagKind::Open) => {}
            (name, _) => return Err(self.malformed(&format!("expected <data>, found <{}>", name))),
        }

        let mut items = Vec::new();
        loop {
            let next = self.peek_tag()?;
            if next.name == "data" && next.kind == TagKind::Close {
                self.next_tag()?;
                return Ok(items);
            }
            items.push(self.value()?);
        }
    }

    fn struct_members(&mut self) -> Result<BTreeMap<String, Value>, RpcError> {
        let mut members = BTreeMap::new();
        loop {
            let next = self.next_tag()?;
            match (next.name, next.kind) {
                ("struct", TagKind::Close) => return Ok(members),
                ("member", TagKind::Open) => {
                    self.expect_open("name")?;
                    let name = unescape(self.text())?;
                    self.expect_close("name")?;
                    let value = self.value()?;
                    self.expect_close("member")?;
                    members.insert(name, value);
                }
                (name, _) => {
                    return Err(self.malformed(&format!("expected <member>, found <{}>", name)))
                }
            }
        }
    }

    fn malformed(&self, what: &str) -> RpcError {
        RpcError::Malformed(format!("{} at byte {}", what, self.pos))
    }
}

fn unescape(text: &str) -> Result<String, RpcError> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| RpcError::Malformed("unterminated entity".to_string()))?;
        let entity = &after[..end];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    RpcError::Malformed(format!("unknown entity &{};", entity))
                })?
            }
        };
        out.push(ch);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
