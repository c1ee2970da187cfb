//! JSON interchange.
//!
//! `to_json` renders a value graph; a cycle is reported as `InvalidArg`
//! rather than recursing forever. `parse_json` builds plain objects and
//! arrays with the same syntax taxonomy as script compilation.

use std::path::Path;

use crate::core::object::attr;
use crate::core::value::Value;
use crate::errors::{messages, Error};
use crate::runtime::Runtime;
use crate::util::{fast_set_new, FastHashSet};

impl Runtime {
    /// Render `v` as JSON into `out`.
    pub fn to_json(&mut self, v: Value, out: &mut String) -> Result<(), Error> {
        let mut active: FastHashSet<u64> = fast_set_new();
        self.write_json(v, out, &mut active)
    }

    /// Convenience wrapper returning an owned string.
    pub fn to_json_string(&mut self, v: Value) -> Result<String, Error> {
        let mut out = String::new();
        self.to_json(v, &mut out)?;
        Ok(out)
    }

    fn write_json(
        &mut self,
        v: Value,
        out: &mut String,
        active: &mut FastHashSet<u64>,
    ) -> Result<(), Error> {
        if v.is_null() || v.is_undefined() {
            out.push_str("null");
            return Ok(());
        }
        if v.is_boolean() {
            out.push_str(if v.as_boolean() { "true" } else { "false" });
            return Ok(());
        }
        if v.is_number() {
            write_json_number(out, v.as_number());
            return Ok(());
        }
        if v.is_string() {
            write_json_string(out, self.heap.str(v.as_string()).as_str());
            return Ok(());
        }
        if v.is_function() || v.is_cfunction() || v.is_foreign() {
            out.push_str("null");
            return Ok(());
        }

        debug_assert!(v.is_object());
        if !active.insert(v.bits()) {
            return Err(Error::invalid_arg(messages::CYCLIC_JSON));
        }
        let result = if self.is_array(v) {
            self.write_json_array(v, out, active)
        } else {
            self.write_json_object(v, out, active)
        };
        active.remove(&v.bits());
        result
    }

    fn write_json_array(
        &mut self,
        arr: Value,
        out: &mut String,
        active: &mut FastHashSet<u64>,
    ) -> Result<(), Error> {
        out.push('[');
        let len = self.heap.obj(arr.as_object()).array_len;
        for i in 0..len {
            if i > 0 {
                out.push(',');
            }
            let mut buf = itoa::Buffer::new();
            let elem = match self.find_own(arr, buf.format(i))? {
                Some(pid) => self.heap.prop(pid).value,
                None => Value::NULL,
            };
            self.write_json(elem, out, active)?;
        }
        out.push(']');
        Ok(())
    }

    fn write_json_object(
        &mut self,
        obj: Value,
        out: &mut String,
        active: &mut FastHashSet<u64>,
    ) -> Result<(), Error> {
        out.push('{');
        let mut first = true;
        let mut cursor = self.heap.obj(obj.as_object()).props;
        while let Some(pid) = cursor {
            let prop = self.heap.prop(pid);
            let (value, attrs, next) = (prop.value, prop.attrs, prop.next);
            let skip_attrs =
                attr::DONT_ENUM | attr::HIDDEN | attr::GETTER | attr::SETTER;
            if attrs & skip_attrs == 0
                && !value.is_function()
                && !value.is_cfunction()
                && !value.is_undefined()
            {
                if !first {
                    out.push(',');
                }
                first = false;
                write_json_string(out, self.heap.prop(pid).name.as_str());
                out.push(':');
                self.write_json(value, out, active)?;
            }
            cursor = next;
        }
        out.push('}');
        Ok(())
    }

    /// Parse JSON text into plain runtime values.
    pub fn parse_json(&mut self, text: &str) -> Result<Value, Error> {
        let mut parser = JsonParser {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            depth: 0,
        };
        parser.skip_ws();
        let v = parser.parse_value(self)?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("trailing characters after JSON value"));
        }
        Ok(v)
    }

    /// Read a file and parse its contents as JSON.
    pub fn parse_json_file(&mut self, path: &Path) -> Result<Value, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::syntax(0, 0, format!("cannot read {}: {e}", path.display())))?;
        self.parse_json(&text)
    }
}

fn write_json_number(out: &mut String, n: f64) {
    if !n.is_finite() {
        out.push_str("null");
        return;
    }
    if n.fract() == 0.0 && n.abs() < 9e15 {
        let mut buf = itoa::Buffer::new();
        out.push_str(buf.format(n as i64));
    } else {
        let mut buf = ryu::Buffer::new();
        out.push_str(buf.format(n));
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Container nesting ceiling; crafted `[[[[...` input must not exhaust the
/// call stack.
const MAX_JSON_NESTING: usize = 2048;

struct JsonParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    depth: usize,
}

impl<'a> JsonParser<'a> {
    fn error(&self, message: &str) -> Error {
        Error::syntax(self.line, self.col, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.bump();
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), Error> {
        if self.peek() == Some(b) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", b as char)))
        }
    }

    fn parse_value(&mut self, rt: &mut Runtime) -> Result<Value, Error> {
        self.skip_ws();
        match self.peek() {
            Some(b'n') => self.literal("null", Value::NULL),
            Some(b't') => self.literal("true", Value::TRUE),
            Some(b'f') => self.literal("false", Value::FALSE),
            Some(b'"') => {
                let s = self.parse_string()?;
                rt.create_string(&s)
            }
            Some(b'[' | b'{') => {
                self.depth += 1;
                if self.depth > MAX_JSON_NESTING {
                    return Err(self.error("nesting too deep"));
                }
                let v = if self.peek() == Some(b'[') {
                    self.parse_array(rt)
                } else {
                    self.parse_object(rt)
                };
                self.depth -= 1;
                v
            }
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn literal(&mut self, word: &str, v: Value) -> Result<Value, Error> {
        for &b in word.as_bytes() {
            if self.bump() != Some(b) {
                return Err(self.error("invalid literal"));
            }
        }
        Ok(v)
    }

    fn parse_number(&mut self) -> Result<Value, Error> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        if self.peek() == Some(b'.') {
            self.bump();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("invalid number"))?;
        text.parse::<f64>()
            .map(Value::number)
            .map_err(|_| self.error("invalid number"))
    }

    fn parse_string(&mut self) -> Result<String, Error> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'/') => out.push('/'),
                    Some(b'b') => out.push('\u{08}'),
                    Some(b'f') => out.push('\u{0c}'),
                    Some(b'n') => out.push('\n'),
                    Some(b'r') => out.push('\r'),
                    Some(b't') => out.push('\t'),
                    Some(b'u') => {
                        let hi = self.parse_hex4()?;
                        let c = if (0xd800..0xdc00).contains(&hi) {
                            // Surrogate pair.
                            if self.bump() != Some(b'\\') || self.bump() != Some(b'u') {
                                return Err(self.error("unpaired surrogate"));
                            }
                            let lo = self.parse_hex4()?;
                            if !(0xdc00..0xe000).contains(&lo) {
                                return Err(self.error("unpaired surrogate"));
                            }
                            0x10000 + ((hi - 0xd800) << 10) + (lo - 0xdc00)
                        } else {
                            hi
                        };
                        match char::from_u32(c) {
                            Some(c) => out.push(c),
                            None => return Err(self.error("invalid escape")),
                        }
                    }
                    _ => return Err(self.error("invalid escape")),
                },
                Some(b) if b < 0x20 => {
                    return Err(self.error("control character in string"));
                }
                Some(b) => {
                    // Re-walk multi-byte UTF-8 sequences from the source.
                    if b < 0x80 {
                        out.push(b as char);
                    } else {
                        let start = self.pos - 1;
                        let width = utf8_width(b);
                        for _ in 1..width {
                            self.bump();
                        }
                        let chunk = self
                            .bytes
                            .get(start..start + width)
                            .and_then(|c| std::str::from_utf8(c).ok())
                            .ok_or_else(|| self.error("invalid UTF-8"))?;
                        out.push_str(chunk);
                    }
                }
            }
        }
    }

    fn parse_hex4(&mut self) -> Result<u32, Error> {
        let mut v = 0u32;
        for _ in 0..4 {
            let b = self.bump().ok_or_else(|| self.error("invalid escape"))?;
            let d = (b as char)
                .to_digit(16)
                .ok_or_else(|| self.error("invalid escape"))?;
            v = v * 16 + d;
        }
        Ok(v)
    }

    fn parse_array(&mut self, rt: &mut Runtime) -> Result<Value, Error> {
        self.expect(b'[')?;
        let arr = rt.create_array()?;
        rt.gc_temp_roots.push(arr);
        let result = (|| {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.bump();
                return Ok(arr);
            }
            let mut index = 0u32;
            loop {
                let v = self.parse_value(rt)?;
                rt.array_set(arr, index, v)?;
                index += 1;
                self.skip_ws();
                match self.bump() {
                    Some(b',') => continue,
                    Some(b']') => return Ok(arr),
                    _ => return Err(self.error("expected ',' or ']'")),
                }
            }
        })();
        rt.gc_temp_roots.pop();
        result
    }

    fn parse_object(&mut self, rt: &mut Runtime) -> Result<Value, Error> {
        self.expect(b'{')?;
        let obj = rt.create_object()?;
        rt.gc_temp_roots.push(obj);
        let result = (|| {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.bump();
                return Ok(obj);
            }
            loop {
                self.skip_ws();
                let name = self.parse_string()?;
                self.skip_ws();
                self.expect(b':')?;
                let v = self.parse_value(rt)?;
                rt.set_prop(obj, &name, v)?;
                self.skip_ws();
                match self.bump() {
                    Some(b',') => continue,
                    Some(b'}') => return Ok(obj),
                    _ => return Err(self.error("expected ',' or '}'")),
                }
            }
        })();
        rt.gc_temp_roots.pop();
        result
    }
}

fn utf8_width(b: u8) -> usize {
    match b {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}
