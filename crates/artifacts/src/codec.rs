//! Binary array codec
//!
//! Writes arrays in the NPY 1.0 layout:
//!
//! ```text
//! \x93NUMPY | major minor | header_len (u16 LE) | header text | payload
//! ```
//!
//! The header text is a dict literal such as
//! `{'descr': '<f8', 'fortran_order': False, 'shape': (3, 2), }`, padded with
//! spaces and a trailing newline so the payload starts on a 64-byte boundary.
//!
//! Decoding only understands headers this encoder produces: it reads the
//! length at byte 8, parses just the dict, then reinterprets the rest of the
//! blob as the declared element type. It is not a general NPY reader.

use crate::{ArrayHeader, ArtifactError, DType, NdArray, Result};

pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

const VERSION: [u8; 2] = [1, 0];
/// Offset of the header-length field (magic + version).
const LEN_OFFSET: usize = 8;
const HEADER_START: usize = LEN_OFFSET + 2;
const ALIGN: usize = 64;

pub fn encode(array: &NdArray) -> Result<Vec<u8>> {
    let mut text = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        array.dtype().descr(),
        shape_literal(array.shape()),
    );

    // header text always ends with '\n'
    let unpadded = HEADER_START + text.len() + 1;
    let pad = (ALIGN - unpadded % ALIGN) % ALIGN;
    text.extend(std::iter::repeat(' ').take(pad));
    text.push('\n');

    let header_len = u16::try_from(text.len()).map_err(|_| {
        ArtifactError::MalformedHeader(format!("header too long ({} bytes)", text.len()))
    })?;

    let mut out = Vec::with_capacity(HEADER_START + text.len() + array.as_bytes().len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(array.as_bytes());
    Ok(out)
}

pub fn decode(blob: &[u8]) -> Result<NdArray> {
    if blob.len() < HEADER_START || &blob[..MAGIC.len()] != MAGIC {
        return Err(malformed("missing magic prefix"));
    }
    if blob[MAGIC.len()] != VERSION[0] {
        return Err(malformed(format!(
            "unsupported version {}.{}",
            blob[MAGIC.len()],
            blob[MAGIC.len() + 1]
        )));
    }

    let header_len = u16::from_le_bytes([blob[LEN_OFFSET], blob[LEN_OFFSET + 1]]) as usize;
    let payload_start = HEADER_START + header_len;
    if payload_start > blob.len() {
        return Err(malformed(format!(
            "header length {header_len} runs past end of blob ({} bytes)",
            blob.len()
        )));
    }

    let header = parse_header(&blob[HEADER_START..payload_start])?;
    NdArray::from_raw(header, blob[payload_start..].to_vec())
        .map_err(|e| malformed(e.to_string()))
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn malformed(msg: impl Into<String>) -> ArtifactError {
    ArtifactError::MalformedHeader(msg.into())
}

enum Literal<'a> {
    Str(&'a str),
    Bool(bool),
    Tuple(Vec<usize>),
}

/// Parser for the restricted dict literal written by [`encode`].
struct HeaderParser<'a> {
    text: &'a str,
    pos: usize,
}

fn parse_header(raw: &[u8]) -> Result<ArrayHeader> {
    let text = std::str::from_utf8(raw).map_err(|_| malformed("header is not ASCII"))?;
    let mut p = HeaderParser { text, pos: 0 };

    let mut descr: Option<&str> = None;
    let mut shape: Option<Vec<usize>> = None;
    let mut fortran_order: Option<bool> = None;

    p.skip_ws();
    p.expect('{')?;
    loop {
        p.skip_ws();
        if p.eat('}') {
            break;
        }
        let key = p.string()?;
        p.skip_ws();
        p.expect(':')?;
        p.skip_ws();
        let value = p.value()?;

        match (key, value) {
            ("descr", Literal::Str(s)) if descr.is_none() => descr = Some(s),
            ("shape", Literal::Tuple(t)) if shape.is_none() => shape = Some(t),
            ("fortran_order", Literal::Bool(b)) if fortran_order.is_none() => {
                fortran_order = Some(b)
            }
            (key, _) => return Err(malformed(format!("unexpected or repeated key '{key}'"))),
        }

        p.skip_ws();
        if !p.eat(',') {
            p.skip_ws();
            p.expect('}')?;
            break;
        }
    }
    p.skip_ws();
    if p.pos != p.text.len() {
        return Err(malformed("trailing characters after header dict"));
    }

    if fortran_order == Some(true) {
        return Err(malformed("column-major arrays are not supported"));
    }
    let descr = descr.ok_or_else(|| malformed("missing 'descr'"))?;
    let shape = shape.ok_or_else(|| malformed("missing 'shape'"))?;
    let dtype =
        DType::from_descr(descr).ok_or_else(|| malformed(format!("unsupported descr '{descr}'")))?;

    Ok(ArrayHeader { dtype, shape })
}

impl<'a> HeaderParser<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(malformed(format!("expected '{c}' at offset {}", self.pos)))
        }
    }

    fn string(&mut self) -> Result<&'a str> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(malformed(format!("expected string at offset {}", self.pos))),
        };
        self.pos += 1;
        let rest = &self.text[self.pos..];
        let end = rest
            .find(quote)
            .ok_or_else(|| malformed("unterminated string"))?;
        let s = &rest[..end];
        self.pos += end + 1;
        Ok(s)
    }

    fn value(&mut self) -> Result<Literal<'a>> {
        match self.peek() {
            Some('\'' | '"') => Ok(Literal::Str(self.string()?)),
            Some('(') => Ok(Literal::Tuple(self.tuple()?)),
            _ if self.text[self.pos..].starts_with("True") => {
                self.pos += 4;
                Ok(Literal::Bool(true))
            }
            _ if self.text[self.pos..].starts_with("False") => {
                self.pos += 5;
                Ok(Literal::Bool(false))
            }
            _ => Err(malformed(format!("unexpected value at offset {}", self.pos))),
        }
    }

    fn tuple(&mut self) -> Result<Vec<usize>> {
        self.expect('(')?;
        let mut dims = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                return Ok(dims);
            }
            dims.push(self.integer()?);
            self.skip_ws();
            if !self.eat(',') {
                self.skip_ws();
                self.expect(')')?;
                return Ok(dims);
            }
        }
    }

    fn integer(&mut self) -> Result<usize> {
        let rest = &self.text[self.pos..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(malformed(format!("expected dimension at offset {}", self.pos)));
        }
        let n = rest[..digits]
            .parse()
            .map_err(|_| malformed(format!("dimension '{}' out of range", &rest[..digits])))?;
        self.pos += digits;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_with_header(text: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION);
        out.extend_from_slice(&(text.len() as u16).to_le_bytes());
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_header_layout_is_aligned() {
        let a = NdArray::from_vec(vec![3, 2], vec![0.5f64; 6]).unwrap();
        let blob = encode(&a).unwrap();

        assert_eq!(&blob[..6], MAGIC);
        let header_len = u16::from_le_bytes([blob[8], blob[9]]) as usize;
        assert_eq!((HEADER_START + header_len) % ALIGN, 0);
        assert_eq!(blob[HEADER_START + header_len - 1], b'\n');
        assert_eq!(blob.len(), HEADER_START + header_len + 48);

        let text = std::str::from_utf8(&blob[HEADER_START..HEADER_START + header_len]).unwrap();
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (3, 2), }"));
    }

    #[test]
    fn test_shape_literals() {
        assert_eq!(shape_literal(&[]), "()");
        assert_eq!(shape_literal(&[4]), "(4,)");
        assert_eq!(shape_literal(&[4, 0, 2]), "(4, 0, 2)");
    }

    #[test]
    fn test_decode_scalar_and_empty() {
        let s = NdArray::scalar(3.25f32);
        assert_eq!(decode(&encode(&s).unwrap()).unwrap(), s);

        let e = NdArray::from_vec::<i64>(vec![0, 5], vec![]).unwrap();
        assert_eq!(decode(&encode(&e).unwrap()).unwrap(), e);
    }

    #[test]
    fn test_decode_rejects_payload_length_mismatch() {
        let a = NdArray::from_vec(vec![4], vec![1u32, 2, 3, 4]).unwrap();
        let mut blob = encode(&a).unwrap();
        blob.pop();
        assert!(matches!(decode(&blob), Err(ArtifactError::MalformedHeader(_))));
    }

    #[test]
    fn test_decode_rejects_missing_keys() {
        let no_shape = blob_with_header("{'descr': '<f8', }\n", &[0u8; 8]);
        assert!(matches!(decode(&no_shape), Err(ArtifactError::MalformedHeader(_))));

        let no_descr = blob_with_header("{'shape': (1,), }\n", &[0u8; 8]);
        assert!(matches!(decode(&no_descr), Err(ArtifactError::MalformedHeader(_))));
    }

    #[test]
    fn test_decode_accepts_minimal_dict() {
        let blob = blob_with_header("{'shape': (2,), 'descr': '<i2'}", &[1, 0, 2, 0]);
        let a = decode(&blob).unwrap();
        assert_eq!(a.to_vec::<i16>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_decode_rejects_foreign_headers() {
        let fortran = blob_with_header(
            "{'descr': '<f8', 'fortran_order': True, 'shape': (1,), }\n",
            &[0u8; 8],
        );
        assert!(matches!(decode(&fortran), Err(ArtifactError::MalformedHeader(_))));

        let record = blob_with_header("{'descr': [('a', '<f8')], 'shape': (1,), }\n", &[0u8; 8]);
        assert!(matches!(decode(&record), Err(ArtifactError::MalformedHeader(_))));

        let big_endian = blob_with_header("{'descr': '>f8', 'shape': (1,), }\n", &[0u8; 8]);
        assert!(matches!(decode(&big_endian), Err(ArtifactError::MalformedHeader(_))));

        let extra = blob_with_header("{'descr': '<f8', 'shape': (1,), 'x': 1}\n", &[0u8; 8]);
        assert!(matches!(decode(&extra), Err(ArtifactError::MalformedHeader(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert!(decode(b"\x93NUMPY").is_err());
        assert!(decode(b"not an array at all").is_err());

        let a = NdArray::from_slice(&[1u8, 2, 3]);
        let blob = encode(&a).unwrap();
        assert!(decode(&blob[..20]).is_err());
    }
}
