/// Text parameter tables (Agilent `procpar`, Bruker `acqus`)
///
/// Both files are tokenized into a name → value-token map. Coercion to
/// numbers or strings happens later, field by field, in the vendor
/// parsers through the typed getters below.

use std::collections::HashMap;

use crate::error::{NmrError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    values: HashMap<String, Vec<String>>,
}

impl ParameterTable {
    /// Tokenize an Agilent/Varian `procpar` file.
    ///
    /// A line whose first character is alphabetic starts a parameter (the
    /// first word is its name, the rest are attributes). The next line is
    /// the value row: an element count followed by the values.
    pub fn from_procpar(content: &str) -> Self {
        let mut values = HashMap::new();
        let mut current: Option<String> = None;
        let mut awaiting_values = false;

        for line in content.lines() {
            let starts_key = line.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            if starts_key {
                current = line.split_whitespace().next().map(str::to_string);
                awaiting_values = true;
                continue;
            }
            if !awaiting_values {
                continue;
            }
            if let Some(key) = current.as_ref() {
                let tokens = tokenize(line);
                // first token is the element count
                let row: Vec<String> = tokens.into_iter().skip(1).collect();
                values.insert(key.clone(), row);
            }
            awaiting_values = false;
        }

        Self { values }
    }

    /// Tokenize a Bruker JCAMP-style `acqus` file.
    ///
    /// `##$NAME= value` lines start a parameter; continuation lines (array
    /// bodies) are appended to the previous value.
    pub fn from_acqus(content: &str) -> Self {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("##") {
                current = None;
                let Some(eq_pos) = rest.find('=') else {
                    continue;
                };
                let key = rest[..eq_pos].trim().trim_end_matches(':');
                let key = key.strip_prefix('$').unwrap_or(key).to_string();
                let value = rest[eq_pos + 1..].trim();
                // array declarations "(0..15)" carry their values on the next lines
                let tokens = if value.starts_with('(') {
                    Vec::new()
                } else {
                    tokenize(value)
                };
                values.insert(key.clone(), tokens);
                current = Some(key);
            } else if line.starts_with("$$") {
                current = None;
            } else if let Some(key) = current.as_ref() {
                if let Some(entry) = values.get_mut(key) {
                    entry.extend(tokenize(line));
                }
            }
        }

        Self { values }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All value tokens of a parameter
    pub fn tokens(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// First value token, if the parameter exists and has one
    pub fn first(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn string(&self, key: &str) -> Result<String> {
        self.first(key)
            .map(str::to_string)
            .ok_or_else(|| NmrError::MissingParameter(key.to_string()))
    }

    pub fn f64(&self, key: &str) -> Result<f64> {
        let raw = self
            .first(key)
            .ok_or_else(|| NmrError::MissingParameter(key.to_string()))?;
        raw.parse::<f64>().map_err(|_| NmrError::InvalidParameter {
            name: key.to_string(),
            value: raw.to_string(),
        })
    }

    /// Integer field; accepts float spellings of whole numbers ("65536.0").
    pub fn i64(&self, key: &str) -> Result<i64> {
        let raw = self
            .first(key)
            .ok_or_else(|| NmrError::MissingParameter(key.to_string()))?;
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
            _ => Err(NmrError::InvalidParameter {
                name: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Like [`ParameterTable::f64`] but absence is not an error.
    pub fn optional_f64(&self, key: &str) -> Result<Option<f64>> {
        if self.first(key).is_none() {
            return Ok(None);
        }
        self.f64(key).map(Some)
    }

    pub fn optional_i64(&self, key: &str) -> Result<Option<i64>> {
        if self.first(key).is_none() {
            return Ok(None);
        }
        self.i64(key).map(Some)
    }
}

/// Whitespace tokenizer that keeps `"..."` and `<...>` groups together and
/// strips their delimiters.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let closing = match c {
            '"' => Some('"'),
            '<' => Some('>'),
            _ => None,
        };
        let mut token = String::new();
        if let Some(close) = closing {
            chars.next();
            for ch in chars.by_ref() {
                if ch == close {
                    break;
                }
                token.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCPAR: &str = r#"at 1 1 8190 0 0 2 1 11 1 64
1 2.045
0
samplename 2 2 127 0 0 2 1 0 1 64
1 "ethyl benzene in CDCl3"
0
sfrq 1 1 1e+09 0 0 2 1 11 1 64
1 399.7956
0
tn 2 2 8 0 0 2 1 11 1 64
1 "H1"
0
"#;

    #[test]
    fn test_procpar_values() {
        let table = ParameterTable::from_procpar(PROCPAR);
        assert_eq!(table.len(), 4);
        assert!((table.f64("at").unwrap() - 2.045).abs() < 1e-12);
        assert!((table.f64("sfrq").unwrap() - 399.7956).abs() < 1e-12);
        assert_eq!(table.string("samplename").unwrap(), "ethyl benzene in CDCl3");
        assert_eq!(table.string("tn").unwrap(), "H1");
    }

    #[test]
    fn test_missing_and_invalid() {
        let table = ParameterTable::from_procpar(PROCPAR);
        assert!(matches!(table.f64("sw"), Err(NmrError::MissingParameter(k)) if k == "sw"));
        assert!(matches!(table.f64("tn"), Err(NmrError::InvalidParameter { .. })));
        assert_eq!(table.optional_f64("lockfreq_").unwrap(), None);
    }

    #[test]
    fn test_acqus_values() {
        let content = r#"##TITLE= Parameter file
##JCAMP-DX= 5.00
##$SW_h= 8012.820
##$TD= 65536
##$NUC1= <1H>
##$SOLVENT= <CDCl3>
##$P= (0..3)
10 12.5 0 0
$$ /opt/data/acqus
##END=
"#;
        let table = ParameterTable::from_acqus(content);
        assert!((table.f64("SW_h").unwrap() - 8012.82).abs() < 1e-9);
        assert_eq!(table.i64("TD").unwrap(), 65536);
        assert_eq!(table.string("NUC1").unwrap(), "1H");
        assert_eq!(table.string("SOLVENT").unwrap(), "CDCl3");
        assert_eq!(table.tokens("P").unwrap(), ["10", "12.5", "0", "0"]);
        assert_eq!(table.first("JCAMP-DX"), Some("5.00"));
    }

    #[test]
    fn test_tokenize_groups() {
        assert_eq!(tokenize(r#"1 "a b" c"#), vec!["1", "a b", "c"]);
        assert_eq!(tokenize("<zg 30> 2"), vec!["zg 30", "2"]);
        assert_eq!(tokenize("<>"), vec![""]);
    }

    #[test]
    fn test_integer_spelled_as_float() {
        let table = ParameterTable::from_acqus("##$TD= 32768.0\n##$NS= 1.5\n");
        assert_eq!(table.i64("TD").unwrap(), 32768);
        assert!(matches!(table.i64("NS"), Err(NmrError::InvalidParameter { .. })));
    }
}
