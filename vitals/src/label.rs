//! Label sets and their declared value types.
//!
//! A label set maps label name → label value. Names are unique within a
//! set; the canonical representation is ordered by name so that
//! formatting (scrape text, UDP tags) is deterministic. Label value types
//! are a closed tagged variant (string, int, bool, float) rather than
//! dynamic typing.

use std::collections::BTreeMap;
use std::fmt;

/// The declared type of a label's value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LabelType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// Boolean.
    Bool,
    /// 64-bit float.
    Float64,
}

/// A concrete label value, tagged with its runtime type.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelValue {
    /// A string value.
    String(String),
    /// An integer value.
    Int64(i64),
    /// A boolean value.
    Bool(bool),
    /// A float value.
    Float64(f64),
}

impl LabelValue {
    /// The runtime type tag of this value.
    pub fn kind(&self) -> LabelType {
        match self {
            LabelValue::String(_) => LabelType::String,
            LabelValue::Int64(_) => LabelType::Int64,
            LabelValue::Bool(_) => LabelType::Bool,
            LabelValue::Float64(_) => LabelType::Float64,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::String(s) => f.write_str(s),
            LabelValue::Int64(v) => write!(f, "{v}"),
            LabelValue::Bool(v) => write!(f, "{v}"),
            LabelValue::Float64(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        LabelValue::String(v.to_owned())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        LabelValue::String(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::Int64(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        LabelValue::Bool(v)
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::Float64(v)
    }
}

/// An ordered, deduplicated set of (name, value) pairs.
///
/// Ordering is by label name, which makes equality structural and
/// formatting deterministic without a separate sort at render time.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LabelSet {
    entries: Vec<(String, CanonicalValue)>,
}

/// A hashable/orderable stand-in for [`LabelValue`], used internally once a
/// label set has been validated against its schema (floats can't derive
/// `Eq`/`Hash`/`Ord` directly, so we canonicalize via the bit pattern).
#[derive(Clone, Debug)]
enum CanonicalValue {
    String(String),
    Int64(i64),
    Bool(bool),
    Float64(u64),
}

impl PartialEq for CanonicalValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CanonicalValue::String(a), CanonicalValue::String(b)) => a == b,
            (CanonicalValue::Int64(a), CanonicalValue::Int64(b)) => a == b,
            (CanonicalValue::Bool(a), CanonicalValue::Bool(b)) => a == b,
            (CanonicalValue::Float64(a), CanonicalValue::Float64(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for CanonicalValue {}

impl std::hash::Hash for CanonicalValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            CanonicalValue::String(v) => v.hash(state),
            CanonicalValue::Int64(v) => v.hash(state),
            CanonicalValue::Bool(v) => v.hash(state),
            CanonicalValue::Float64(v) => v.hash(state),
        }
    }
}

impl PartialOrd for CanonicalValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(v: &CanonicalValue) -> u8 {
            match v {
                CanonicalValue::String(_) => 0,
                CanonicalValue::Int64(_) => 1,
                CanonicalValue::Bool(_) => 2,
                CanonicalValue::Float64(_) => 3,
            }
        }
        match (self, other) {
            (CanonicalValue::String(a), CanonicalValue::String(b)) => a.cmp(b),
            (CanonicalValue::Int64(a), CanonicalValue::Int64(b)) => a.cmp(b),
            (CanonicalValue::Bool(a), CanonicalValue::Bool(b)) => a.cmp(b),
            (CanonicalValue::Float64(a), CanonicalValue::Float64(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<&LabelValue> for CanonicalValue {
    fn from(v: &LabelValue) -> Self {
        match v {
            LabelValue::String(s) => CanonicalValue::String(s.clone()),
            LabelValue::Int64(v) => CanonicalValue::Int64(*v),
            LabelValue::Bool(v) => CanonicalValue::Bool(*v),
            LabelValue::Float64(v) => CanonicalValue::Float64(v.to_bits()),
        }
    }
}

impl From<&CanonicalValue> for LabelValue {
    fn from(v: &CanonicalValue) -> Self {
        match v {
            CanonicalValue::String(s) => LabelValue::String(s.clone()),
            CanonicalValue::Int64(v) => LabelValue::Int64(*v),
            CanonicalValue::Bool(v) => LabelValue::Bool(*v),
            CanonicalValue::Float64(bits) => LabelValue::Float64(f64::from_bits(*bits)),
        }
    }
}

impl LabelSet {
    /// Builds a canonical label set from an arbitrary iterator of pairs,
    /// sorting by name. Does not validate against any schema.
    pub fn new(pairs: impl IntoIterator<Item = (String, LabelValue)>) -> Self {
        let mut entries: Vec<(String, CanonicalValue)> =
            pairs.into_iter().map(|(k, v)| (k, CanonicalValue::from(&v))).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        Self { entries }
    }

    /// The empty label set, used by scalar metrics.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Whether this label set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the set in canonical (name-sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, LabelValue)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), LabelValue::from(v)))
    }

    /// The set of label names present, for schema comparison.
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn get(&self, name: &str) -> Option<LabelValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| LabelValue::from(v))
    }

    /// Renders the `{k="v",...}` clause used by the scrape formatter, with
    /// values escaped (`\` → `\\`, `"` → `\"`, newline → the two-character
    /// escape `\n`).
    pub fn formatted(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut out = String::from("{");
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push_str("=\"");
            escape_into(&LabelValue::from(value).to_string(), &mut out);
            out.push('"');
        }
        out.push('}');
        out
    }

    /// Renders the `|#k:v,...` dogstatsd tag suffix (no escaping; callers
    /// must avoid `,`, `:`, `|`, `#` in values).
    pub fn dogstatsd_tags(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut out = String::from("|#");
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push(':');
            out.push_str(&LabelValue::from(value).to_string());
        }
        out
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
}

/// A declared schema for a grouped metric's labels: the set of required
/// names and each one's value type.
#[derive(Clone, Debug)]
pub struct LabelSchema {
    fields: BTreeMap<String, LabelType>,
}

impl LabelSchema {
    /// Builds a schema from (name, type) pairs.
    pub fn new(fields: impl IntoIterator<Item = (String, LabelType)>) -> Self {
        Self { fields: fields.into_iter().collect() }
    }

    /// Returns `true` if the given label set satisfies this schema exactly:
    /// same set of names, no extras, no omissions, and each value's runtime
    /// type matches the declared type.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        if labels.names().count() != self.fields.len() {
            return false;
        }
        for (name, expected_ty) in &self.fields {
            match labels.get(name) {
                Some(value) if value.kind() == *expected_ty => {}
                _ => return false,
            }
        }
        true
    }

    pub(crate) fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ordering() {
        let set = LabelSet::new([
            ("b".to_owned(), LabelValue::from(2i64)),
            ("a".to_owned(), LabelValue::from(1i64)),
        ]);
        let names: Vec<_> = set.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn formatted_escapes_values() {
        let set = LabelSet::new([("msg".to_owned(), LabelValue::from("a\"b\\c\nd"))]);
        assert_eq!(set.formatted(), r#"{msg="a\"b\\c\nd"}"#);
    }

    #[test]
    fn schema_requires_exact_match() {
        let schema = LabelSchema::new([
            ("action".to_owned(), LabelType::String),
            ("code".to_owned(), LabelType::Int64),
        ]);

        let good = LabelSet::new([
            ("action".to_owned(), LabelValue::from("get")),
            ("code".to_owned(), LabelValue::from(200i64)),
        ]);
        assert!(schema.matches(&good));

        let missing = LabelSet::new([("action".to_owned(), LabelValue::from("get"))]);
        assert!(!schema.matches(&missing));

        let wrong_type = LabelSet::new([
            ("action".to_owned(), LabelValue::from("get")),
            ("code".to_owned(), LabelValue::from("200")),
        ]);
        assert!(!schema.matches(&wrong_type));

        let extra = LabelSet::new([
            ("action".to_owned(), LabelValue::from("get")),
            ("code".to_owned(), LabelValue::from(200i64)),
            ("extra".to_owned(), LabelValue::from(true)),
        ]);
        assert!(!schema.matches(&extra));
    }
}
