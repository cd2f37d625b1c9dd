use std::fmt;

/// Primitive type a field can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    Str,
}

impl TypeTag {
    /// Parse the name inside `<...>`, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "int" => Some(TypeTag::Int),
            "float" => Some(TypeTag::Float),
            "str" => Some(TypeTag::Str),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

/// Expected value for a field in a rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Type(TypeTag),
    /// Regex source, matched against the whole stringified value
    Pattern(String),
    /// Exact value the stringified field must equal
    Literal(String),
    Object(RuleObject),
    /// Only the first element is used as the schema for every item
    Array(Vec<RuleValue>),
}

impl RuleValue {
    /// Classify a quoted or bare string that may spell a typed literal.
    pub fn from_text(text: String) -> Self {
        if text.len() >= 2 && text.starts_with('<') && text.ends_with('>') {
            if let Some(tag) = TypeTag::from_name(&text[1..text.len() - 1]) {
                return RuleValue::Type(tag);
            }
        }
        if text.len() >= 2
            && text.starts_with('/')
            && text.ends_with('/')
            && regex::Regex::new(&text[1..text.len() - 1]).is_ok()
        {
            return RuleValue::Pattern(text[1..text.len() - 1].to_string());
        }
        RuleValue::Literal(text)
    }

    /// Rule source has no spelling for a literal shaped like `<int>` or `/re/`,
    /// so such literals are stored as the typed value they compile to.
    fn normalized(self) -> Self {
        match self {
            RuleValue::Literal(text) => RuleValue::from_text(text),
            RuleValue::Array(items) => {
                RuleValue::Array(items.into_iter().map(RuleValue::normalized).collect())
            }
            other => other,
        }
    }
}

/// One level of a rule tree. Keys keep their `!` prefix when required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleObject {
    entries: Vec<(String, RuleValue)>,
}

impl RuleObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field rule; a repeated key replaces the earlier one.
    pub fn insert(&mut self, key: impl Into<String>, value: RuleValue) {
        let key = key.into();
        let value = value.normalized();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&RuleValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Type(tag) => write!(f, "{}", tag),
            RuleValue::Pattern(p) => write!(f, "/{}/", p.replace('/', "\\/")),
            RuleValue::Literal(s) => write_quoted(f, s),
            RuleValue::Object(o) => write!(f, "{}", o),
            RuleValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for RuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(" ")?;
            write_quoted(f, key)?;
            write!(f, ": {}", value)?;
        }
        if !self.entries.is_empty() {
            f.write_str(" ")?;
        }
        f.write_str("}")
    }
}
