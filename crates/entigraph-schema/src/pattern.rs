use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The six relationship operators. Literals are part of the schema input
/// format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationOperator {
    Forward,
    ForwardFuzzy,
    Backward,
    BackwardFuzzy,
    Bidirectional,
    BidirectionalFuzzy,
}

impl RelationOperator {
    /// Longest symbols first so scanning never mistakes `<->` for `<-`.
    pub const ALL: [RelationOperator; 6] = [
        RelationOperator::BidirectionalFuzzy,
        RelationOperator::Bidirectional,
        RelationOperator::ForwardFuzzy,
        RelationOperator::BackwardFuzzy,
        RelationOperator::Forward,
        RelationOperator::Backward,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            RelationOperator::Forward => "->",
            RelationOperator::ForwardFuzzy => "~>",
            RelationOperator::Backward => "<-",
            RelationOperator::BackwardFuzzy => "<~",
            RelationOperator::Bidirectional => "<->",
            RelationOperator::BidirectionalFuzzy => "<~>",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            RelationOperator::Forward | RelationOperator::ForwardFuzzy => Direction::Forward,
            RelationOperator::Backward | RelationOperator::BackwardFuzzy => Direction::Backward,
            RelationOperator::Bidirectional | RelationOperator::BidirectionalFuzzy => {
                Direction::Bidirectional
            }
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        matches!(
            self,
            RelationOperator::ForwardFuzzy
                | RelationOperator::BackwardFuzzy
                | RelationOperator::BidirectionalFuzzy
        )
    }

    pub fn is_bidirectional(&self) -> bool {
        self.direction() == Direction::Bidirectional
    }

    pub fn match_mode(&self) -> MatchMode {
        if self.is_fuzzy() {
            MatchMode::Fuzzy
        } else {
            MatchMode::Exact
        }
    }
}

impl fmt::Display for RelationOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for RelationOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| format!("unknown relationship operator: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Bidirectional,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Bidirectional => "bidirectional",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    Fuzzy,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMode::Exact => "exact",
            MatchMode::Fuzzy => "fuzzy",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Date,
}

impl FromStr for Primitive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "text" => Ok(Primitive::String),
            "number" | "float" => Ok(Primitive::Number),
            "integer" | "int" => Ok(Primitive::Integer),
            "boolean" | "bool" => Ok(Primitive::Boolean),
            "date" | "datetime" => Ok(Primitive::Date),
            other => Err(format!("unknown primitive type: {other}")),
        }
    }
}

/// Modifier flags set by trailing characters on a type token:
/// `!` required, `?` optional, `#` indexed, `^` unique, `[]` array.
///
/// Required and optional are mutually exclusive; when both appear the parser
/// warns and optional wins, never blocking entity creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub required: bool,
    pub optional: bool,
    pub indexed: bool,
    pub unique: bool,
    pub array: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl FilterOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOp,
    pub value: Value,
}

/// Full description of a relationship declaration, carried on the owning
/// entity's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub operator: RelationOperator,
    pub target: String,
    /// Human-readable text preceding the operator, used as prompt context
    /// for generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Field name on the target that points back at the declaring type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_param: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub filters: Vec<Filter>,
    /// Fixed cardinality for array cascades, from a `[n]` suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl RelationshipSpec {
    pub fn direction(&self) -> Direction {
        self.operator.direction()
    }

    pub fn match_mode(&self) -> MatchMode {
        self.operator.match_mode()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.operator.is_fuzzy()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.operator.is_bidirectional()
    }
}

/// Closed classification of a parsed field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(Primitive),
    Enum { values: Vec<String> },
    Relationship(RelationshipSpec),
    Generative { template: String },
    Object { fields: BTreeMap<String, FieldDescriptor> },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub modifiers: Modifiers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    fn plain_string(name: &str, description: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar(Primitive::String),
            modifiers: Modifiers::default(),
            default: None,
            description,
        }
    }

    pub fn relationship(&self) -> Option<&RelationshipSpec> {
        match &self.kind {
            FieldKind::Relationship(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, FieldKind::Relationship(_))
    }
}

static TYPE_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(string|number|integer|boolean|date)\s*\)\s*$").unwrap());
static GENERATIVE_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Za-z_][A-Za-z0-9_.]*\}").unwrap());
static FILTER_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_][\w.]*)\s*(!=|>=|<=|=|>|<)\s*(.+?)\s*$").unwrap());
static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Parses one definition entry into a typed descriptor.
///
/// Parsing is permissive: anything it cannot classify degrades to a plain
/// string field so that schema registration never aborts on one bad pattern.
pub fn parse(name: &str, input: &Value) -> FieldDescriptor {
    match input {
        Value::Null => FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Disabled,
            modifiers: Modifiers::default(),
            default: None,
            description: None,
        },
        Value::String(s) => parse_string(name, s),
        Value::Array(items) => match items.as_slice() {
            // Single-element array marks an array of the parsed inner type.
            [inner] => {
                let mut descriptor = parse(name, inner);
                descriptor.modifiers.array = true;
                descriptor
            }
            _ => {
                warn!(field = name, "array pattern must have exactly one element");
                let mut descriptor = FieldDescriptor::plain_string(name, None);
                descriptor.modifiers.array = true;
                descriptor
            }
        },
        Value::Object(map) => {
            let fields = map
                .iter()
                .map(|(key, value)| (key.clone(), parse(key, value)))
                .collect();
            FieldDescriptor {
                name: name.to_string(),
                kind: FieldKind::Object { fields },
                modifiers: Modifiers::default(),
                default: None,
                description: None,
            }
        }
        // Bare literals become a string field carrying that default.
        other => FieldDescriptor {
            default: Some(other.clone()),
            ..FieldDescriptor::plain_string(name, None)
        },
    }
}

fn parse_string(name: &str, pattern: &str) -> FieldDescriptor {
    let (body, default) = split_default(pattern);

    if let Some((position, operator)) = find_operator(body) {
        return parse_relationship(name, body, position, operator, default);
    }

    if let Some(values) = split_enum(body) {
        return FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Enum { values },
            modifiers: Modifiers::default(),
            default,
            description: None,
        };
    }

    // `{var}` placeholders make the field generative; empty braces do not.
    if GENERATIVE_VAR.is_match(body) {
        return FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Generative {
                template: body.trim().to_string(),
            },
            modifiers: Modifiers::default(),
            default,
            description: None,
        };
    }

    parse_scalar(name, body, default)
}

fn parse_scalar(name: &str, body: &str, default: Option<Value>) -> FieldDescriptor {
    let mut text = body.trim().to_string();
    let mut modifiers = Modifiers::default();

    strip_modifiers(&mut text, &mut modifiers, name);

    // Trailing `?`/`!` on free text ("Is it active?") is punctuation, not a
    // modifier; only a typed token carries modifier characters.
    let typed = TYPE_HINT.is_match(&text) || text.parse::<Primitive>().is_ok();
    if !typed && modifiers != Modifiers::default() {
        text = body.trim().to_string();
        modifiers = Modifiers::default();
    }

    let mut primitive = None;
    let mut description = None;

    if let Some(captures) = TYPE_HINT.captures(&text) {
        primitive = captures[1].parse::<Primitive>().ok();
        let hint_start = captures.get(0).map(|m| m.start()).unwrap_or(0);
        let before = text[..hint_start].trim();
        if !before.is_empty() {
            description = Some(before.to_string());
        }
    } else if let Ok(p) = text.parse::<Primitive>() {
        primitive = Some(p);
    } else if !text.is_empty() {
        description = Some(text.clone());
    }

    FieldDescriptor {
        name: name.to_string(),
        kind: FieldKind::Scalar(primitive.unwrap_or(Primitive::String)),
        modifiers,
        default,
        description,
    }
}

fn parse_relationship(
    name: &str,
    body: &str,
    position: usize,
    operator: RelationOperator,
    default: Option<Value>,
) -> FieldDescriptor {
    let before = &body[..position];
    let after = &body[position + operator.symbol().len()..];

    let (route_param, prompt) = split_route_param(before);

    let mut target = after.trim().to_string();
    let mut modifiers = Modifiers::default();
    let mut filters = Vec::new();
    let mut count = None;

    strip_modifiers(&mut target, &mut modifiers, name);

    if let Some(open) = target.rfind('[') {
        if target.ends_with(']') {
            let inner = target[open + 1..target.len() - 1].trim().to_string();
            target.truncate(open);
            if inner.is_empty() {
                modifiers.array = true;
            } else if let Ok(n) = inner.parse::<usize>() {
                modifiers.array = true;
                count = Some(n);
            } else {
                filters = parse_filters(&inner);
            }
        }
    }

    strip_modifiers(&mut target, &mut modifiers, name);

    // `Target.field` names the backreference field on the target type.
    let backref = match target.split_once('.') {
        Some((head, tail)) if IDENT.is_match(tail) => {
            let backref = tail.to_string();
            target = head.to_string();
            Some(backref)
        }
        _ => None,
    };

    let target = target.trim().to_string();
    if target.is_empty() || !IDENT.is_match(&target) {
        warn!(field = name, pattern = body, "relationship has no usable target; keeping as string field");
        return FieldDescriptor::plain_string(name, Some(body.trim().to_string()));
    }

    FieldDescriptor {
        name: name.to_string(),
        kind: FieldKind::Relationship(RelationshipSpec {
            operator,
            target,
            prompt,
            backref,
            route_param,
            filters,
            count,
        }),
        modifiers,
        default,
        description: None,
    }
}

/// Parses a `field op value` list, comma separated. Values that lexically
/// match a boolean or number are coerced; everything else stays a string.
pub fn parse_filters(input: &str) -> Vec<Filter> {
    input
        .split(',')
        .filter_map(|clause| {
            let captures = FILTER_EXPR.captures(clause)?;
            let operator = match &captures[2] {
                "=" => FilterOp::Eq,
                "!=" => FilterOp::Ne,
                ">" => FilterOp::Gt,
                ">=" => FilterOp::Ge,
                "<" => FilterOp::Lt,
                "<=" => FilterOp::Le,
                _ => return None,
            };
            Some(Filter {
                field: captures[1].to_string(),
                operator,
                value: coerce_literal(&captures[3]),
            })
        })
        .collect()
}

pub fn coerce_literal(raw: &str) -> Value {
    let raw = raw.trim().trim_matches('"').trim_matches('\'');
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::Number(n.into())
            } else if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

/// Finds the leftmost top-level relationship operator, longest symbol first
/// at each position so `<->` never reads as `<-`.
fn find_operator(body: &str) -> Option<(usize, RelationOperator)> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                for op in RelationOperator::ALL {
                    if body[i..].starts_with(op.symbol()) {
                        return Some((i, op));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on top-level `|`, yielding trimmed enum values; `None` when the
/// string has no top-level pipe.
fn split_enum(body: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut found = false;
    for (i, c) in body.char_indices() {
        match c {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                found = true;
                values.push(body[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if !found {
        return None;
    }
    values.push(body[start..].trim().to_string());
    Some(values.into_iter().filter(|v| !v.is_empty()).collect())
}

/// Splits a trailing top-level ` = literal` default off the pattern body.
fn split_default(pattern: &str) -> (&str, Option<Value>) {
    let mut depth = 0usize;
    for (i, c) in pattern.char_indices() {
        match c {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                let prev_space = pattern[..i].ends_with(' ');
                let next = pattern[i + 1..].trim();
                if prev_space && !next.is_empty() && !next.contains('=') {
                    return (pattern[..i].trim_end(), Some(coerce_literal(next)));
                }
            }
            _ => {}
        }
    }
    (pattern, None)
}

fn split_route_param(before: &str) -> (Option<String>, Option<String>) {
    let trimmed = before.trim();
    if let Some(rest) = trimmed.strip_prefix(':') {
        let (param, tail) = match rest.split_once(char::is_whitespace) {
            Some((param, tail)) => (param, tail.trim()),
            None => (rest, ""),
        };
        let prompt = if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        };
        return (Some(param.to_string()), prompt);
    }
    if trimmed.is_empty() {
        (None, None)
    } else {
        (None, Some(trimmed.to_string()))
    }
}

fn strip_modifiers(text: &mut String, modifiers: &mut Modifiers, field: &str) {
    loop {
        match text.chars().last() {
            Some('!') => modifiers.required = true,
            Some('?') => modifiers.optional = true,
            Some('#') => modifiers.indexed = true,
            Some('^') => modifiers.unique = true,
            _ => break,
        }
        text.pop();
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
    }
    if text.ends_with("[]") {
        modifiers.array = true;
        text.truncate(text.len() - 2);
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
        // Modifiers may sit on either side of the array bracket.
        strip_modifiers(text, modifiers, field);
    }
    if modifiers.required && modifiers.optional {
        warn!(
            field,
            "field marked both required and optional; optional takes precedence"
        );
        modifiers.required = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_str(pattern: &str) -> FieldDescriptor {
        parse("field", &Value::String(pattern.to_string()))
    }

    #[test]
    fn operator_table_is_bit_exact() {
        let expected = [
            (RelationOperator::Forward, "->"),
            (RelationOperator::ForwardFuzzy, "~>"),
            (RelationOperator::Backward, "<-"),
            (RelationOperator::BackwardFuzzy, "<~"),
            (RelationOperator::Bidirectional, "<->"),
            (RelationOperator::BidirectionalFuzzy, "<~>"),
        ];
        for (op, symbol) in expected {
            assert_eq!(op.symbol(), symbol);
            assert_eq!(symbol.parse::<RelationOperator>().unwrap(), op);
        }
    }

    #[test]
    fn operators_recover_direction_and_flags() {
        let cases = [
            ("->Idea", Direction::Forward, false, false),
            ("~>Idea", Direction::Forward, true, false),
            ("<-Idea", Direction::Backward, false, false),
            ("<~Idea", Direction::Backward, true, false),
            ("<->Idea", Direction::Bidirectional, false, true),
            ("<~>Idea", Direction::Bidirectional, true, true),
        ];
        for (pattern, direction, fuzzy, bidirectional) in cases {
            let descriptor = parse_str(pattern);
            let spec = descriptor.relationship().expect(pattern);
            assert_eq!(spec.direction(), direction, "{pattern}");
            assert_eq!(spec.is_fuzzy(), fuzzy, "{pattern}");
            assert_eq!(spec.is_bidirectional(), bidirectional, "{pattern}");
            assert_eq!(spec.target, "Idea", "{pattern}");
        }
    }

    #[test]
    fn prompt_text_precedes_operator() {
        let descriptor = parse_str("What is the core idea? ->Idea");
        let spec = descriptor.relationship().unwrap();
        assert_eq!(spec.prompt.as_deref(), Some("What is the core idea?"));
        assert_eq!(spec.target, "Idea");
    }

    #[test]
    fn route_param_before_operator() {
        let descriptor = parse_str(":slug ->Category");
        let spec = descriptor.relationship().unwrap();
        assert_eq!(spec.route_param.as_deref(), Some("slug"));
        assert!(spec.prompt.is_none());
    }

    #[test]
    fn optional_relationship_modifier() {
        let descriptor = parse_str("->Category?");
        assert!(descriptor.modifiers.optional);
        assert!(!descriptor.modifiers.required);
        assert_eq!(descriptor.relationship().unwrap().target, "Category");
    }

    #[test]
    fn array_relationship_with_count() {
        let descriptor = parse_str("->Idea[3]");
        assert!(descriptor.modifiers.array);
        assert_eq!(descriptor.relationship().unwrap().count, Some(3));

        let descriptor = parse_str("->Idea[]");
        assert!(descriptor.modifiers.array);
        assert_eq!(descriptor.relationship().unwrap().count, None);
    }

    #[test]
    fn relationship_filters() {
        let descriptor = parse_str("->Startup[mrr>1000, active=true]");
        let spec = descriptor.relationship().unwrap();
        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.filters[0].field, "mrr");
        assert_eq!(spec.filters[0].operator, FilterOp::Gt);
        assert_eq!(spec.filters[0].value, json!(1000));
        assert_eq!(spec.filters[1].value, json!(true));
    }

    #[test]
    fn backreference_field_name() {
        let descriptor = parse_str("<-Comment.post");
        let spec = descriptor.relationship().unwrap();
        assert_eq!(spec.target, "Comment");
        assert_eq!(spec.backref.as_deref(), Some("post"));
    }

    #[test]
    fn parse_filters_coerces_values() {
        let filters = parse_filters("mrr>1000");
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].field, "mrr");
        assert_eq!(filters[0].operator, FilterOp::Gt);
        assert_eq!(filters[0].value, json!(1000));

        let filters = parse_filters("active=true");
        assert_eq!(filters[0].value, json!(true));

        let filters = parse_filters("name=alpha, score>=2.5");
        assert_eq!(filters[0].value, json!("alpha"));
        assert_eq!(filters[1].operator, FilterOp::Ge);
        assert_eq!(filters[1].value, json!(2.5));
    }

    #[test]
    fn type_hints_map_primitives() {
        let cases = [
            ("How many? (number)", Primitive::Number),
            ("Active? (boolean)", Primitive::Boolean),
            ("Age (integer)", Primitive::Integer),
            ("When (date)", Primitive::Date),
        ];
        for (pattern, primitive) in cases {
            let descriptor = parse_str(pattern);
            assert_eq!(descriptor.kind, FieldKind::Scalar(primitive), "{pattern}");
        }
        let descriptor = parse_str("How many? (number)");
        assert_eq!(descriptor.description.as_deref(), Some("How many?"));
    }

    #[test]
    fn bare_primitive_names() {
        assert_eq!(parse_str("string").kind, FieldKind::Scalar(Primitive::String));
        assert_eq!(parse_str("number").kind, FieldKind::Scalar(Primitive::Number));
    }

    #[test]
    fn unknown_text_defaults_to_string() {
        let descriptor = parse_str("The startup's tagline");
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::String));
        assert_eq!(
            descriptor.description.as_deref(),
            Some("The startup's tagline")
        );
    }

    #[test]
    fn enums_split_on_top_level_pipes() {
        let descriptor = parse_str("draft | published | archived");
        assert_eq!(
            descriptor.kind,
            FieldKind::Enum {
                values: vec![
                    "draft".to_string(),
                    "published".to_string(),
                    "archived".to_string()
                ]
            }
        );
    }

    #[test]
    fn pipes_inside_brackets_are_not_enums() {
        let descriptor = parse_str("->Tag[label=a|b]");
        assert!(descriptor.is_relationship());
    }

    #[test]
    fn modifier_characters() {
        let descriptor = parse_str("string!#");
        assert!(descriptor.modifiers.required);
        assert!(descriptor.modifiers.indexed);
        assert!(!descriptor.modifiers.optional);

        let descriptor = parse_str("string^");
        assert!(descriptor.modifiers.unique);
    }

    #[test]
    fn description_punctuation_is_not_a_modifier() {
        let descriptor = parse_str("Is it active?");
        assert!(!descriptor.modifiers.optional);
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::String));
        assert_eq!(descriptor.description.as_deref(), Some("Is it active?"));

        // A typed token still carries its modifiers.
        let descriptor = parse_str("Is it active? (boolean)?");
        assert!(descriptor.modifiers.optional);
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::Boolean));
        assert_eq!(descriptor.description.as_deref(), Some("Is it active?"));
    }

    #[test]
    fn optional_wins_over_required() {
        let descriptor = parse_str("string!?");
        assert!(descriptor.modifiers.optional);
        assert!(!descriptor.modifiers.required);
    }

    #[test]
    fn array_input_marks_array() {
        let descriptor = parse("tags", &json!(["string"]));
        assert!(descriptor.modifiers.array);
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::String));

        let descriptor = parse("ideas", &json!(["->Idea"]));
        assert!(descriptor.modifiers.array);
        assert!(descriptor.is_relationship());
    }

    #[test]
    fn nested_objects_recurse() {
        let descriptor = parse(
            "address",
            &json!({"street": "string", "zip": "Postal code (number)"}),
        );
        match descriptor.kind {
            FieldKind::Object { fields } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(
                    fields["zip"].kind,
                    FieldKind::Scalar(Primitive::Number)
                );
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn generative_templates() {
        let descriptor = parse_str("Write a bio for {name} at {company}");
        match &descriptor.kind {
            FieldKind::Generative { template } => {
                assert!(template.contains("{name}"));
            }
            other => panic!("expected generative, got {other:?}"),
        }
    }

    #[test]
    fn empty_braces_stay_plain_string() {
        let descriptor = parse_str("A string with literal {} braces");
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::String));
    }

    #[test]
    fn default_values() {
        let descriptor = parse_str("number = 5");
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::Number));
        assert_eq!(descriptor.default, Some(json!(5)));
    }

    #[test]
    fn null_input_is_disabled() {
        let descriptor = parse("create", &Value::Null);
        assert_eq!(descriptor.kind, FieldKind::Disabled);
    }

    #[test]
    fn malformed_relationship_degrades_to_string() {
        let descriptor = parse_str("dangling ->");
        assert_eq!(descriptor.kind, FieldKind::Scalar(Primitive::String));
    }
}
