use serde::{Deserialize, Serialize};

/// Reverse-lookup field names derived from a verb, used for relationship
/// back-references (`publishedAt`, `publishedBy`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseFields {
    pub at: String,
    pub by: String,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub in_field: Option<String>,
    #[serde(rename = "for", skip_serializing_if = "Option::is_none")]
    pub for_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbConjugation {
    pub action: String,
    pub actor: String,
    pub act: String,
    pub activity: String,
    pub result: String,
    pub reverse: ReverseFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
}

/// Derives all linguistic forms for a verb. Deterministic: common verbs come
/// from a hand-tuned table, everything else from morphology rules.
pub fn conjugate(action: &str) -> VerbConjugation {
    let action = action.trim().to_ascii_lowercase();
    if let Some(tuned) = tuned(&action) {
        return tuned;
    }
    let past = past_participle(&action);
    VerbConjugation {
        actor: agent_noun(&action),
        act: third_person(&action),
        activity: gerund(&action),
        result: deverbal_noun(&action),
        reverse: reverse_fields(&past, None, None),
        inverse: None,
        action,
    }
}

fn tuned(action: &str) -> Option<VerbConjugation> {
    // action, actor, act, activity, result, past participle, in, for, inverse
    let row: (&str, &str, &str, &str, Option<&str>, Option<&str>, Option<&str>, Option<&str>) =
        match action {
            "create" => ("creator", "creates", "creating", "creation", Some("created"), None, None, Some("delete")),
            "update" => ("updater", "updates", "updating", "update", Some("updated"), None, None, None),
            "delete" => ("deleter", "deletes", "deleting", "deletion", Some("deleted"), None, None, Some("create")),
            "publish" => ("publisher", "publishes", "publishing", "publication", Some("published"), Some("publishedIn"), None, Some("unpublish")),
            "unpublish" => ("unpublisher", "unpublishes", "unpublishing", "unpublication", Some("unpublished"), None, None, Some("publish")),
            "archive" => ("archiver", "archives", "archiving", "archival", Some("archived"), Some("archivedIn"), None, Some("unarchive")),
            "unarchive" => ("unarchiver", "unarchives", "unarchiving", "unarchival", Some("unarchived"), None, None, Some("archive")),
            "approve" => ("approver", "approves", "approving", "approval", Some("approved"), None, None, Some("reject")),
            "reject" => ("rejecter", "rejects", "rejecting", "rejection", Some("rejected"), None, None, Some("approve")),
            "assign" => ("assigner", "assigns", "assigning", "assignment", Some("assigned"), None, Some("assignedFor"), Some("unassign")),
            "unassign" => ("unassigner", "unassigns", "unassigning", "unassignment", Some("unassigned"), None, None, Some("assign")),
            "complete" => ("completer", "completes", "completing", "completion", Some("completed"), None, None, None),
            "submit" => ("submitter", "submits", "submitting", "submission", Some("submitted"), None, Some("submittedFor"), None),
            "review" => ("reviewer", "reviews", "reviewing", "review", Some("reviewed"), Some("reviewedIn"), None, None),
            _ => return None,
        };
    let past = row.4.map(str::to_string).unwrap_or_else(|| past_participle(action));
    Some(VerbConjugation {
        action: action.to_string(),
        actor: row.0.to_string(),
        act: row.1.to_string(),
        activity: row.2.to_string(),
        result: row.3.to_string(),
        reverse: reverse_fields(&past, row.5, row.6),
        inverse: row.7.map(str::to_string),
    })
}

fn reverse_fields(past: &str, in_field: Option<&str>, for_field: Option<&str>) -> ReverseFields {
    ReverseFields {
        at: format!("{past}At"),
        by: format!("{past}By"),
        in_field: in_field.map(str::to_string),
        for_field: for_field.map(str::to_string),
    }
}

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c)
}

/// Consonant-vowel-consonant ending, the doubling case ("submit" ->
/// "submitted"). Final w/x/y never double. Returns the letter to double.
fn doubled_final(verb: &str) -> Option<char> {
    let chars: Vec<char> = verb.chars().collect();
    let n = chars.len();
    if n < 3 {
        return None;
    }
    let last = chars[n - 1];
    let doubles = !is_vowel(last)
        && !matches!(last, 'w' | 'x' | 'y')
        && is_vowel(chars[n - 2])
        && !is_vowel(chars[n - 3])
        // Longer verbs usually stress an earlier syllable; keep doubling to
        // short stems ("plan", "submit", "refer").
        && n <= 6;
    doubles.then_some(last)
}

fn past_participle(verb: &str) -> String {
    if let Some(stem) = verb.strip_suffix('e') {
        return format!("{stem}ed");
    }
    if let Some(stem) = verb.strip_suffix('y') {
        if stem.chars().last().map(|c| !is_vowel(c)).unwrap_or(false) {
            return format!("{stem}ied");
        }
    }
    if let Some(last) = doubled_final(verb) {
        return format!("{verb}{last}ed");
    }
    format!("{verb}ed")
}

fn agent_noun(verb: &str) -> String {
    if verb.ends_with('e') {
        return format!("{verb}r");
    }
    if let Some(stem) = verb.strip_suffix('y') {
        if stem.chars().last().map(|c| !is_vowel(c)).unwrap_or(false) {
            return format!("{stem}ier");
        }
    }
    if let Some(last) = doubled_final(verb) {
        return format!("{verb}{last}er");
    }
    format!("{verb}er")
}

fn third_person(verb: &str) -> String {
    if verb.ends_with('s')
        || verb.ends_with('x')
        || verb.ends_with('z')
        || verb.ends_with("ch")
        || verb.ends_with("sh")
        || verb.ends_with('o')
    {
        return format!("{verb}es");
    }
    if let Some(stem) = verb.strip_suffix('y') {
        if stem.chars().last().map(|c| !is_vowel(c)).unwrap_or(false) {
            return format!("{stem}ies");
        }
    }
    format!("{verb}s")
}

fn gerund(verb: &str) -> String {
    if let Some(stem) = verb.strip_suffix('e') {
        if !stem.ends_with('e') && !stem.is_empty() {
            return format!("{stem}ing");
        }
    }
    if let Some(last) = doubled_final(verb) {
        return format!("{verb}{last}ing");
    }
    format!("{verb}ing")
}

fn deverbal_noun(verb: &str) -> String {
    if let Some(stem) = verb.strip_suffix("ate") {
        return format!("{stem}ation");
    }
    if let Some(stem) = verb.strip_suffix("ify") {
        return format!("{stem}ification");
    }
    if let Some(stem) = verb.strip_suffix("ize") {
        return format!("{stem}ization");
    }
    if let Some(stem) = verb.strip_suffix("ise") {
        return format!("{stem}isation");
    }
    gerund(verb)
}

/// Irregular noun forms that suffix rules get wrong.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

pub fn pluralize(noun: &str) -> String {
    let lower = noun.to_ascii_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *singular {
            return match_case(noun, plural);
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{noun}es");
    }
    if let Some(stem) = noun.strip_suffix('y') {
        if stem.chars().last().map(|c| !is_vowel(c.to_ascii_lowercase())).unwrap_or(false) {
            return format!("{stem}ies");
        }
    }
    format!("{noun}s")
}

pub fn singularize(noun: &str) -> String {
    let lower = noun.to_ascii_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *plural {
            return match_case(noun, singular);
        }
    }
    if let Some(stem) = noun.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return noun[..noun.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return noun[..noun.len() - 1].to_string();
    }
    noun.to_string()
}

/// Kebab-case slug of a type name: `BlogPost` -> `blog-post`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            slug.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
            prev_lower = false;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Lower-camel singular form of a type name: `BlogPost` -> `blogPost`.
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}
