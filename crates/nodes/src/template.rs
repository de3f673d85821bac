//! `{{namespace.path}}` interpolation for node configuration.
//!
//! Resolution runs in two passes:
//!
//! 1. **Literal pass**: every `{{path}}` / `{{json path}}` token whose root is
//!    bound in the [`Context`] is replaced by its stringified value. Tokens
//!    whose root is unbound are kept verbatim and reported as unresolved, so
//!    the executor can turn a missing binding into a precondition failure.
//! 2. **Logic pass**: if logic syntax remains (`{% if %}`, filters, loops),
//!    the partially-resolved text is rendered with minijinja. Substituted
//!    values are fenced in `{% raw %}` so user data is never re-evaluated.
//!    Printing an undefined value is an error in this pass, and any compile or
//!    render error falls back to the literal pass output, which still carries
//!    the unresolved markers.
//!
//! Strings without any template syntax are returned untouched.

use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{Environment, Error as JinjaError, ErrorKind, UndefinedBehavior};
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::Context;

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    /// Expressions of tokens whose root variable is not in the context.
    pub unresolved: Vec<String>,
}

impl Rendered {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Output of [`render_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedValue {
    pub value: Value,
    pub unresolved: Vec<String>,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("token pattern is valid"))
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][\w$-]*(?:\.[\w$-]+)*$").expect("path pattern is valid")
    })
}

fn json_helper_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^json\s+([A-Za-z_$][\w$-]*(?:\.[\w$-]+)*)$").expect("helper pattern is valid")
    })
}

fn logic_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        env.add_filter("json", json_dump);
        env.add_function("json", json_dump);
        env
    })
}

fn json_dump(value: minijinja::Value) -> Result<String, JinjaError> {
    serde_json::to_string_pretty(&value)
        .map_err(|e| JinjaError::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn has_template_syntax(template: &str) -> bool {
    template.contains("{{") || template.contains("{%")
}

/// Resolve `template` against `context`, dropping the unresolved report.
pub fn resolve(template: &str, context: &Context) -> String {
    render(template, context).output
}

/// Resolve `template` against `context`.
pub fn render(template: &str, context: &Context) -> Rendered {
    if !has_template_syntax(template) {
        return Rendered { output: template.to_owned(), unresolved: Vec::new() };
    }

    let mut unresolved = Vec::new();
    let mut needs_logic = template.contains("{%");
    // `literal` is the fallback output; `fenced` feeds the logic pass.
    let mut literal = String::with_capacity(template.len());
    let mut fenced = String::with_capacity(template.len());
    let mut last = 0;

    for caps in token_re().captures_iter(template) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else { continue };
        literal.push_str(&template[last..whole.start()]);
        fenced.push_str(&template[last..whole.start()]);
        last = whole.end();

        match evaluate(expr.as_str().trim(), context) {
            Token::Resolved(text) => {
                fenced.push_str(&fence_if_needed(&text));
                literal.push_str(&text);
            }
            Token::Unbound => {
                // May still be bound by the logic pass (loop variables).
                unresolved.push(expr.as_str().trim().to_owned());
                fenced.push_str(whole.as_str());
                literal.push_str(whole.as_str());
            }
            Token::Logic => {
                needs_logic = true;
                fenced.push_str(whole.as_str());
                literal.push_str(whole.as_str());
            }
        }
    }
    literal.push_str(&template[last..]);
    fenced.push_str(&template[last..]);

    if !needs_logic {
        return Rendered { output: literal, unresolved };
    }

    match logic_env().render_str(&fenced, context.as_map()) {
        // Every printed value was defined, so nothing is left unresolved.
        Ok(output) => Rendered { output, unresolved: Vec::new() },
        Err(err) => {
            debug!("logic template failed, keeping literal substitution: {err}");
            Rendered { output: literal, unresolved }
        }
    }
}

/// Walk a JSON value, resolving every string leaf.
///
/// Arrays and objects are walked element/key-wise; other values pass through.
pub fn render_value(value: &Value, context: &Context) -> RenderedValue {
    let mut unresolved = Vec::new();
    let value = walk(value, context, &mut unresolved);
    RenderedValue { value, unresolved }
}

/// [`render_value`] without the unresolved report.
pub fn resolve_value(value: &Value, context: &Context) -> Value {
    render_value(value, context).value
}

fn walk(value: &Value, context: &Context, unresolved: &mut Vec<String>) -> Value {
    match value {
        Value::String(template) => {
            let rendered = render(template, context);
            unresolved.extend(rendered.unresolved);
            Value::String(rendered.output)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, context, unresolved)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, context, unresolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}

enum Token {
    Resolved(String),
    /// Root variable is not in the context.
    Unbound,
    /// Not a plain path; left for the logic pass.
    Logic,
}

fn evaluate(expr: &str, context: &Context) -> Token {
    if path_re().is_match(expr) {
        return lookup(expr, context).map_or(Token::Unbound, |v| Token::Resolved(stringify(v)));
    }
    if let Some(path) = json_helper_re().captures(expr).and_then(|c| c.get(1)) {
        return lookup(path.as_str(), context).map_or(Token::Unbound, |v| {
            Token::Resolved(match v {
                Value::Null => String::new(),
                v => serde_json::to_string_pretty(v).unwrap_or_default(),
            })
        });
    }
    Token::Logic
}

/// `None` when the root is unbound; `Some(Null)` when only a nested field is absent.
fn lookup<'a>(path: &str, context: &'a Context) -> Option<&'a Value> {
    static NULL: Value = Value::Null;
    let root = path.split('.').next().unwrap_or(path);
    if !context.contains(root) {
        return None;
    }
    Some(context.lookup(path).unwrap_or(&NULL))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}

fn fence(text: &str) -> String {
    format!("{{% raw %}}{text}{{% endraw %}}")
}

fn fence_if_needed(text: &str) -> Cow<'_, str> {
    if text.contains("{{") || text.contains("{%") || text.contains("{#") {
        Cow::Owned(fence(text))
    } else {
        Cow::Borrowed(text)
    }
}

/// Rewrite `{{old...}}` tokens to `{{new...}}`.
///
/// Only a token whose leading identifier is exactly `old` (followed by `.`,
/// whitespace, a `|` filter or the closing braces) is touched, so
/// `{{oldExtra}}` survives. Statement tags such as `{% if old.x %}` are not
/// rewritten. Returns `Cow::Borrowed` when nothing changed.
pub fn rename_variable<'a>(template: &'a str, old: &str, new: &str) -> Cow<'a, str> {
    if old == new || old.is_empty() || !template.contains(old) {
        return Cow::Borrowed(template);
    }
    let pattern = format!(r"\{{\{{(\s*(?:json\s+)?){}([.\s|]|\}}\}})", regex::escape(old));
    let Ok(re) = Regex::new(&pattern) else {
        return Cow::Borrowed(template);
    };
    re.replace_all(template, |caps: &Captures| format!("{{{{{}{}{}", &caps[1], new, &caps[2]))
}
