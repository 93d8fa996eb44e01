//! # Template Engine
//!
//! Templates are evaluated through the [`TemplateEngine`] trait, so the
//! expression language stays swappable. The built-in [`DelimitedEngine`]
//! implements a small pipeline language between configurable delimiters
//! (default `[[[` and `]]]`):
//!
//! ```text
//! replicas: [[[ .replicas ]]]
//! host: [[[ .Cluster.name ]]].[[[ .domain | default "example.com" ]]]
//! password: [[[ .Secrets.password | b64enc ]]]
//! labels: [[[ .labels | toYaml | nindent 2 ]]]
//! ```
//!
//! An action is an operand (`.path.to.key`, `.` for the whole context, or a
//! string, number or boolean literal) or a function call, optionally
//! followed by `| function args...` stages. The value flowing through a
//! pipeline is passed as the last argument of each stage.
//!
//! Referencing an undefined key is an error unless the pipeline handles it
//! with `default`.

use base64::Engine as _;
use serde_yaml::Value;

use crate::config::Delimiters;
use crate::error::{Error, Result};
use crate::values::Values;

/// Evaluates a template source against a context
pub trait TemplateEngine: Send + Sync {
    /// Render `source` with `context`; `name` identifies the template in errors.
    fn render(&self, name: &str, source: &str, context: &Values) -> Result<String>;
}

/// The built-in delimiter/pipeline engine
#[derive(Debug, Clone)]
pub struct DelimitedEngine {
    left: String,
    right: String,
}

impl DelimitedEngine {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn from_delimiters(delimiters: &Delimiters) -> Self {
        Self::new(delimiters.left.clone(), delimiters.right.clone())
    }
}

impl Default for DelimitedEngine {
    fn default() -> Self {
        Self::new(crate::defaults::DELIMITER_LEFT, crate::defaults::DELIMITER_RIGHT)
    }
}

impl TemplateEngine for DelimitedEngine {
    fn render(&self, name: &str, source: &str, context: &Values) -> Result<String> {
        let mut output = String::with_capacity(source.len());
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(&self.left) {
            output.push_str(&rest[..start]);
            let action_start = start + self.left.len();
            let line = line_number(source, offset + start);

            let len = find_close(&rest[action_start..], &self.right)
                .map_err(|message| template_error(name, line, message, None))?;
            let action = &rest[action_start..action_start + len];

            let value = evaluate(action, context).map_err(|e| {
                let EvalError { message, variable } = e;
                template_error(name, line, &message, variable)
            })?;
            output.push_str(&to_text(&value));

            let consumed = action_start + len + self.right.len();
            offset += consumed;
            rest = &rest[consumed..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

/// Offset of the first `right` delimiter in `action` outside a string literal.
fn find_close(action: &str, right: &str) -> std::result::Result<usize, &'static str> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in action.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if action[i..].starts_with(right) {
            return Ok(i);
        } else if c == '"' {
            in_string = true;
        }
    }
    Err(if in_string {
        "unterminated string literal"
    } else {
        "unclosed action"
    })
}

fn line_number(source: &str, position: usize) -> usize {
    source[..position].matches('\n').count() + 1
}

fn template_error(name: &str, line: usize, message: &str, variable: Option<String>) -> Error {
    Error::Template {
        file: name.to_string(),
        message: format!("line {}: {}", line, message),
        variable,
    }
}

struct EvalError {
    message: String,
    variable: Option<String>,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variable: None,
        }
    }

    fn undefined(path: &str) -> Self {
        Self {
            message: "undefined value".to_string(),
            variable: Some(path.to_string()),
        }
    }
}

type EvalResult<T> = std::result::Result<T, EvalError>;

////// LEXER //////

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Pipe,
    Str(String),
    Word(String),
}

fn tokenize(action: &str) -> EvalResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = action.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '|' {
            chars.next();
            tokens.push(Token::Pipe);
        } else if c == '"' {
            chars.next();
            let mut literal = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => literal.push('\n'),
                        Some('t') => literal.push('\t'),
                        Some(other) => literal.push(other),
                        None => return Err(EvalError::new("unterminated string literal")),
                    },
                    Some(other) => literal.push(other),
                    None => return Err(EvalError::new("unterminated string literal")),
                }
            }
            tokens.push(Token::Str(literal));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '|' || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

////// EVALUATION //////

/// A pipeline value; `Missing` carries the path that failed to resolve.
#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    Missing(String),
}

impl Operand {
    fn into_value(self) -> EvalResult<Value> {
        match self {
            Operand::Value(value) => Ok(value),
            Operand::Missing(path) => Err(EvalError::undefined(&path)),
        }
    }
}

const FUNCTIONS: [&str; 10] = [
    "default", "quote", "upper", "lower", "trim", "b64enc", "toYaml", "toJson", "indent",
    "nindent",
];

fn evaluate(action: &str, context: &Values) -> EvalResult<Value> {
    let tokens = tokenize(action)?;
    let stages: Vec<&[Token]> = tokens.split(|t| *t == Token::Pipe).collect();
    if stages.iter().any(|s| s.is_empty()) {
        return Err(EvalError::new("empty pipeline stage"));
    }

    let mut piped: Option<Operand> = None;
    for stage in stages {
        piped = Some(evaluate_stage(stage, piped, context)?);
    }
    match piped {
        Some(operand) => operand.into_value(),
        None => Err(EvalError::new("empty action")),
    }
}

fn evaluate_stage(stage: &[Token], piped: Option<Operand>, context: &Values) -> EvalResult<Operand> {
    let function = match &stage[0] {
        Token::Word(word) if FUNCTIONS.contains(&word.as_str()) => Some(word.as_str()),
        _ => None,
    };

    match function {
        None if stage.len() == 1 && piped.is_none() => operand(&stage[0], context),
        None => match &stage[0] {
            Token::Word(word) if piped.is_some() => Err(EvalError::new(format!(
                "unknown function '{}'{}",
                word,
                crate::suggestions::did_you_mean(word, &FUNCTIONS)
            ))),
            _ => Err(EvalError::new("unexpected arguments after operand")),
        },
        Some(function) => {
            let mut args = stage[1..]
                .iter()
                .map(|token| operand(token, context))
                .collect::<EvalResult<Vec<_>>>()?;
            args.extend(piped);
            call(function, args)
        }
    }
}

fn operand(token: &Token, context: &Values) -> EvalResult<Operand> {
    match token {
        Token::Str(literal) => Ok(Operand::Value(Value::String(literal.clone()))),
        Token::Word(word) => match word.as_str() {
            "true" => Ok(Operand::Value(Value::Bool(true))),
            "false" => Ok(Operand::Value(Value::Bool(false))),
            "null" => Ok(Operand::Value(Value::Null)),
            "." => Ok(Operand::Value(whole_context(context))),
            _ => {
                if let Ok(number) = word.parse::<i64>() {
                    return Ok(Operand::Value(Value::from(number)));
                }
                if let Ok(number) = word.parse::<f64>() {
                    return Ok(Operand::Value(Value::from(number)));
                }
                Ok(lookup(word, context))
            }
        },
        Token::Pipe => Err(EvalError::new("unexpected '|'")),
    }
}

fn whole_context(context: &Values) -> Value {
    Value::Mapping(
        context
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
            .collect(),
    )
}

fn lookup(path: &str, context: &Values) -> Operand {
    let display = path.trim_start_matches('.');
    let mut segments = display.split('.');

    let Some(current) = segments.next().and_then(|first| context.get(first)) else {
        return Operand::Missing(display.to_string());
    };
    let mut current = current;

    for segment in segments {
        let next = match current {
            Value::Mapping(mapping) => mapping.get(segment),
            Value::Sequence(sequence) => segment.parse::<usize>().ok().and_then(|i| sequence.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Operand::Missing(display.to_string()),
        }
    }
    Operand::Value(current.clone())
}

fn call(function: &str, mut args: Vec<Operand>) -> EvalResult<Operand> {
    let arity = match function {
        "default" | "indent" | "nindent" => 2,
        _ => 1,
    };
    if args.len() != arity {
        return Err(EvalError::new(format!(
            "{} expects {} argument(s), got {}",
            function,
            arity,
            args.len()
        )));
    }

    if function == "default" {
        let value = args.pop().unwrap_or(Operand::Missing(String::new()));
        let fallback = args.pop().unwrap_or(Operand::Missing(String::new()));
        return match value {
            Operand::Value(v) if !is_empty(&v) => Ok(Operand::Value(v)),
            _ => Ok(fallback),
        };
    }

    let mut values = args
        .into_iter()
        .map(Operand::into_value)
        .collect::<EvalResult<Vec<_>>>()?;
    let value = values.pop().unwrap_or(Value::Null);

    let result = match function {
        "quote" => Value::String(quote(&to_text(&value))),
        "upper" => Value::String(to_text(&value).to_uppercase()),
        "lower" => Value::String(to_text(&value).to_lowercase()),
        "trim" => Value::String(to_text(&value).trim().to_string()),
        "b64enc" => Value::String(base64::engine::general_purpose::STANDARD.encode(to_text(&value))),
        "toYaml" => {
            let yaml = serde_yaml::to_string(&value).map_err(|e| EvalError::new(e.to_string()))?;
            Value::String(yaml.trim_end_matches('\n').to_string())
        }
        "toJson" => Value::String(
            serde_json::to_string(&value).map_err(|e| EvalError::new(e.to_string()))?,
        ),
        "indent" | "nindent" => {
            let width = values
                .pop()
                .and_then(|w| w.as_u64())
                .ok_or_else(|| EvalError::new(format!("{} width must be a number", function)))?;
            let indented = indent(&to_text(&value), width as usize);
            if function == "nindent" {
                Value::String(format!("\n{}", indented))
            } else {
                Value::String(indented)
            }
        }
        other => return Err(EvalError::new(format!("unknown function '{}'", other))),
    };
    Ok(Operand::Value(result))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Sequence(s) => s.is_empty(),
        Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text form of a value as substituted into the output
fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Tagged(tagged) => to_text(&tagged.value),
        Value::Mapping(_) | Value::Sequence(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
