//! The actual code-execution sandbox backing [`crate::resolver::Resolver`].
//!
//! The reference implementation execs Python source and smuggles the result
//! out through a dedicated exception class, because CPython's `exec`
//! statement cannot return a value. Rust has no such limitation: this module
//! embeds [`rhai`], whose `Engine::eval_ast` returns the script's value
//! directly, so the "return channel exception" trick is not needed at all.
//!
//! Sandboxing works by construction rather than by a deny-list:
//! - no filesystem, network, or process primitives are registered with the
//!   engine, so calling them surfaces as an unresolved-function error;
//! - `import` has nothing registered to find, so it surfaces as a
//!   module-not-found error;
//! - `eval` (Rhai's own string-eval escape hatch) is explicitly disabled;
//! - a deadline checked from an `on_progress` callback enforces the
//!   wall-clock timeout cooperatively.

use std::fmt;
use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, EvalAltResult, Map as RhaiMap, Scope};
use serde_json::Value;

/// The two-character marker that designates a string value as deferred code.
pub const CODE_MARKER: &str = "<(";

/// A failure surfaced while compiling or running sandboxed code.
#[derive(Debug, Clone)]
pub enum SandboxError {
    /// The code failed to parse.
    Syntax { line: usize, col: usize, message: String, text: String },
    /// The code compiled but raised at runtime (includes timeout).
    Runtime { class: String, line: usize, detail: String },
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Syntax { line, col, message, text } => {
                write!(f, "SyntaxError(line {}:{}) {} '{}'", line, col, message, text)
            }
            SandboxError::Runtime { class, line, detail } => {
                write!(f, "Error in script: {}(line {}) {}", class, line, detail)
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Wrap a code body the way the protocol expects: a single-expression
/// convenience (`return` prefix when neither `return` nor a newline is
/// present) wrapped into a zero-argument function whose value is the
/// resolved result.
pub fn wrap_code(code: &str) -> String {
    let trimmed = code.trim();
    let body = if !trimmed.contains("return") && !trimmed.contains('\n') {
        format!("return {};", trimmed.trim_end_matches(';'))
    } else {
        trimmed.to_string()
    };
    let indented: String = body
        .lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n");
    format!("fn resolver_func() {{\n{}\n}}\nresolver_func()", indented)
}

/// Compile and run already-wrapped source under the timeout, returning the
/// result as JSON.
pub fn execute(wrapped: &str, timeout: Duration) -> Result<Value, SandboxError> {
    let engine = build_engine(timeout);

    let ast = engine.compile(wrapped).map_err(|err| {
        let pos = err.1;
        SandboxError::Syntax {
            line: pos.line().unwrap_or(0),
            col: pos.position().unwrap_or(0),
            message: err.0.to_string(),
            text: source_line(wrapped, pos.line().unwrap_or(0)),
        }
    })?;

    let mut scope = Scope::new();
    engine
        .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        .map(|d| dynamic_to_json(&d))
        .map_err(|err| runtime_error(&err, wrapped))
}

fn source_line(source: &str, line: usize) -> String {
    if line == 0 {
        return String::new();
    }
    source.lines().nth(line - 1).unwrap_or("").trim().to_string()
}

fn build_engine(timeout: Duration) -> Engine {
    let mut engine = Engine::new();
    engine.disable_symbol("eval");

    let deadline = Instant::now() + timeout;
    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some(Dynamic::from("TIMEOUT"))
        } else {
            None
        }
    });

    engine.register_fn("j2s", |d: Dynamic| -> String {
        serde_json::to_string(&dynamic_to_json(&d)).unwrap_or_default()
    });
    engine.register_fn("s2j", |s: &str| -> Dynamic {
        serde_json::from_str::<Value>(s).map(json_to_dynamic).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("urlencode", |s: &str| -> String { percent_encode(s) });

    engine
}

fn runtime_error(err: &EvalAltResult, wrapped: &str) -> SandboxError {
    let pos = err.position();
    let line = pos.line().unwrap_or(0);
    let text = source_line(wrapped, line);
    let _ = text; // kept for future enrichment of Runtime detail; not part of the wire format

    match err {
        EvalAltResult::ErrorTerminated(_, _) => SandboxError::Runtime {
            class: "TimeoutError".to_string(),
            line,
            detail: "TIMEOUT".to_string(),
        },
        EvalAltResult::ErrorFunctionNotFound(name, _) => {
            let bare = name.split('(').next().unwrap_or(name).trim();
            SandboxError::Runtime {
                class: "NameError".to_string(),
                line,
                detail: format!("'{}' is not defined", bare),
            }
        }
        EvalAltResult::ErrorModuleNotFound(name, _) => SandboxError::Runtime {
            class: "ImportError".to_string(),
            line,
            detail: format!("'{}' not found (__import__ not found)", name),
        },
        EvalAltResult::ErrorArithmetic(msg, _) => SandboxError::Runtime {
            class: "ZeroDivisionError".to_string(),
            line,
            detail: msg.clone(),
        },
        other => SandboxError::Runtime {
            class: "ScriptError".to_string(),
            line,
            detail: other.to_string(),
        },
    }
}

/// Does `s` look like code (is it the scalar-string case of `contains_code`)?
pub fn is_code(s: &str) -> bool {
    s.starts_with(CODE_MARKER)
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn dynamic_to_json(d: &Dynamic) -> Value {
    if d.is_unit() {
        return Value::Null;
    }
    if let Some(b) = d.clone().try_cast::<bool>() {
        return Value::Bool(b);
    }
    if let Some(i) = d.clone().try_cast::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(f) = d.clone().try_cast::<f64>() {
        return serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(s) = d.clone().try_cast::<rhai::ImmutableString>() {
        return Value::String(s.to_string());
    }
    if let Some(arr) = d.clone().try_cast::<rhai::Array>() {
        return Value::Array(arr.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = d.clone().try_cast::<RhaiMap>() {
        let mut out = serde_json::Map::new();
        for (k, v) in map.iter() {
            out.insert(k.to_string(), dynamic_to_json(v));
        }
        return Value::Object(out);
    }
    Value::String(d.to_string())
}

fn json_to_dynamic(v: Value) -> Dynamic {
    match v {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else {
                Dynamic::from(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => {
            let rhai_arr: rhai::Array = arr.into_iter().map(json_to_dynamic).collect();
            Dynamic::from(rhai_arr)
        }
        Value::Object(map) => {
            let mut rhai_map = RhaiMap::new();
            for (k, v) in map {
                rhai_map.insert(k.into(), json_to_dynamic(v));
            }
            Dynamic::from(rhai_map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_single_expression_with_return() {
        let wrapped = wrap_code("[1, 2, 3]");
        assert!(wrapped.contains("return [1, 2, 3];"));
    }

    #[test]
    fn leaves_explicit_return_alone() {
        let wrapped = wrap_code("return 42;");
        assert!(wrapped.contains("return 42;"));
    }

    #[test]
    fn executes_array_literal() {
        let wrapped = wrap_code("return [1, 2, 3]");
        let value = execute(&wrapped, Duration::from_secs(5)).unwrap();
        assert_eq!(value, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn undefined_function_is_name_error() {
        let wrapped = wrap_code("open(\"x\")");
        let err = execute(&wrapped, Duration::from_secs(5)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NameError"), "{msg}");
        assert!(msg.contains("'open' is not defined"), "{msg}");
    }

    #[test]
    fn import_is_module_not_found() {
        let wrapped = wrap_code("import \"json\" as j;\nreturn 1;");
        let err = execute(&wrapped, Duration::from_secs(5)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ImportError"), "{msg}");
        assert!(msg.contains("__import__ not found"), "{msg}");
    }

    #[test]
    fn infinite_loop_times_out() {
        let wrapped = wrap_code("loop { }");
        let err = execute(&wrapped, Duration::from_millis(50)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TIMEOUT"), "{msg}");
    }
}
