//! `${VAR}` substitution over raw YAML, applied before typed deserialization.

use regex::{Captures, Regex};
use serde_yaml::Value;
use std::sync::OnceLock;

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Names of every referenced variable that `lookup` cannot resolve, in first-seen order.
pub fn collect_missing_vars(value: &Value, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
    let mut missing = Vec::new();
    collect(value, lookup, &mut missing);
    missing
}

fn collect(value: &Value, lookup: &dyn Fn(&str) -> Option<String>, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in env_var_pattern().captures_iter(s) {
                let name = &caps[1];
                if lookup(name).is_none() && !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect(item, lookup, missing);
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map {
                collect(v, lookup, missing);
            }
        }
        Value::Tagged(tagged) => collect(&tagged.value, lookup, missing),
        _ => {}
    }
}

/// The variable name when `s` is exactly one `${VAR}` reference and nothing else.
fn whole_reference(s: &str) -> Option<&str> {
    let caps = env_var_pattern().captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != s.len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// A resolved value that reads as a YAML bool or number becomes that scalar.
fn typed_scalar(text: String) -> Value {
    match serde_yaml::from_str::<Value>(&text) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(text),
    }
}

/// Substitutes every reference in string values. Keys are left untouched.
/// A value that is a single reference takes the variable's YAML type, so
/// `max_concurrent: ${WORKERS}` with `WORKERS=8` is a number.
/// Unresolvable references become empty strings; check `collect_missing_vars` first.
pub fn interpolate(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(name) = whole_reference(s) {
                let resolved = lookup(name).unwrap_or_default();
                *value = typed_scalar(resolved);
            } else if env_var_pattern().is_match(s) {
                let replaced = env_var_pattern()
                    .replace_all(s, |caps: &Captures<'_>| lookup(&caps[1]).unwrap_or_default())
                    .into_owned();
                *s = replaced;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate(item, lookup);
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                interpolate(v, lookup);
            }
        }
        Value::Tagged(tagged) => interpolate(&mut tagged.value, lookup),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "JUDGE_MODEL" => Some("gpt-4o".into()),
            "DATA_DIR" => Some("/data".into()),
            "WORKERS" => Some("8".into()),
            "STRICT" => Some("true".into()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_nested_references() {
        let mut v: Value = serde_yaml::from_str(
            "judge:\n  model: ${JUDGE_MODEL}\ndataset:\n  path: ${DATA_DIR}/qa.jsonl\nlist: [\"${JUDGE_MODEL}-x\"]\n",
        )
        .unwrap();
        interpolate(&mut v, &lookup);
        assert_eq!(v["judge"]["model"], Value::from("gpt-4o"));
        assert_eq!(v["dataset"]["path"], Value::from("/data/qa.jsonl"));
        assert_eq!(v["list"][0], Value::from("gpt-4o-x"));
    }

    #[test]
    fn whole_references_take_the_variable_type() {
        let mut v: Value = serde_yaml::from_str(
            "workers: ${WORKERS}\nstrict: ${STRICT}\nlabel: w${WORKERS}\nmodel: ${JUDGE_MODEL}\n",
        )
        .unwrap();
        interpolate(&mut v, &lookup);
        assert_eq!(v["workers"].as_u64(), Some(8));
        assert_eq!(v["strict"].as_bool(), Some(true));
        assert_eq!(v["label"], Value::from("w8"));
        assert_eq!(v["model"], Value::from("gpt-4o"));
    }

    #[test]
    fn collects_every_missing_var_once() {
        let v: Value =
            serde_yaml::from_str("a: ${NOPE_A}\nb: [\"${NOPE_B}\", \"${NOPE_A}\"]\nc: ${JUDGE_MODEL}\n")
                .unwrap();
        assert_eq!(collect_missing_vars(&v, &lookup), ["NOPE_A", "NOPE_B"]);
    }

    #[test]
    fn plain_dollar_signs_are_not_references() {
        let mut v = Value::from("costs $5 or ${ not a var }");
        interpolate(&mut v, &lookup);
        assert_eq!(v, Value::from("costs $5 or ${ not a var }"));
    }
}
