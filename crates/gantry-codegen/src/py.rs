//! Python string-literal escaping and value rendering.
//!
//! Every user-supplied string interpolated into generated program text goes
//! through [`quote`]. Adversarial file names or column names (embedded
//! quotes, backslashes, newlines) must never break the generated program's
//! syntax or smuggle in extra statements.

/// Escape a string for inclusion inside a double-quoted Python literal.
/// Returns the contents only, without surrounding quotes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\x00"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape and wrap in double quotes: a complete Python string literal.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// Render a JSON value as a Python expression.
///
/// Categorical search-space values are scalars per the data model, but the
/// rendering recurses for completeness.
pub fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(true) => "True".to_string(),
        serde_json::Value::Bool(false) => "False".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote(s),
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        serde_json::Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// Render a list of JSON values as a Python list expression.
pub fn list_literal(values: &[serde_json::Value]) -> String {
    let rendered: Vec<String> = values.iter().map(literal).collect();
    format!("[{}]", rendered.join(", "))
}

/// Render an f64 as a Python float expression, keeping a decimal point so
/// the generated value stays a float.
pub fn float_literal(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_pass_through() {
        assert_eq!(escape("species"), "species");
        assert_eq!(quote("species"), "\"species\"");
    }

    #[test]
    fn backslashes_and_quotes_escaped() {
        assert_eq!(escape(r#"C:\data\iris.csv"#), r#"C:\\data\\iris.csv"#);
        assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);
    }

    #[test]
    fn newlines_cannot_break_out_of_the_literal() {
        let hostile = "x\"\nimport os\nos.system(\"rm -rf /\")\n#";
        let quoted = quote(hostile);
        // A single physical line: no raw newline survives inside the literal.
        assert!(!quoted.contains('\n'));
        assert!(quoted.starts_with('"') && quoted.ends_with('"'));
    }

    #[test]
    fn tabs_and_carriage_returns_escaped() {
        assert_eq!(escape("a\tb\rc"), "a\\tb\\rc");
    }

    #[test]
    fn literal_scalars() {
        assert_eq!(literal(&serde_json::json!(null)), "None");
        assert_eq!(literal(&serde_json::json!(true)), "True");
        assert_eq!(literal(&serde_json::json!(false)), "False");
        assert_eq!(literal(&serde_json::json!(3)), "3");
        assert_eq!(literal(&serde_json::json!(0.5)), "0.5");
        assert_eq!(literal(&serde_json::json!("gini")), "\"gini\"");
    }

    #[test]
    fn literal_nested() {
        assert_eq!(
            literal(&serde_json::json!(["a", 1, null])),
            "[\"a\", 1, None]"
        );
        assert_eq!(
            literal(&serde_json::json!({"k": true})),
            "{\"k\": True}"
        );
    }

    #[test]
    fn float_literal_keeps_decimal_point() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.25), "0.25");
        assert_eq!(float_literal(100.0), "100.0");
    }
}
