/// Harness Generator - wraps user code in a runnable entry point
///
/// Every harness calls the language's fixed entry point with the test input
/// as its only argument and prints exactly one JSON line:
/// - success: `{"output": "<str(result)>", "error": null}`
/// - failure: `{"output": "", "error": "<message and trace>"}`
///
/// Inputs are re-encoded into the target language's own string literal
/// syntax before substitution. JSON happens to be valid JavaScript, Python
/// needs its own quoting.
use crate::config::LanguageProfile;
use aura_common::types::Language;

const CODE_MARKER: &str = "{{code}}";
const INPUT_MARKER: &str = "{{input}}";

#[derive(Debug)]
pub struct HarnessTemplate {
    pub entry_point: &'static str,
    source: &'static str,
    encode_input: fn(&str) -> String,
    embed_code: fn(&str) -> String,
}

impl HarnessTemplate {
    pub fn render(&self, code: &str, input: &str) -> String {
        let code = (self.embed_code)(code);
        let input = (self.encode_input)(input);
        fill(self.source, &[(CODE_MARKER, &code), (INPUT_MARKER, &input)])
    }
}

// User code runs through exec() so it keeps its own indentation and line
// numbers; a failing definition is still caught by the harness.
static PYTHON: HarnessTemplate = HarnessTemplate {
    entry_point: "test_solution",
    source: r#"import json
import sys
import traceback

try:
    exec(compile({{code}}, "solution.py", "exec"), globals())
    result = test_solution({{input}})
    print(json.dumps({"output": str(result), "error": None}))
except Exception as e:
    print(json.dumps({"output": "", "error": str(e) + "\n" + traceback.format_exc()}))
"#,
    encode_input: python_str_literal,
    embed_code: python_str_literal,
};

static JAVASCRIPT: HarnessTemplate = HarnessTemplate {
    entry_point: "testSolution",
    source: r#"async function runCode() {
    try {
{{code}}
        const result = await testSolution({{input}});
        console.log(JSON.stringify({"output": String(result), "error": null}));
    } catch (e) {
        console.log(JSON.stringify({"output": "", "error": (e && e.stack) ? String(e.stack) : String(e)}));
    }
}
runCode();
"#,
    encode_input: json_str_literal,
    embed_code: verbatim,
};

static TYPESCRIPT: HarnessTemplate = HarnessTemplate {
    entry_point: "testSolution",
    source: r#"async function runCode(): Promise<void> {
    try {
{{code}}
        const result = await testSolution({{input}});
        console.log(JSON.stringify({"output": String(result), "error": null}));
    } catch (e: any) {
        console.log(JSON.stringify({"output": "", "error": (e && e.stack) ? String(e.stack) : String(e)}));
    }
}
runCode();
"#,
    encode_input: json_str_literal,
    embed_code: verbatim,
};

pub fn template_for(language: Language) -> &'static HarnessTemplate {
    match language {
        Language::Python => &PYTHON,
        Language::JavaScript => &JAVASCRIPT,
        Language::TypeScript => &TYPESCRIPT,
    }
}

/// Build the complete source unit for one test case
pub fn generate(profile: &LanguageProfile, code: &str, input: &str) -> String {
    profile.harness.render(code, input)
}

/// Substitute markers in a single left-to-right pass. Substituted text is
/// never rescanned, so user code containing a marker stays untouched.
fn fill(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + replacements.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    loop {
        let next = replacements
            .iter()
            .filter_map(|(marker, value)| rest.find(marker).map(|pos| (pos, *marker, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, marker, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + marker.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn verbatim(code: &str) -> String {
    code.to_string()
}

fn json_str_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Single-quoted Python string literal for `s`
pub fn python_str_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_literal_escaping() {
        assert_eq!(python_str_literal("abc"), "'abc'");
        assert_eq!(python_str_literal("it's"), r"'it\'s'");
        assert_eq!(python_str_literal("a\\b"), r"'a\\b'");
        assert_eq!(python_str_literal("1\n2\t3"), r"'1\n2\t3'");
        assert_eq!(python_str_literal("\u{0}"), r"'\x00'");
        assert_eq!(python_str_literal("héllo"), "'héllo'");
    }

    #[test]
    fn test_json_literal_for_javascript() {
        assert_eq!(json_str_literal(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(json_str_literal("[1, 2]\n"), r#""[1, 2]\n""#);
    }

    #[test]
    fn test_python_harness_shape() {
        let profile = LanguageProfile::builtin(Language::Python);
        let source = generate(&profile, "def test_solution(x):\n    return x * 2", "21");

        assert!(source.contains("result = test_solution('21')"));
        assert!(source.contains(r"'def test_solution(x):\n    return x * 2'"));
        assert!(source.contains(r#"{"output": str(result), "error": None}"#));
        assert!(source.contains("traceback.format_exc()"));
        assert!(!source.contains(CODE_MARKER));
        assert!(!source.contains(INPUT_MARKER));
    }

    #[test]
    fn test_javascript_harness_embeds_code_verbatim() {
        let code = "function testSolution(s) {\n  return s.length;\n}";
        let profile = LanguageProfile::builtin(Language::JavaScript);
        let source = generate(&profile, code, "it's \"quoted\"");

        assert!(source.contains(code));
        assert!(source.contains(r#"await testSolution("it's \"quoted\"")"#));
        assert!(source.ends_with("runCode();\n"));
    }

    #[test]
    fn test_typescript_harness_is_typed() {
        let profile = LanguageProfile::builtin(Language::TypeScript);
        let source = generate(&profile, "const testSolution = (s: string) => s;", "x");
        assert!(source.contains("Promise<void>"));
        assert!(source.contains("catch (e: any)"));
    }

    #[test]
    fn test_markers_inside_user_code_are_not_expanded() {
        let profile = LanguageProfile::builtin(Language::JavaScript);
        let code = "// {{input}} and {{code}}\nfunction testSolution(x) { return x; }";
        let source = generate(&profile, code, "payload");

        assert!(source.contains("// {{input}} and {{code}}"));
        assert_eq!(source.matches("\"payload\"").count(), 1);
    }

    #[test]
    fn test_fill_handles_missing_markers() {
        assert_eq!(fill("plain", &[(CODE_MARKER, "x")]), "plain");
        assert_eq!(fill("{{code}}{{code}}", &[(CODE_MARKER, "ab")]), "abab");
    }
}
