use crate::config::Config;
use tracing::warn;

/// Collects the parameter names of a route pattern, left to right.
///
/// `/items/{category}/{id}` yields `["category", "id"]`. Malformed braces are logged and
/// skipped, they never fail the request: a `{` inside an open parameter restarts the name, an
/// unmatched `}` is ignored, and braces left open at the end are reported.
pub fn extract_pattern_names(pattern: &str, config: &Config) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_param = false;
    let mut current = String::new();
    let mut depth = 0i32;

    for (position, c) in pattern.char_indices() {
        match c {
            '{' => {
                if in_param {
                    config.log(|| warn!(position, pattern, "nested braces in route pattern"));
                }
                in_param = true;
                depth += 1;
                current.clear();
            }
            '}' => {
                if !in_param {
                    config.log(|| warn!(position, pattern, "unmatched closing brace in route pattern"));
                    continue;
                }
                in_param = false;
                depth -= 1;
                if !current.is_empty() {
                    names.push(std::mem::take(&mut current));
                }
            }
            c if in_param => current.push(c),
            _ => {}
        }
    }

    if depth != 0 {
        config.log(|| warn!(pattern, "unbalanced braces in route pattern"));
    }

    names
}
