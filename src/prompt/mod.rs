use crate::node::Variables;
use crate::utils::value_to_text;

/// Renders `{{name}}` placeholders from `variables`.
///
/// Whitespace inside the braces is ignored, unknown names render as an empty
/// string, and an unterminated `{{` is copied literally.
pub fn render(template: &str, variables: &Variables) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = variables.get(key) {
                    output.push_str(&value_to_text(value));
                }
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// Variable names referenced by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let key = after[..end].trim().to_string();
        if !key.is_empty() && !names.contains(&key) {
            names.push(key);
        }
        rest = &after[end + 2..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_known_and_blanks_unknown() {
        let mut vars = Variables::new();
        vars.insert("name".into(), json!("Ada"));
        vars.insert("n".into(), json!(3));
        assert_eq!(
            render("Hi {{ name }}, {{n}} new {{missing}}!", &vars),
            "Hi Ada, 3 new !"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(render("a {{b", &Variables::new()), "a {{b");
    }

    #[test]
    fn lists_placeholders_once() {
        assert_eq!(placeholders("{{a}} {{b}} {{a}}"), vec!["a", "b"]);
    }
}
