use serde_json::Value;

/// 提取代码块包裹的内容（```json ... ``` 或 ``` ... ```），不做任何修复
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    for opener in ["```json", "```JSON", "```"] {
        if let Some(start) = trimmed.find(opener) {
            let body_start = start + opener.len();
            if let Some(end) = trimmed[body_start..].find("```") {
                return trimmed[body_start..body_start + end].trim();
            }
        }
    }
    trimmed
}

/// 将变量值渲染为文本：字符串原样输出，null 为空，其余按 JSON 输出
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "here you go\n```json\n{\"a\":1}\n```\nthanks";
        assert_eq!(strip_code_fence(raw), "{\"a\":1}");
    }

    #[test]
    fn leaves_plain_text() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn unterminated_fence_is_left_alone() {
        assert_eq!(strip_code_fence("```json {\"a\":1}"), "```json {\"a\":1}");
    }
}
