use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Context limits of a known model family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelLimits {
    pub context_window: usize,
    pub max_output: usize,
}

pub const DEFAULT_LIMITS: ModelLimits = ModelLimits {
    context_window: 8_192,
    max_output: 2_048,
};

/// 模型上下文限制表（按名称前缀匹配）
static MODEL_LIMITS: Lazy<HashMap<&'static str, ModelLimits>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut add = |name: &'static str, context_window: usize, max_output: usize| {
        table.insert(
            name,
            ModelLimits {
                context_window,
                max_output,
            },
        );
    };
    add("gpt-4o", 128_000, 16_384);
    add("gpt-4", 8_192, 4_096);
    add("gpt-3.5-turbo", 16_385, 4_096);
    add("claude-3", 200_000, 4_096);
    add("qwen-max", 32_768, 8_192);
    add("qwen-plus", 131_072, 8_192);
    add("qwen-turbo", 131_072, 8_192);
    add("deepseek-chat", 64_000, 8_192);
    add("llama3", 8_192, 2_048);
    table
});

/// Looks up by longest matching prefix, falling back to `DEFAULT_LIMITS`.
pub fn model_limits(model: &str) -> ModelLimits {
    MODEL_LIMITS
        .iter()
        .filter(|(prefix, _)| model.starts_with(*prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, limits)| *limits)
        .unwrap_or(DEFAULT_LIMITS)
}

/// Rough token estimate: four bytes per token.
pub fn estimate_tokens(text_len: usize) -> usize {
    text_len.div_ceil(4)
}
