/// 运行时常量定义
///
/// 统一管理变量名、动作关键字等魔法值

/// 执行动作关键字
pub mod actions {
    /// 规划结果中表示结束整个分组的动作
    pub const TERMINATE: &str = "TERMINATE";
    pub const CONTINUE: &str = "CONTINUE";
}

/// 变量表中的约定键
pub mod variables {
    /// Handoff 写入的下一轮查询
    pub const NEXT_QUERY: &str = "next_query";
    /// 当前用户查询（用于模板渲染）
    pub const QUERY: &str = "query";
    /// 检索到的记忆上下文
    pub const MEMORY: &str = "memory";
    pub const CURRENT_AGENT: &str = "current_agent";
}

/// Agent 默认参数
pub mod agent {
    pub const DEFAULT_MAX_ROUND: u32 = 1;
    pub const DEFAULT_MAX_TURNS: u32 = 20;
    pub const DEFAULT_MEMORY_LIMIT: usize = 5;
    /// 反思轮次的默认续写提示
    pub const DEFAULT_CONTINUE_PROMPT: &str =
        "Review your previous answer and continue. Previous answer: {{output}}";
    /// 上下文窗口占用上限（百分比）
    pub const CONTEXT_WINDOW_RATIO: f64 = 0.8;
}

/// 分组默认参数
pub mod group {
    pub const DEFAULT_MAX_ROUND: u32 = 5;
}

/// 思维链终止条件阈值
pub mod termination {
    pub const CONFIDENCE_THRESHOLD: f64 = 0.9;
    pub const STEPS: &str = "steps";
    pub const NEXT_ACTION: &str = "next_action";
    pub const CONFIDENCE: &str = "confidence";
}

/// 流程图默认参数
pub mod flow {
    pub const DEFAULT_MAX_STEPS: u32 = 256;
}
