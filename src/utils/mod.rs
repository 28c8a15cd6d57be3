/// 工具模块 - 提供通用工具函数
pub mod ids;
pub mod logging;
pub mod text;
pub mod validation;

pub use ids::next_id;
pub use logging::LoggingConfig;
pub use text::{strip_code_fence, value_to_text};
pub use validation::ConfigValidator;
