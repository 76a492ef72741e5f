use serde::{Deserialize, Serialize};

/// `feedback` 缺失时的占位文本
pub const FEEDBACK_PLACEHOLDER: &str = "No feedback provided.";

/// 一次评分的结果，只在单次请求内存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeVerdict {
    pub feedback: String,
    pub is_correct: bool,
    pub is_excellent: bool,
}

impl GradeVerdict {
    /// `isExcellent` 只应在 `isCorrect` 为 true 时出现
    pub fn is_policy_consistent(&self) -> bool {
        self.is_correct || !self.is_excellent
    }
}
