//! 模型输出修复 - 业务能力层
//!
//! 模型经常在 JSON 外面包一层 markdown 代码块或几句说明文字。
//! 这里按顺序尝试：直接解析 → 去掉代码块标记 → 找出第一个平衡的 `{...}`。
//! 纯函数，不做 I/O，不重试。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::grade::{GradeVerdict, FEEDBACK_PLACEHOLDER};

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("fence pattern is a valid regex"))
}

/// 去掉 ```json / ``` 之类的代码块标记
fn strip_fences(text: &str) -> String {
    fence_regex().replace_all(text, "").into_owned()
}

/// 从模型文本中取出 JSON 对象
///
/// # 返回
/// 找不到可解析的对象时返回 `ResponseFormat`（附带原始文本）
pub fn extract_json_object(raw: &str) -> AppResult<Map<String, Value>> {
    let trimmed = raw.trim();

    let value = parse_strict(trimmed)
        .or_else(|| {
            let stripped = strip_fences(trimmed);
            debug!("直接解析失败，去掉代码块标记后重试");
            parse_strict(stripped.trim())
        })
        .or_else(|| {
            debug!("去掉代码块后仍失败，扫描平衡的大括号");
            find_balanced_object(trimmed).and_then(parse_strict)
        })
        .ok_or_else(|| format_error("找不到可解析的 JSON 对象", raw))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(format_error(
            &format!("期望 JSON 对象，实际为 {}", json_kind(&other)),
            raw,
        )),
    }
}

/// 把模型的评分输出修复为 [`GradeVerdict`]
///
/// - `isCorrect` 缺失或不是布尔值 → `InvalidStructure`
/// - `isExcellent` 缺失或不是布尔值 → `false`
/// - `feedback` 缺失、不是字符串或为空 → 占位文本
pub fn repair_grade_response(raw: &str) -> AppResult<GradeVerdict> {
    let map = extract_json_object(raw)?;

    let is_correct = match map.get("isCorrect") {
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(AppError::invalid_structure(
                "isCorrect",
                format!("必须是布尔值，实际为 {}", json_kind(other)),
            ))
        }
        None => return Err(AppError::invalid_structure("isCorrect", "缺少必需字段")),
    };

    let is_excellent = map
        .get("isExcellent")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let feedback = map
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FEEDBACK_PLACEHOLDER)
        .to_string();

    let verdict = GradeVerdict {
        feedback,
        is_correct,
        is_excellent,
    };

    if !verdict.is_policy_consistent() {
        warn!("⚠️ 评分结果不一致: isExcellent=true 但 isCorrect=false，原样返回");
    }

    Ok(verdict)
}

fn parse_strict(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// 找到第一个顶层平衡的 `{...}` 片段
///
/// 跟踪嵌套深度，并跳过字符串字面量中的括号和转义字符。
fn find_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn format_error(reason: &str, raw: &str) -> AppError {
    AppError::Validation(ValidationError::ResponseFormat {
        reason: reason.to_string(),
        raw: raw.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔值",
        Value::Number(_) => "数字",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_format_error(err: &AppError) -> bool {
        matches!(err, AppError::Validation(ValidationError::ResponseFormat { .. }))
    }

    fn is_structure_error(err: &AppError, expected_field: &str) -> bool {
        matches!(
            err,
            AppError::Validation(ValidationError::InvalidStructure { field, .. }) if field == expected_field
        )
    }

    #[test]
    fn test_plain_json() {
        let verdict =
            repair_grade_response(r#"{"feedback":"Good","isCorrect":true,"isExcellent":false}"#)
                .unwrap();
        assert_eq!(verdict.feedback, "Good");
        assert!(verdict.is_correct);
        assert!(!verdict.is_excellent);
    }

    #[test]
    fn test_fenced_json() {
        let raw = "```json\n{\"feedback\":\"Good\",\"isCorrect\":true,\"isExcellent\":false}\n```";
        let verdict = repair_grade_response(raw).unwrap();
        assert_eq!(verdict.feedback, "Good");
        assert!(verdict.is_correct);
    }

    #[test]
    fn test_prose_around_json() {
        let raw = "Here is my assessment:\n{\"feedback\": \"Close, but SJF can starve.\", \"isCorrect\": false}\nHope this helps!";
        let verdict = repair_grade_response(raw).unwrap();
        assert_eq!(verdict.feedback, "Close, but SJF can starve.");
        assert!(!verdict.is_correct);
        assert!(!verdict.is_excellent);
    }

    #[test]
    fn test_nested_object_and_trailing_braces() {
        let raw = r#"Result: {"isCorrect": true, "meta": {"score": {"value": 9}}, "feedback": "ok"} and {"noise": 1}"#;
        let verdict = repair_grade_response(raw).unwrap();
        assert!(verdict.is_correct);
        assert_eq!(verdict.feedback, "ok");
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"Sure! {"feedback": "Use a set like {a, b} and escape \"}\" carefully", "isCorrect": true, "isExcellent": true} done"#;
        let verdict = repair_grade_response(raw).unwrap();
        assert_eq!(
            verdict.feedback,
            r#"Use a set like {a, b} and escape "}" carefully"#
        );
        assert!(verdict.is_excellent);
    }

    #[test]
    fn test_missing_is_correct() {
        let err = repair_grade_response(r#"{"feedback":"x"}"#).unwrap_err();
        assert!(is_structure_error(&err, "isCorrect"));
    }

    #[test]
    fn test_string_is_correct_is_rejected() {
        let err = repair_grade_response(r#"{"feedback":"x","isCorrect":"true"}"#).unwrap_err();
        assert!(is_structure_error(&err, "isCorrect"));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let verdict = repair_grade_response(r#"{"isCorrect":true,"feedback":"  "}"#).unwrap();
        assert_eq!(verdict.feedback, FEEDBACK_PLACEHOLDER);
        assert!(!verdict.is_excellent);

        let verdict = repair_grade_response(r#"{"isCorrect":true,"isExcellent":"yes"}"#).unwrap();
        assert!(!verdict.is_excellent);
    }

    #[test]
    fn test_inconsistent_verdicts_are_distinct() {
        let both = repair_grade_response(r#"{"isCorrect":true,"isExcellent":true}"#).unwrap();
        let odd = repair_grade_response(r#"{"isCorrect":false,"isExcellent":true}"#).unwrap();

        assert!(both.is_correct && both.is_excellent);
        assert!(!odd.is_correct && odd.is_excellent);
        assert!(!odd.is_policy_consistent());
        assert_ne!(both, odd);
    }

    #[test]
    fn test_garbage_is_format_error() {
        let err = repair_grade_response("I cannot grade this answer.").unwrap_err();
        assert!(is_format_error(&err));

        let err = repair_grade_response("{\"isCorrect\": tru").unwrap_err();
        assert!(is_format_error(&err));
    }

    #[test]
    fn test_non_object_is_format_error() {
        let err = repair_grade_response("[true, false]").unwrap_err();
        assert!(is_format_error(&err));
    }

    #[test]
    fn test_raw_text_kept_for_diagnostics() {
        match repair_grade_response("nope").unwrap_err() {
            AppError::Validation(ValidationError::ResponseFormat { raw, .. }) => {
                assert_eq!(raw, "nope")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{}\n```").trim(), "{}");
        assert_eq!(strip_fences("```\n{}```"), "\n{}");
        assert!(std::ptr::eq(fence_regex(), fence_regex()));
    }

    #[test]
    fn test_find_balanced_object_unbalanced() {
        assert_eq!(find_balanced_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(find_balanced_object("no braces"), None);
        assert_eq!(find_balanced_object("x {} y"), Some("{}"));
    }
}
