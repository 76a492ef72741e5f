//! 提示词构建
//!
//! 每种请求一个函数，只拼字符串，不调用模型。

use crate::models::{ChatTurn, OPTIONS_PER_QUESTION, QUESTIONS_PER_LECTURE};

/// 按字符数截断（不会切在 UTF-8 字符中间）
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// 讲稿 → 结构化笔记
///
/// # 参数
/// - `lecture_key`: 讲稿文件名（不含扩展名）
/// - `transcript`: 讲稿全文
/// - `max_chars`: 讲稿截断长度
pub fn lecture_prompt(lecture_key: &str, transcript: &str, max_chars: usize) -> String {
    let content = truncate_chars(transcript, max_chars);
    format!(
        r#"You are preparing study material from a lecture transcript (lecture: {key}).

Produce one JSON object with:
1. "title": a short title for the lecture.
2. "summary": a concise summary of the key concepts.
3. "mindMap": nodes and edges describing the key concepts and how they relate.
   - Place the central concept at position (0, 0) and spread the others outward around it.
   - Every node uses type "default" and keeps its text in data.label.
   - Every edge source and target must be the id of a node you listed.
4. "quiz": exactly {questions} multiple-choice questions that test understanding.
   - Each question has exactly {options} options.
   - "correctAnswer" is the zero-based index of the right option.
   - "explanation" says why that option is right.

Transcript:
{content}"#,
        key = lecture_key,
        questions = QUESTIONS_PER_LECTURE,
        options = OPTIONS_PER_QUESTION,
        content = content,
    )
}

/// 提示（不直接给出答案）
pub fn hint_prompt(question: &str) -> String {
    format!(
        r#"You are a patient tutor. A student is stuck on this question:
"{question}"

Give one hint that points them toward the right answer without revealing it.
Keep it under 50 words."#
    )
}

/// 围绕一道题的多轮对话
///
/// 对话历史随每次请求完整传入，服务端不保存状态。
pub fn chat_prompt(
    question: &str,
    correct_option: &str,
    explanation: &str,
    history: &[ChatTurn],
    user_message: &str,
) -> String {
    let history_json = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are a tutor discussing a quiz question with a student.
Question: "{question}"
Correct answer: "{correct_option}"
Official explanation: "{explanation}"

Conversation so far (JSON):
{history_json}

Student: "{user_message}"

Reply to the student. Answer their questions and clear up the concept behind the answer.
Stay conversational and encouraging."#
    )
}

/// 评分所需的输入
#[derive(Debug, Clone, Copy)]
pub struct GradeInput<'a> {
    pub question: &'a str,
    pub selected_option: &'a str,
    pub correct_option: &'a str,
    pub reasoning: &'a str,
    pub explanation: &'a str,
}

/// 选择题评分，要求模型只输出 JSON
pub fn grade_prompt(input: &GradeInput<'_>) -> String {
    format!(
        r#"You are a tutor grading a student's answer.

Question: "{question}"
Student's answer: "{selected}"
Correct answer: "{correct}"
Student's reasoning: "{reasoning}"
Official explanation: "{explanation}"

Respond with a single JSON object and nothing else (no markdown):
{{
  "feedback": "concise feedback, under 100 words",
  "isCorrect": true or false,
  "isExcellent": true or false
}}

Rules:
- isCorrect is true only when the student's answer matches the correct answer.
- isExcellent is true only when isCorrect is true and the reasoning is sound.
- feedback explains why the answer is right or wrong."#,
        question = input.question,
        selected = input.selected_option,
        correct = input.correct_option,
        reasoning = input.reasoning,
        explanation = input.explanation,
    )
}

/// 期末题评分（可附带手写答案图片）
pub fn exam_prompt(question: &str, text_answer: Option<&str>, has_image: bool) -> String {
    let text_answer = text_answer
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("(none)");
    let image_note = if has_image {
        "An image of the student's handwritten work is attached; read it carefully."
    } else {
        "No image was submitted."
    };

    format!(
        r#"You are a strict but fair professor grading a final exam question.
Question: "{question}"
Student's written answer: "{text_answer}"
{image_note}

1. Check that the reasoning and the final result are correct.
2. Point out any mistakes in the steps.
3. Finish with a pass or fail grade and a short explanation."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("调度算法", 2), "调度");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_lecture_prompt_truncates_transcript() {
        let transcript = "a".repeat(40) + "TAIL";
        let prompt = lecture_prompt("class1", &transcript, 40);
        assert!(prompt.contains("lecture: class1"));
        assert!(prompt.contains(&"a".repeat(40)));
        assert!(!prompt.contains("TAIL"));
        assert!(prompt.contains("exactly 5 multiple-choice"));
    }

    #[test]
    fn test_chat_prompt_embeds_history() {
        let history = vec![ChatTurn::user("why?"), ChatTurn::assistant("because")];
        let prompt = chat_prompt("Q", "B", "E", &history, "ok, and then?");
        assert!(prompt.contains(r#"{"role":"user","content":"why?"}"#));
        assert!(prompt.contains(r#""role":"assistant""#));
        assert!(prompt.contains("ok, and then?"));
    }

    #[test]
    fn test_grade_prompt_lists_inputs() {
        let prompt = grade_prompt(&GradeInput {
            question: "Which is preemptive?",
            selected_option: "FCFS",
            correct_option: "Round Robin",
            reasoning: "it runs first",
            explanation: "RR uses time slices",
        });
        assert!(prompt.contains("Student's answer: \"FCFS\""));
        assert!(prompt.contains("\"isCorrect\""));
    }

    #[test]
    fn test_exam_prompt_without_answer() {
        let prompt = exam_prompt("Explain paging", None, true);
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("image"));
    }
}
