use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// 每道选择题的选项数量
pub const OPTIONS_PER_QUESTION: usize = 4;

/// 每份讲义生成的题目数量
pub const QUESTIONS_PER_LECTURE: usize = 5;

/// 一节课的结构化内容
///
/// 由批量生成流程为每份讲稿生成一次，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureRecord {
    /// 来自讲稿文件名（去掉扩展名）
    pub id: String,
    pub title: String,
    pub summary: String,
    pub mind_map: MindMap,
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMap {
    pub nodes: Vec<MindMapNode>,
    pub edges: Vec<MindMapEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub data: NodeData,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// 单选题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// `options` 中正确答案的下标
    pub correct_answer: usize,
    pub explanation: String,
}

impl QuizQuestion {
    /// 校验选项数量与答案下标
    pub fn validate(&self) -> AppResult<()> {
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(AppError::invalid_structure(
                format!("quiz[{}].options", self.id),
                format!(
                    "需要 {} 个选项，实际 {} 个",
                    OPTIONS_PER_QUESTION,
                    self.options.len()
                ),
            ));
        }
        if self.correct_answer >= self.options.len() {
            return Err(AppError::invalid_structure(
                format!("quiz[{}].correctAnswer", self.id),
                format!(
                    "下标 {} 超出范围 [0, {}]",
                    self.correct_answer,
                    self.options.len() - 1
                ),
            ));
        }
        Ok(())
    }
}

impl MindMap {
    /// 节点 id 唯一，且每条边的两端都指向已存在的节点
    pub fn validate(&self) -> AppResult<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(AppError::invalid_structure(
                    "mindMap.nodes",
                    format!("节点 id 重复: {}", node.id),
                ));
            }
        }

        for edge in &self.edges {
            for (end, node_id) in [("source", &edge.source), ("target", &edge.target)] {
                if !ids.contains(node_id.as_str()) {
                    return Err(AppError::invalid_structure(
                        format!("mindMap.edges[{}].{}", edge.id, end),
                        format!("引用了不存在的节点: {}", node_id),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl LectureRecord {
    /// 校验所有模型无法自行保证的约束
    pub fn validate(&self) -> AppResult<()> {
        self.mind_map.validate()?;
        for question in &self.quiz {
            question.validate()?;
        }
        Ok(())
    }

    /// 解析模型输出并校验
    pub fn parse(raw: &str) -> AppResult<Self> {
        let record: LectureRecord = serde_json::from_str(raw.trim()).map_err(|e| {
            AppError::Validation(crate::error::ValidationError::ResponseFormat {
                reason: e.to_string(),
                raw: raw.to_string(),
            })
        })?;
        record.validate()?;
        Ok(record)
    }

    /// 从已解析的 JSON 构造（不校验，调用方在修改 id 后再校验）
    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        let raw = value.to_string();
        serde_json::from_value(value).map_err(|e| {
            AppError::Validation(crate::error::ValidationError::ResponseFormat {
                reason: e.to_string(),
                raw,
            })
        })
    }
}

/// 课程列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LectureSummary {
    pub id: String,
    pub title: String,
}

impl From<&LectureRecord> for LectureSummary {
    fn from(record: &LectureRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;

    pub(crate) fn sample_record_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Process Scheduling",
            "summary": "Round robin, priorities and multilevel feedback queues.",
            "mindMap": {
                "nodes": [
                    {"id": "1", "type": "default", "data": {"label": "Scheduling"}, "position": {"x": 0, "y": 0}},
                    {"id": "2", "type": "default", "data": {"label": "Round Robin"}, "position": {"x": 200, "y": 0}},
                    {"id": "3", "type": "default", "data": {"label": "Priority"}, "position": {"x": -200, "y": 100.5}}
                ],
                "edges": [
                    {"id": "e1-2", "source": "1", "target": "2"},
                    {"id": "e1-3", "source": "1", "target": "3"}
                ]
            },
            "quiz": [
                {
                    "id": "q1",
                    "question": "Which policy uses a time quantum?",
                    "options": ["FCFS", "Round Robin", "SJF", "Priority"],
                    "correctAnswer": 1,
                    "explanation": "Round robin preempts after each quantum."
                }
            ]
        })
    }

    #[test]
    fn test_parse_valid_record() {
        let raw = sample_record_json("lecture-01").to_string();
        let record = LectureRecord::parse(&raw).unwrap();

        assert_eq!(record.id, "lecture-01");
        assert_eq!(record.mind_map.nodes[2].data.label, "Priority");
        assert_eq!(record.mind_map.nodes[2].position.y, 100.5);
        assert_eq!(record.quiz[0].options[record.quiz[0].correct_answer], "Round Robin");
    }

    #[test]
    fn test_wire_names_survive_round_trip() {
        let raw = sample_record_json("x").to_string();
        let record = LectureRecord::parse(&raw).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("mindMap").is_some());
        assert_eq!(value["mindMap"]["nodes"][0]["type"], "default");
        assert_eq!(value["quiz"][0]["correctAnswer"], 1);
    }

    #[test]
    fn test_correct_answer_out_of_range_is_rejected() {
        let mut value = sample_record_json("x");
        value["quiz"][0]["correctAnswer"] = json!(4);

        let err = LectureRecord::parse(&value.to_string()).unwrap_err();
        match err {
            AppError::Validation(ValidationError::InvalidStructure { field, .. }) => {
                assert_eq!(field, "quiz[q1].correctAnswer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_option_count_is_rejected() {
        let mut value = sample_record_json("x");
        value["quiz"][0]["options"] = json!(["a", "b", "c"]);
        assert!(LectureRecord::parse(&value.to_string()).is_err());
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let mut value = sample_record_json("x");
        value["mindMap"]["edges"][1]["target"] = json!("99");

        let err = LectureRecord::parse(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_duplicate_node_id_is_rejected() {
        let mut value = sample_record_json("x");
        value["mindMap"]["nodes"][2]["id"] = json!("2");
        assert!(LectureRecord::parse(&value.to_string()).is_err());
    }

    #[test]
    fn test_missing_field_is_format_error() {
        let mut value = sample_record_json("x");
        value.as_object_mut().unwrap().remove("summary");

        let err = LectureRecord::parse(&value.to_string()).unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::ResponseFormat { .. })
        ));
    }

    #[test]
    fn test_negative_answer_index_fails_to_parse() {
        let mut value = sample_record_json("x");
        value["quiz"][0]["correctAnswer"] = json!(-1);
        assert!(LectureRecord::parse(&value.to_string()).is_err());
    }
}
