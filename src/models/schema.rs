//! `LectureRecord` 的输出约束（Gemini `responseSchema` 使用的 OpenAPI 子集）

use std::sync::OnceLock;

use serde_json::{json, Value};

/// 生成讲义时要求模型遵循的 JSON 结构
pub fn lecture_record_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let node = json!({
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "type": { "type": "STRING" },
                "data": {
                    "type": "OBJECT",
                    "properties": { "label": { "type": "STRING" } },
                    "required": ["label"]
                },
                "position": {
                    "type": "OBJECT",
                    "properties": {
                        "x": { "type": "NUMBER" },
                        "y": { "type": "NUMBER" }
                    },
                    "required": ["x", "y"]
                }
            },
            "required": ["id", "type", "data", "position"]
        });

        let edge = json!({
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "source": { "type": "STRING" },
                "target": { "type": "STRING" }
            },
            "required": ["id", "source", "target"]
        });

        let question = json!({
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "question": { "type": "STRING" },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "minItems": 4,
                    "maxItems": 4
                },
                "correctAnswer": { "type": "INTEGER" },
                "explanation": { "type": "STRING" }
            },
            "required": ["id", "question", "options", "correctAnswer", "explanation"]
        });

        json!({
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" },
                "mindMap": {
                    "type": "OBJECT",
                    "properties": {
                        "nodes": { "type": "ARRAY", "items": node },
                        "edges": { "type": "ARRAY", "items": edge }
                    },
                    "required": ["nodes", "edges"]
                },
                "quiz": { "type": "ARRAY", "items": question }
            },
            "required": ["id", "title", "summary", "mindMap", "quiz"]
        })
    })
}
