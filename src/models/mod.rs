//! 数据模型

pub mod chat;
pub mod grade;
pub mod lecture;
pub mod loaders;
pub mod schema;

pub use chat::{ChatRole, ChatTurn};
pub use grade::GradeVerdict;
pub use lecture::{
    LectureRecord, LectureSummary, MindMap, MindMapEdge, MindMapNode, QuizQuestion,
    OPTIONS_PER_QUESTION, QUESTIONS_PER_LECTURE,
};
pub use loaders::{list_lectures, load_lecture};
pub use schema::lecture_record_schema;
