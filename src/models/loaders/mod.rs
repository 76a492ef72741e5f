pub mod lecture_loader;

pub use lecture_loader::{is_valid_lecture_id, lecture_path, list_lectures, load_lecture};
