//! HTTP 接口
//!
//! - `server`：路由、共享上下文、启动
//! - `handlers`：各接口处理函数和错误响应

pub mod handlers;
pub mod server;

pub use server::{create_router, run, AppContext};
