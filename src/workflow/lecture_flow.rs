//! 讲稿处理流程 - 流程层
//!
//! 核心职责：定义"一个讲稿"的完整处理流程
//!
//! 流程顺序：
//! 1. 输出已存在 → 跳过（不调用模型）
//! 2. 读取讲稿 → 截断 → 构建提示词
//! 3. 调用模型（限流时重试）
//! 4. 解析并校验结构化记录
//! 5. 原子地创建输出文件（已存在则视为跳过）

use std::io::ErrorKind;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::clients::{GenerateRequest, GenerativeModel};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{lecture_record_schema, LectureRecord};
use crate::services::prompts;
use crate::services::{extract_json_object, generate_with_retry, RetryPolicy};
use crate::workflow::lecture_ctx::LectureCtx;

/// 讲稿处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// 生成并写入了新记录
    Generated,
    /// 跳过（输出已存在）
    Skipped,
}

/// 讲稿处理流程
///
/// - 编排单个讲稿的处理流程
/// - 不关心批次、间隔和统计
/// - 只依赖模型客户端和业务能力（services）
pub struct LectureFlow {
    model: Arc<dyn GenerativeModel>,
    retry_policy: RetryPolicy,
    max_prompt_chars: usize,
    verbose_logging: bool,
}

impl LectureFlow {
    /// 创建新的讲稿处理流程
    pub fn new(model: Arc<dyn GenerativeModel>, config: &Config) -> Self {
        Self {
            model,
            retry_policy: config.extractor_retry_policy(),
            max_prompt_chars: config.max_prompt_chars,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(&self, ctx: &LectureCtx) -> AppResult<ProcessResult> {
        // ========== 1. 已处理的讲稿直接跳过 ==========
        if tokio::fs::metadata(&ctx.output_path).await.is_ok() {
            info!("{} ⏭️ 输出已存在，跳过", ctx);
            return Ok(ProcessResult::Skipped);
        }

        // ========== 2. 读取讲稿并构建提示词 ==========
        info!("{} 📄 正在处理...", ctx);
        let transcript = tokio::fs::read_to_string(&ctx.source_path)
            .await
            .map_err(|e| AppError::file_read_failed(ctx.source_path.display().to_string(), e))?;

        let char_count = transcript.chars().count();
        if char_count > self.max_prompt_chars {
            debug!(
                "{} 讲稿共 {} 字符，截断为前 {} 字符",
                ctx, char_count, self.max_prompt_chars
            );
        }

        let prompt = prompts::lecture_prompt(&ctx.lecture_key, &transcript, self.max_prompt_chars);
        let request = GenerateRequest::text(prompt).with_schema(lecture_record_schema().clone());

        // ========== 3. 调用模型 ==========
        let raw = generate_with_retry(
            self.model.as_ref(),
            &request,
            &self.retry_policy,
            &ctx.file_name,
        )
        .await?;

        // ========== 4. 解析并校验 ==========
        let record = self.parse_record(ctx, &raw)?;
        if self.verbose_logging {
            info!(
                "{} 标题: {} | 节点 {} 个 | 连线 {} 个 | 题目 {} 道",
                ctx,
                record.title,
                record.mind_map.nodes.len(),
                record.mind_map.edges.len(),
                record.quiz.len()
            );
        }

        // ========== 5. 写入 ==========
        self.persist(ctx, &record).await
    }

    /// 解析模型输出，把 id 强制设为讲稿文件名
    fn parse_record(&self, ctx: &LectureCtx, raw: &str) -> AppResult<LectureRecord> {
        let object = extract_json_object(raw)?;
        let mut record = LectureRecord::from_value(Value::Object(object))?;

        if record.id != ctx.lecture_key {
            debug!("{} 模型给出的 id '{}' 被替换为 '{}'", ctx, record.id, ctx.lecture_key);
            record.id = ctx.lecture_key.clone();
        }

        record.validate()?;
        Ok(record)
    }

    async fn persist(&self, ctx: &LectureCtx, record: &LectureRecord) -> AppResult<ProcessResult> {
        let json = serde_json::to_string_pretty(record)?;
        let path_display = ctx.output_path.display().to_string();

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&ctx.output_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("{} ⚠️ 输出文件已被其他进程创建，跳过", ctx);
                return Ok(ProcessResult::Skipped);
            }
            Err(e) => return Err(AppError::file_write_failed(path_display, e)),
        };

        let written = async {
            file.write_all(json.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // 写了一半的文件会被当成"已处理"，必须删掉
            let _ = tokio::fs::remove_file(&ctx.output_path).await;
            return Err(AppError::file_write_failed(path_display, e));
        }

        info!("{} ✓ 已保存 {}", ctx, path_display);
        Ok(ProcessResult::Generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScriptedModel;
    use crate::error::ValidationError;
    use crate::models::lecture::tests::sample_record_json;
    use std::path::Path;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        raw_dir: std::path::PathBuf,
        processed_dir: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let raw_dir = dir.path().join("raw");
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::create_dir_all(&processed_dir).unwrap();
        Fixture {
            _dir: dir,
            raw_dir,
            processed_dir,
        }
    }

    fn flow(model: Arc<ScriptedModel>, max_prompt_chars: usize) -> LectureFlow {
        LectureFlow {
            model,
            retry_policy: RetryPolicy::fixed(3, Duration::from_secs(20)),
            max_prompt_chars,
            verbose_logging: true,
        }
    }

    fn ctx_for(fx: &Fixture, name: &str, content: &str) -> LectureCtx {
        let path = fx.raw_dir.join(name);
        std::fs::write(&path, content).unwrap();
        LectureCtx::new(&path, &fx.processed_dir, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_generates_record_with_file_stem_id() {
        let fx = fixture();
        let ctx = ctx_for(&fx, "class1.txt", "Today we cover scheduling.");
        let model = Arc::new(
            ScriptedModel::new().then_ok(sample_record_json("whatever-the-model-said").to_string()),
        );

        let result = flow(model.clone(), 30_000).run(&ctx).await.unwrap();
        assert_eq!(result, ProcessResult::Generated);

        let saved = std::fs::read_to_string(&ctx.output_path).unwrap();
        let record = LectureRecord::parse(&saved).unwrap();
        assert_eq!(record.id, "class1");
        assert_eq!(record.title, "Process Scheduling");

        let request = &model.requests()[0];
        assert!(request.response_schema.is_some());
        assert!(request.prompt.contains("Today we cover scheduling."));
    }

    #[tokio::test]
    async fn test_existing_output_is_not_touched() {
        let fx = fixture();
        let ctx = ctx_for(&fx, "class1.txt", "text");
        std::fs::write(&ctx.output_path, "{\"hand\": \"edited\"}").unwrap();
        let model = Arc::new(ScriptedModel::new().always("unused"));

        let result = flow(model.clone(), 30_000).run(&ctx).await.unwrap();

        assert_eq!(result, ProcessResult::Skipped);
        assert_eq!(model.call_count(), 0);
        assert_eq!(
            std::fs::read_to_string(&ctx.output_path).unwrap(),
            "{\"hand\": \"edited\"}"
        );
    }

    #[tokio::test]
    async fn test_transcript_is_truncated() {
        let fx = fixture();
        let content = format!("{}SHOULD_NOT_APPEAR", "x".repeat(100));
        let ctx = ctx_for(&fx, "long.txt", &content);
        let model = Arc::new(ScriptedModel::new().then_ok(sample_record_json("long").to_string()));

        flow(model.clone(), 100).run(&ctx).await.unwrap();

        let prompt = &model.requests()[0].prompt;
        assert!(prompt.contains(&"x".repeat(100)));
        assert!(!prompt.contains("SHOULD_NOT_APPEAR"));
    }

    #[tokio::test]
    async fn test_invalid_record_is_not_persisted() {
        let fx = fixture();
        let ctx = ctx_for(&fx, "bad.txt", "text");
        let mut record = sample_record_json("bad");
        record["quiz"][0]["correctAnswer"] = serde_json::json!(4);
        let model = Arc::new(ScriptedModel::new().then_ok(record.to_string()).then_ok("unused"));

        let err = flow(model.clone(), 30_000).run(&ctx).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidStructure { .. })
        ));
        assert_eq!(model.call_count(), 1);
        assert!(!Path::new(&ctx.output_path).exists());
    }

    #[tokio::test]
    async fn test_fenced_record_is_accepted() {
        let fx = fixture();
        let ctx = ctx_for(&fx, "fenced.txt", "text");
        let fenced = format!("```json\n{}\n```", sample_record_json("fenced"));
        let model = Arc::new(ScriptedModel::new().then_ok(fenced));

        let result = flow(model, 30_000).run(&ctx).await.unwrap();
        assert_eq!(result, ProcessResult::Generated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_then_saved() {
        let fx = fixture();
        let ctx = ctx_for(&fx, "class2.txt", "text");
        let model = Arc::new(
            ScriptedModel::new()
                .then_rate_limited()
                .then_ok(sample_record_json("class2").to_string()),
        );

        let start = tokio::time::Instant::now();
        let result = flow(model.clone(), 30_000).run(&ctx).await.unwrap();

        assert_eq!(result, ProcessResult::Generated);
        assert_eq!(model.call_count(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_missing_source_is_file_error() {
        let fx = fixture();
        let ctx = LectureCtx::new(&fx.raw_dir.join("gone.txt"), &fx.processed_dir, 1, 1).unwrap();
        let model = Arc::new(ScriptedModel::new().always("unused"));

        let err = flow(model.clone(), 30_000).run(&ctx).await.unwrap_err();
        assert!(matches!(err, AppError::File(_)));
        assert_eq!(model.call_count(), 0);
    }
}
