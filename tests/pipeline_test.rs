//! End-to-end pipeline tests over a counting mock client.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use futures_util::stream;
use promptify::{
    CompletionClient, ConversationMessage, FragmentStream, GenerateOptions, ModelConfig,
    Pipeline, PipelineConfig, PromptGenerator, PromptifyError, RenderedPrompt, Result,
    TemplatePrompter, UnifyModel, Variables,
};
use serde_json::{Value, json};
use tempfile::TempDir;

// ============================================================================
// Mocks
// ============================================================================

/// Echoes a JSON object naming the prompt, counting remote calls.
#[derive(Default)]
struct EchoClient {
    calls: AtomicU32,
}

impl EchoClient {
    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionClient for EchoClient {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(json!({ "prompt": prompt }).to_string())
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "prompt": prompt }).to_string();
        let (head, tail) = body.split_at(body.len() / 2);
        Ok(Box::pin(stream::iter(vec![
            Ok(head.to_string()),
            Ok(tail.to_string()),
            Ok("\n".to_string()),
        ])))
    }
}

/// Connects, then streams nothing.
#[derive(Default)]
struct SilentClient {
    calls: AtomicU32,
}

#[async_trait]
impl CompletionClient for SilentClient {
    fn name(&self) -> &str {
        "silent"
    }

    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(String::new())
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Box::pin(stream::empty()))
    }
}

/// Streams nothing but whitespace.
#[derive(Default)]
struct BlankClient {
    calls: AtomicU32,
}

#[async_trait]
impl CompletionClient for BlankClient {
    fn name(&self) -> &str {
        "blank"
    }

    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok("\n  ".into())
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Box::pin(stream::iter(vec![
            Ok("\n".to_string()),
            Ok("  ".to_string()),
        ])))
    }
}

/// Generator whose rendering always fails.
struct BrokenPrompter;

impl PromptGenerator for BrokenPrompter {
    fn generate(
        &self,
        _input: &str,
        _model: &ModelConfig,
        _variables: &Variables,
    ) -> Result<RenderedPrompt> {
        Err(PromptifyError::Template("bad value".into()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn model_over(client: Arc<dyn CompletionClient>) -> Arc<UnifyModel> {
    let config = ModelConfig::builder("k")
        .model("llama-3-8b-chat")
        .provider("fireworks-ai")
        .build()
        .unwrap();
    Arc::new(UnifyModel::with_client(config, client).unwrap())
}

fn prompter(template: &str) -> Arc<dyn PromptGenerator> {
    Arc::new(TemplatePrompter::new(template))
}

fn build_pipeline(
    prompters: Vec<Arc<dyn PromptGenerator>>,
    client: Arc<dyn CompletionClient>,
    dir: &TempDir,
    config: PipelineConfig,
) -> Pipeline {
    Pipeline::new(prompters, model_over(client), config.output_path(dir.path())).unwrap()
}

/// Messages logged so far, skipping the session header.
fn logged_messages(path: &Path) -> Vec<ConversationMessage> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn no_vars() -> Variables {
    Variables::new()
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn identical_prompts_make_one_remote_call() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![prompter("Extract: {{ text_input }}")],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    let first = pipeline.fit("fever", &no_vars()).await.unwrap();
    let second = pipeline.fit("fever", &no_vars()).await.unwrap();

    assert_eq!(client.call_count(), 1);
    assert_eq!(first, second);
    assert_eq!(pipeline.cache().unwrap().len(), 1);
    // Hits are still logged.
    assert_eq!(logged_messages(pipeline.logger().path()).len(), 2);
}

#[tokio::test]
async fn generators_rendering_the_same_prompt_share_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}"), prompter("{{text_input}}")],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    let outputs = pipeline.fit("same", &no_vars()).await.unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn disabled_cache_calls_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        client.clone(),
        &dir,
        PipelineConfig::default().cache_prompt(false),
    );

    pipeline.fit("x", &no_vars()).await.unwrap();
    pipeline.fit("x", &no_vars()).await.unwrap();

    assert_eq!(client.call_count(), 2);
    assert!(pipeline.cache().is_none());
}

#[tokio::test]
async fn failed_responses_are_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(SilentClient::default());
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    assert!(pipeline.fit("x", &no_vars()).await.is_none());
    assert!(pipeline.fit("x", &no_vars()).await.is_none());
    assert_eq!(client.calls.load(Ordering::Relaxed), 2);
    assert!(pipeline.cache().unwrap().is_empty());
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn template_error_returns_none_without_remote_call() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![Arc::new(BrokenPrompter) as Arc<dyn PromptGenerator>],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    assert!(pipeline.fit("x", &no_vars()).await.is_none());
    assert_eq!(client.call_count(), 0);
    assert!(logged_messages(pipeline.logger().path()).is_empty());
}

#[tokio::test]
async fn later_failure_discards_earlier_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![
            prompter("first {{ text_input }}"),
            Arc::new(BrokenPrompter) as Arc<dyn PromptGenerator>,
            prompter("third {{ text_input }}"),
        ],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    assert!(pipeline.fit("x", &no_vars()).await.is_none());
    // The first generator ran and was logged; the third never ran.
    assert_eq!(client.call_count(), 1);
    let logged = logged_messages(pipeline.logger().path());
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].template, "first x");
}

#[tokio::test]
async fn try_fit_surfaces_the_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ missing }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    let err = pipeline.try_fit("x", &no_vars()).await.unwrap_err();
    assert!(matches!(err, PromptifyError::Template(_)));
}

#[tokio::test]
async fn empty_stream_fails_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        Arc::new(SilentClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    let err = pipeline.try_fit("x", &no_vars()).await.unwrap_err();
    assert!(matches!(err, PromptifyError::EmptyResponse));
}

#[tokio::test]
async fn whitespace_only_stream_fails_and_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(BlankClient::default());
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    assert!(pipeline.fit("x", &no_vars()).await.is_none());
    assert!(pipeline.cache().unwrap().is_empty());
    assert!(logged_messages(pipeline.logger().path()).is_empty());

    let err = pipeline.try_fit("x", &no_vars()).await.unwrap_err();
    assert!(matches!(err, PromptifyError::EmptyResponse));
    assert_eq!(client.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn batch_continues_past_failed_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(EchoClient::default());
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        client.clone(),
        &dir,
        PipelineConfig::default(),
    );

    let results = pipeline.fit_batch(&["", "a", "  ", "b"], &no_vars()).await;

    assert_eq!(results.len(), 4);
    assert!(results[0].is_none());
    assert!(results[1].is_some());
    assert!(results[2].is_none());
    assert!(results[3].is_some());
    assert_eq!(client.call_count(), 2);
}

// ============================================================================
// Outputs and logging
// ============================================================================

#[tokio::test]
async fn outputs_follow_generator_order() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("one {{ text_input }}"), prompter("two {{ text_input }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    let outputs = pipeline.fit("x", &no_vars()).await.unwrap();
    assert_eq!(outputs[0].completion(), Some(&json!({ "prompt": "one x" })));
    assert_eq!(outputs[1].completion(), Some(&json!({ "prompt": "two x" })));
    // Final snapshots are trimmed.
    assert!(!outputs[0].text.ends_with('\n'));
}

#[tokio::test]
async fn structured_output_logs_completion() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    pipeline.fit("hello", &no_vars()).await.unwrap();
    let logged = logged_messages(pipeline.logger().path());

    assert_eq!(logged[0].completion, Some(json!({ "prompt": "hello" })));
    assert_eq!(logged[0].response, "{\"prompt\":\"hello\"}");
    assert_eq!(logged[0].variables["text_input"], "hello");
    assert_eq!(logged[0].prompt_identity, "Unknown");
}

#[tokio::test]
async fn unstructured_output_omits_completion() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default().structured_output(false),
    );

    let outputs = pipeline.fit("hello", &no_vars()).await.unwrap();
    let logged = logged_messages(pipeline.logger().path());

    assert!(logged[0].completion.is_none());
    // The response itself is still parsed.
    assert!(outputs[0].parsed.is_some());
}

#[tokio::test]
async fn file_templates_are_logged_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("ner.jinja");
    std::fs::write(&template_path, "Entities: {{ text_input }}").unwrap();

    let pipeline = build_pipeline(
        vec![Arc::new(TemplatePrompter::from_file(&template_path).unwrap()) as Arc<dyn PromptGenerator>],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    pipeline.fit("Paris", &no_vars()).await.unwrap();
    let logged = logged_messages(pipeline.logger().path());
    assert_eq!(logged[0].prompt_identity, "ner.jinja");
}

#[tokio::test]
async fn session_header_records_model_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ text_input }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    let content = std::fs::read_to_string(pipeline.logger().path()).unwrap();
    let header: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();

    assert_eq!(header["session_id"], pipeline.logger().session_id().to_string());
    assert_eq!(header["model"]["name"], "Unify");
    assert_eq!(header["model"]["model"], "llama-3-8b-chat");
    assert!(header["model"].get("api_key").is_none());
    assert!(pipeline.logger().path().starts_with(dir.path().join("conversations")));
}

#[tokio::test]
async fn per_call_variables_reach_the_template() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        vec![prompter("{{ task }}: {{ text_input }}")],
        Arc::new(EchoClient::default()),
        &dir,
        PipelineConfig::default(),
    );

    let mut vars = Variables::new();
    vars.insert("task".into(), json!("Summarise"));
    let outputs = pipeline.fit("text", &vars).await.unwrap();
    assert_eq!(
        outputs[0].completion(),
        Some(&json!({ "prompt": "Summarise: text" }))
    );
}
