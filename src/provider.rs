use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

#[cfg(test)]
use mockall::automock;

use crate::error::{ExamPrepError, Result};
use crate::models::{
    GeneratedSequence, GenerationRequest, ModelOption, ModelRole, QaRequest, QaResponse,
};
use crate::transport::Transport;

/// Extractive question-answering handle
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    fn model_id(&self) -> &str;
    async fn answer(&self, req: &QaRequest) -> Result<QaResponse>;
}

/// Text-generation handle
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, req: &GenerationRequest) -> Result<Vec<GeneratedSequence>>;
}

/// Does the expensive part of turning an identifier into a handle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_qa(&self, model_id: &str) -> Result<Arc<dyn QuestionAnswerer>>;
    async fn load_generator(&self, model_id: &str) -> Result<Arc<dyn TextGenerator>>;
}

pub struct RemoteQa {
    tx: Arc<dyn Transport>,
    model_id: String,
}

#[async_trait]
impl QuestionAnswerer for RemoteQa {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn answer(&self, req: &QaRequest) -> Result<QaResponse> {
        let payload = serde_json::to_value(req)?;
        let value = self.tx.invoke(&self.model_id, &payload).await?;
        serde_json::from_value(value).map_err(|e| {
            ExamPrepError::Inference(format!(
                "Unexpected answer shape from '{}': {e}",
                self.model_id
            ))
        })
    }
}

pub struct RemoteGenerator {
    tx: Arc<dyn Transport>,
    model_id: String,
}

#[async_trait]
impl TextGenerator for RemoteGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, req: &GenerationRequest) -> Result<Vec<GeneratedSequence>> {
        let payload = serde_json::to_value(req)?;
        let value = self.tx.invoke(&self.model_id, &payload).await?;
        serde_json::from_value(value).map_err(|e| {
            ExamPrepError::Inference(format!(
                "Unexpected generation shape from '{}': {e}",
                self.model_id
            ))
        })
    }
}

/// Loads handles backed by the hosted inference API
pub struct HubModelLoader {
    tx: Arc<dyn Transport>,
    verify_on_load: bool,
}

impl HubModelLoader {
    pub fn new(tx: Arc<dyn Transport>, verify_on_load: bool) -> Self {
        Self { tx, verify_on_load }
    }

    async fn verify(&self, role: ModelRole, model_id: &str) -> Result<()> {
        if !self.verify_on_load {
            return Ok(());
        }
        self.tx
            .probe(model_id)
            .await
            .map_err(|e| ExamPrepError::ModelLoad {
                role,
                model_id: model_id.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ModelLoader for HubModelLoader {
    async fn load_qa(&self, model_id: &str) -> Result<Arc<dyn QuestionAnswerer>> {
        self.verify(ModelRole::QuestionAnswering, model_id).await?;
        Ok(Arc::new(RemoteQa {
            tx: Arc::clone(&self.tx),
            model_id: model_id.to_string(),
        }))
    }

    async fn load_generator(&self, model_id: &str) -> Result<Arc<dyn TextGenerator>> {
        self.verify(ModelRole::TextGeneration, model_id).await?;
        Ok(Arc::new(RemoteGenerator {
            tx: Arc::clone(&self.tx),
            model_id: model_id.to_string(),
        }))
    }
}

/// Both handles a view needs
#[derive(Clone)]
pub struct ModelHandles {
    pub qa: Arc<dyn QuestionAnswerer>,
    pub generator: Arc<dyn TextGenerator>,
}

type Slots<T> = Mutex<HashMap<String, Arc<OnceCell<T>>>>;

/// Process-wide memo of loaded handles, one lazily filled slot per identifier.
///
/// Entries are never evicted. The table lock is only held to find a slot; the
/// load runs under that slot alone, so concurrent first requests for one
/// identifier load it once while lookups of other identifiers proceed.
pub struct ModelProvider {
    loader: Arc<dyn ModelLoader>,
    qa_catalog: Vec<ModelOption>,
    gen_catalog: Vec<ModelOption>,
    qa_slots: Slots<Arc<dyn QuestionAnswerer>>,
    gen_slots: Slots<Arc<dyn TextGenerator>>,
}

impl ModelProvider {
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        qa_catalog: Vec<ModelOption>,
        gen_catalog: Vec<ModelOption>,
    ) -> Self {
        Self {
            loader,
            qa_catalog,
            gen_catalog,
            qa_slots: Mutex::new(HashMap::new()),
            gen_slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn qa_catalog(&self) -> &[ModelOption] {
        &self.qa_catalog
    }

    pub fn gen_catalog(&self) -> &[ModelOption] {
        &self.gen_catalog
    }

    pub fn is_known(&self, role: ModelRole, model_id: &str) -> bool {
        let catalog = match role {
            ModelRole::QuestionAnswering => &self.qa_catalog,
            ModelRole::TextGeneration => &self.gen_catalog,
        };
        catalog.iter().any(|m| m.id == model_id)
    }

    pub async fn get_handles(&self, qa_model_id: &str, gen_model_id: &str) -> Result<ModelHandles> {
        for (role, id) in [
            (ModelRole::QuestionAnswering, qa_model_id),
            (ModelRole::TextGeneration, gen_model_id),
        ] {
            if !self.is_known(role, id) {
                return Err(ExamPrepError::ModelLoad {
                    role,
                    model_id: id.to_string(),
                    reason: "identifier is not in the model catalog".to_string(),
                });
            }
        }

        let qa = memoized(&self.qa_slots, qa_model_id, || async {
            tracing::info!(model = %qa_model_id, "Loading question-answering model");
            self.loader.load_qa(qa_model_id).await
        })
        .await?;

        let generator = memoized(&self.gen_slots, gen_model_id, || async {
            tracing::info!(model = %gen_model_id, "Loading text-generation model");
            self.loader.load_generator(gen_model_id).await
        })
        .await?;

        Ok(ModelHandles { qa, generator })
    }

    /// Number of handles currently memoized
    pub async fn cached_models(&self) -> usize {
        let qa = self.qa_slots.lock().await;
        let generators = self.gen_slots.lock().await;
        qa.values().filter(|slot| slot.initialized()).count()
            + generators.values().filter(|slot| slot.initialized()).count()
    }
}

/// Returns the handle in `id`'s slot, running `load` if the slot is empty.
/// A failed load leaves the slot empty for the next caller.
async fn memoized<T, F, Fut>(slots: &Slots<T>, id: &str, load: F) -> Result<T>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let slot = {
        let mut slots = slots.lock().await;
        Arc::clone(slots.entry(id.to_string()).or_default())
    };
    slot.get_or_try_init(load).await.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::QaAnswer;

    struct StaticQa(String);

    #[async_trait]
    impl QuestionAnswerer for StaticQa {
        fn model_id(&self) -> &str {
            &self.0
        }
        async fn answer(&self, _req: &QaRequest) -> Result<QaResponse> {
            Ok(QaResponse::Single(QaAnswer {
                answer: "60".to_string(),
                score: 0.9,
                start: None,
                end: None,
            }))
        }
    }

    struct StaticGenerator(String);

    #[async_trait]
    impl TextGenerator for StaticGenerator {
        fn model_id(&self) -> &str {
            &self.0
        }
        async fn generate(&self, _req: &GenerationRequest) -> Result<Vec<GeneratedSequence>> {
            Ok(vec![GeneratedSequence {
                generated_text: "text".to_string(),
            }])
        }
    }

    fn counting_loader(qa_loads: usize, gen_loads: usize) -> MockModelLoader {
        let mut loader = MockModelLoader::new();
        loader.expect_load_qa().times(qa_loads).returning(|id| {
            Ok(Arc::new(StaticQa(id.to_string())) as Arc<dyn QuestionAnswerer>)
        });
        loader.expect_load_generator().times(gen_loads).returning(|id| {
            Ok(Arc::new(StaticGenerator(id.to_string())) as Arc<dyn TextGenerator>)
        });
        loader
    }

    fn provider(loader: MockModelLoader) -> ModelProvider {
        let cfg = Config::default();
        ModelProvider::new(
            Arc::new(loader),
            cfg.models.qa_catalog.clone(),
            cfg.models.gen_catalog.clone(),
        )
    }

    #[tokio::test]
    async fn test_same_pair_returns_identical_handles_for_every_catalog_entry() {
        let cfg = Config::default();
        let pairs: Vec<(String, String)> = cfg
            .models
            .qa_catalog
            .iter()
            .flat_map(|qa| {
                cfg.models
                    .gen_catalog
                    .iter()
                    .map(move |g| (qa.id.clone(), g.id.clone()))
            })
            .collect();

        let provider = provider(counting_loader(3, 3));
        for (qa_id, gen_id) in &pairs {
            let first = provider.get_handles(qa_id, gen_id).await.expect("loads");
            let second = provider.get_handles(qa_id, gen_id).await.expect("cached");
            assert!(Arc::ptr_eq(&first.qa, &second.qa));
            assert!(Arc::ptr_eq(&first.generator, &second.generator));
            assert_eq!(first.qa.model_id(), qa_id);
            assert_eq!(first.generator.model_id(), gen_id);
        }
        assert_eq!(provider.cached_models().await, 6);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_load_once() {
        let provider = Arc::new(provider(counting_loader(1, 1)));
        let tasks = (0..8).map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                provider
                    .get_handles("deepset/roberta-base-squad2", "gpt2")
                    .await
            })
        });
        let handles: Vec<ModelHandles> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.expect("task completes").expect("loads"))
            .collect();
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0].qa, &w[1].qa)));
        assert!(
            handles
                .windows(2)
                .all(|w| Arc::ptr_eq(&w[0].generator, &w[1].generator))
        );
    }

    /// Never finishes loading `stuck`; everything else loads at once.
    struct StuckLoader {
        stuck: &'static str,
        started: tokio::sync::Notify,
    }

    #[async_trait]
    impl ModelLoader for StuckLoader {
        async fn load_qa(&self, model_id: &str) -> Result<Arc<dyn QuestionAnswerer>> {
            if model_id == self.stuck {
                self.started.notify_one();
                std::future::pending::<()>().await;
            }
            Ok(Arc::new(StaticQa(model_id.to_string())))
        }

        async fn load_generator(&self, model_id: &str) -> Result<Arc<dyn TextGenerator>> {
            Ok(Arc::new(StaticGenerator(model_id.to_string())))
        }
    }

    #[tokio::test]
    async fn test_slow_load_does_not_block_cached_lookups() {
        let cfg = Config::default();
        let loader = Arc::new(StuckLoader {
            stuck: "deepset/roberta-base-squad2",
            started: tokio::sync::Notify::new(),
        });
        let provider = Arc::new(ModelProvider::new(
            Arc::clone(&loader) as Arc<dyn ModelLoader>,
            cfg.models.qa_catalog.clone(),
            cfg.models.gen_catalog.clone(),
        ));

        let cached = provider
            .get_handles("distilbert-base-uncased-distilled-squad", "gpt2")
            .await
            .expect("loads");

        let slow = Arc::clone(&provider);
        let pending = tokio::spawn(async move {
            slow.get_handles("deepset/roberta-base-squad2", "gpt2").await
        });
        loader.started.notified().await;

        let again = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            provider.get_handles("distilbert-base-uncased-distilled-squad", "gpt2"),
        )
        .await
        .expect("cached lookup must not wait for another model's load")
        .expect("cached");
        assert!(Arc::ptr_eq(&cached.qa, &again.qa));

        // A different generator is still free to load while the QA load hangs
        tokio::time::timeout(
            std::time::Duration::from_millis(500),
            provider.get_handles("bert-large-uncased-whole-word-masking-finetuned-squad", "google/flan-t5-base"),
        )
        .await
        .expect("unrelated load must not wait")
        .expect("loads");

        assert!(!pending.is_finished());
        pending.abort();
    }

    #[tokio::test]
    async fn test_changed_identifier_returns_different_handle() {
        let provider = provider(counting_loader(2, 1));
        let before = provider
            .get_handles("distilbert-base-uncased-distilled-squad", "gpt2")
            .await
            .expect("loads");
        let after = provider
            .get_handles("deepset/roberta-base-squad2", "gpt2")
            .await
            .expect("loads");
        assert!(!Arc::ptr_eq(&before.qa, &after.qa));
        assert!(Arc::ptr_eq(&before.generator, &after.generator));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_model_load_error() {
        let provider = provider(counting_loader(0, 0));
        let err = provider
            .get_handles("distilbert-base-uncased-distilled-squad", "no/such-model")
            .await
            .err()
            .expect("unknown id must fail");
        match err {
            ExamPrepError::ModelLoad { role, model_id, .. } => {
                assert_eq!(role, ModelRole::TextGeneration);
                assert_eq!(model_id, "no/such-model");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_load_is_not_memoized() {
        let mut loader = MockModelLoader::new();
        let mut calls = 0;
        loader.expect_load_qa().times(2).returning(move |id| {
            calls += 1;
            if calls == 1 {
                Err(ExamPrepError::ModelLoad {
                    role: ModelRole::QuestionAnswering,
                    model_id: id.to_string(),
                    reason: "hub unreachable".to_string(),
                })
            } else {
                Ok(Arc::new(StaticQa(id.to_string())) as Arc<dyn QuestionAnswerer>)
            }
        });
        loader.expect_load_generator().times(1).returning(|id| {
            Ok(Arc::new(StaticGenerator(id.to_string())) as Arc<dyn TextGenerator>)
        });
        let provider = provider(loader);

        assert!(provider.get_handles("deepset/roberta-base-squad2", "gpt2").await.is_err());
        assert!(provider.get_handles("deepset/roberta-base-squad2", "gpt2").await.is_ok());
    }

    #[tokio::test]
    async fn test_hub_loader_maps_probe_failure_to_model_load() {
        use crate::transport::HubTransport;
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/gpt2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tx = HubTransport::new(&server.uri(), None, Duration::from_secs(5)).expect("client");
        let loader = HubModelLoader::new(Arc::new(tx), true);
        match loader.load_generator("gpt2").await {
            Err(ExamPrepError::ModelLoad { role, .. }) => {
                assert_eq!(role, ModelRole::TextGeneration)
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("probe failure must fail the load"),
        }
    }
}
