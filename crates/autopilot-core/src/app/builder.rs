//! PipelineBuilder - パイプラインの構築とワイヤリング
//!
//! 設定は build() の時点で検証します（不正な設定では起動しない）。
//! ports はすべて差し替え可能で、指定しなければ本番用の実装を使います。

use std::sync::Arc;

use super::orchestrator::Orchestrator;
use super::service::PipelineService;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::outcome::OutcomeGenerator;
use crate::ports::{
    Clock, IdGenerator, RandomSource, Sleeper, SystemClock, ThreadRandom, TokioSleeper,
    UlidGenerator,
};
use crate::store::TaskStore;

/// # 使用例
/// ```ignore
/// let pipeline = PipelineBuilder::new(PipelineConfig::default())
///     .random(Arc::new(SeededRandom::new(7)))
///     .sleeper(Arc::new(InstantSleeper))
///     .build()?;
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            clock: None,
            random: None,
            sleeper: None,
            ids: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # Errors
    /// `BadRequest` if the configuration does not validate.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let random = self.random.unwrap_or_else(|| Arc::new(ThreadRandom));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));

        let store = Arc::new(TaskStore::new(ids, Arc::clone(&clock)));
        let generator = Arc::new(OutcomeGenerator::new(random, self.config.simulation));
        let service = Arc::new(PipelineService::new(Arc::clone(&store), generator, clock));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&service),
            sleeper,
            self.config.orchestrator,
        ));

        Ok(Pipeline {
            store,
            service,
            orchestrator,
        })
    }
}

/// The wired pipeline. All parts share one store.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<TaskStore>,
    pub service: Arc<PipelineService>,
    pub orchestrator: Arc<Orchestrator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskRow;
    use crate::ports::{InstantSleeper, SeededRandom, SequentialIdGenerator};

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.orchestrator.max_concurrent = 0;

        let result = PipelineBuilder::new(config).build();
        assert!(matches!(result, Err(PipelineError::BadRequest(_))));
    }

    #[tokio::test]
    async fn parts_share_one_store() {
        let pipeline = PipelineBuilder::new(PipelineConfig::default())
            .random(Arc::new(SeededRandom::new(3)))
            .sleeper(Arc::new(InstantSleeper))
            .ids(Arc::new(SequentialIdGenerator::new()))
            .build()
            .unwrap();

        let receipt = pipeline
            .store
            .ingest_rows("January", vec![TaskRow::new("ORG-1", "CMP-1", "LE-001")])
            .await
            .unwrap();

        let task = pipeline
            .orchestrator
            .service()
            .store()
            .get_task(&receipt.task_ids[0])
            .await
            .unwrap();
        assert_eq!(task.le_id, "LE-001");
    }

    #[tokio::test]
    async fn default_ids_are_ulid_based() {
        let pipeline = PipelineBuilder::new(PipelineConfig::default()).build().unwrap();
        let receipt = pipeline
            .store
            .ingest_rows("January", vec![TaskRow::new("ORG-1", "CMP-1", "LE-001")])
            .await
            .unwrap();

        assert!(receipt.batch_id.as_str().starts_with("batch-"));
        assert_eq!(receipt.task_ids[0].as_str().len(), "task-".len() + 26);
    }
}
