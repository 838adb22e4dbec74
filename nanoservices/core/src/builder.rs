use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::loader::{parse_duration, ConfigError};
use crate::config::types::FlowConfig;
use crate::destinations::sqlite::SqliteSink;
use crate::destinations::table::TableLoader;
use crate::destinations::traits::{Destination, TableRef};
use crate::events::trigger::Trigger;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::PipelineDef;
use crate::sources::http_client::HttpSourceBuilder;
use crate::sources::json_file::JsonFileSource;
use crate::sources::traits::Source;
use crate::transforms::school::SchoolTransform;
use crate::transforms::traits::Transform;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("pipeline name is required")]
    NoName,
    #[error("trigger is required")]
    NoTrigger,
    #[error("a source is required")]
    NoSource,
    #[error("a transform is required")]
    NoTransform,
    #[error("a destination is required")]
    NoDestination,
    #[error("interval trigger period must be non-zero")]
    ZeroInterval,
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build source: {0}")]
    Source(#[from] sekolah_utils::error::Error),
}

pub struct PipelineBuilder {
    name: String,
    trigger: Option<Trigger>,
    source: Option<Arc<dyn Source>>,
    transform: Option<Arc<dyn Transform>>,
    destination: Option<Arc<dyn Destination>>,
    retry: RetryPolicy,
    start_date: Option<NaiveDate>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger: None,
            source: None,
            transform: None,
            destination: None,
            retry: RetryPolicy::default(),
            start_date: None,
        }
    }

    /// Wire the school pipeline described by `config`: a file or HTTP source,
    /// the school transform, and a table loader over SQLite replacing
    /// `hijir.target_table`.
    pub fn from_config(config: &FlowConfig) -> Result<Self, BuildError> {
        let mut builder = Self::new(config.pipeline.clone())
            .trigger(config.trigger()?)
            .retry(config.retry_policy()?)
            .transform(SchoolTransform::new())
            .destination(TableLoader::new(
                Arc::new(SqliteSink::open(&config.destination.path)),
                TableRef::default(),
            ));

        builder = match (&config.source.path, &config.source.url) {
            (Some(path), None) => builder.source(JsonFileSource::new(path.clone())),
            (None, Some(url)) => {
                let mut http = HttpSourceBuilder::new(url.clone())
                    .token(config.source.token.clone())
                    .params(config.source.params.clone());
                if let Some(timeout) = &config.source.timeout {
                    http = http.timeout(parse_duration(timeout)?);
                }
                builder.source(http.build()?)
            }
            _ => return Err(BuildError::NoSource),
        };

        if let Some(start) = config.start_date {
            builder = builder.start_date(start);
        }
        Ok(builder)
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn destination(mut self, destination: impl Destination + 'static) -> Self {
        self.destination = Some(Arc::new(destination));
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn start_date(mut self, start: NaiveDate) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn build(self) -> Result<(Trigger, PipelineDef), BuildError> {
        if self.name.trim().is_empty() {
            return Err(BuildError::NoName);
        }
        let trigger = self.trigger.ok_or(BuildError::NoTrigger)?;
        if matches!(trigger, Trigger::Interval(period) if period.is_zero()) {
            return Err(BuildError::ZeroInterval);
        }
        let source = self.source.ok_or(BuildError::NoSource)?;
        let transform = self.transform.ok_or(BuildError::NoTransform)?;
        let destination = self.destination.ok_or(BuildError::NoDestination)?;

        tracing::debug!(
            pipeline = %self.name,
            trigger = trigger.kind(),
            source = source.name(),
            transform = transform.name(),
            destination = destination.name(),
            "pipeline built"
        );

        Ok((trigger, PipelineDef {
            name: self.name,
            source,
            transform,
            destination,
            retry: self.retry,
            start_date: self.start_date,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::destinations::traits::LoadReport;
    use sekolah_utils::{RawRecords, SekolahResult, TabularFrame};
    use std::time::Duration;

    struct FakeSource;

    #[async_trait::async_trait]
    impl Source for FakeSource {
        fn name(&self) -> &str { "fake" }
        async fn extract(&self) -> SekolahResult<RawRecords> {
            Ok(RawRecords::default())
        }
    }

    struct FakeDest;

    #[async_trait::async_trait]
    impl Destination for FakeDest {
        fn name(&self) -> &str { "fake" }
        async fn load(&self, frame: &TabularFrame) -> SekolahResult<LoadReport> {
            Ok(LoadReport { table: "t".into(), rows: frame.num_rows(), columns: 0 })
        }
    }

    #[test]
    fn builder_creates_pipeline_def() {
        let (trigger, def) = PipelineBuilder::new("test")
            .trigger(Trigger::Interval(Duration::from_secs(60)))
            .source(FakeSource)
            .transform(SchoolTransform::new())
            .destination(FakeDest)
            .retry(RetryPolicy::none())
            .build()
            .unwrap();

        assert_eq!(def.name, "test");
        assert!(matches!(trigger, Trigger::Interval(_)));
        assert_eq!(def.retry, RetryPolicy::none());
        assert_eq!(def.start_date, None);
    }

    #[test]
    fn builder_requires_source() {
        let result = PipelineBuilder::new("test")
            .trigger(Trigger::Manual)
            .transform(SchoolTransform::new())
            .destination(FakeDest)
            .build();

        assert!(matches!(result, Err(BuildError::NoSource)));
    }

    #[test]
    fn builder_requires_trigger() {
        let result = PipelineBuilder::new("test")
            .source(FakeSource)
            .transform(SchoolTransform::new())
            .destination(FakeDest)
            .build();

        assert!(matches!(result, Err(BuildError::NoTrigger)));
    }

    #[test]
    fn builder_requires_transform_and_name() {
        let result = PipelineBuilder::new("test")
            .trigger(Trigger::Manual)
            .source(FakeSource)
            .destination(FakeDest)
            .build();
        assert!(matches!(result, Err(BuildError::NoTransform)));

        let result = PipelineBuilder::new("  ").trigger(Trigger::Manual).build();
        assert!(matches!(result, Err(BuildError::NoName)));
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let result = PipelineBuilder::new("test")
            .trigger(Trigger::Interval(Duration::ZERO))
            .source(FakeSource)
            .transform(SchoolTransform::new())
            .destination(FakeDest)
            .build();

        assert!(matches!(result, Err(BuildError::ZeroInterval)));
    }

    #[test]
    fn from_config_wires_file_source() {
        let config = parse_config(
            r#"
pipeline: sekolah_etl
start_date: 2024-05-01
trigger: { type: interval, every: 10m }
retries: 3
retry_delay: 1m
source: { path: data.json }
destination: { path: warehouse.db }
"#,
        )
        .unwrap();

        let (trigger, def) = PipelineBuilder::from_config(&config).unwrap().build().unwrap();
        assert_eq!(trigger, Trigger::Interval(Duration::from_secs(600)));
        assert_eq!(def.name, "sekolah_etl");
        assert_eq!(def.source.name(), "json_file");
        assert_eq!(def.transform.name(), "public_high_schools");
        assert_eq!(def.destination.name(), "table_loader");
        assert_eq!(def.retry, RetryPolicy::new(3, Duration::from_secs(60)));
        assert_eq!(def.start_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn from_config_rejects_bad_url() {
        let config = parse_config(
            r#"
pipeline: sekolah_etl
source: { url: "not a url" }
destination: { path: warehouse.db }
"#,
        )
        .unwrap();

        let err = PipelineBuilder::from_config(&config).err().unwrap();
        assert!(matches!(err, BuildError::Source(_)));
    }
}
