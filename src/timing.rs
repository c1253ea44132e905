//! Per-stage latency instrumentation for the request pipeline.

use std::time::{Duration, Instant};

/// The measured stages of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ModelLoad,
    Decode,
    Predict,
    Encode,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::ModelLoad => "model_load",
            Stage::Decode => "decode",
            Stage::Predict => "predict",
            Stage::Encode => "encode",
        }
    }
}

/// Per-request latency accumulator.
///
/// Created when a request enters the dispatcher, filled as stages run,
/// emitted as a single structured event when the response goes out.
#[derive(Debug)]
pub struct StageTimings {
    started: Instant,
    stages: Vec<(Stage, Duration)>,
}

impl StageTimings {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::with_capacity(4),
        }
    }

    /// Measure one async pipeline step.
    pub async fn time<T, F>(&mut self, stage: Stage, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let begin = Instant::now();
        let out = fut.await;
        self.record(stage, begin.elapsed());
        out
    }

    /// Record an externally measured duration (e.g. a model load that
    /// happened inside the cache).
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.push((stage, elapsed));
    }

    /// The recorded duration for a stage, if it ran.
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    /// Emit one debug event carrying every stage latency plus the total.
    pub fn log(&self) {
        let total_ms = self.started.elapsed().as_millis() as u64;
        let stage_ms = |s: Stage| self.get(s).map(|d| d.as_millis() as u64);
        tracing::debug!(
            total_ms,
            model_load_ms = stage_ms(Stage::ModelLoad),
            decode_ms = stage_ms(Stage::Decode),
            predict_ms = stage_ms(Stage::Predict),
            encode_ms = stage_ms(Stage::Encode),
            "Invocation complete"
        );
    }
}

impl std::fmt::Display for StageTimings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (stage, elapsed)) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}ms", stage.name(), elapsed.as_millis())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_measured_stages() {
        let mut timings = StageTimings::start();
        let out = timings.time(Stage::Predict, async { 42 }).await;
        assert_eq!(out, 42);
        assert!(timings.get(Stage::Predict).is_some());
        assert!(timings.get(Stage::Decode).is_none());
    }

    #[test]
    fn display_lists_stages_in_order() {
        let mut timings = StageTimings::start();
        timings.record(Stage::Decode, Duration::from_millis(2));
        timings.record(Stage::Predict, Duration::from_millis(30));
        let rendered = timings.to_string();
        assert!(rendered.starts_with("decode="));
        assert!(rendered.contains("predict=30ms"));
    }
}
