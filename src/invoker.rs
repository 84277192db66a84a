/// The shared prediction pathway used by every mission panel:
/// acquire (and cache) the mission's session, build the feature row, run the model,
/// and map the raw output onto a label.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info};
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

use crate::decision::{normalize, Label};
use crate::engine::{InferenceBackend, ModelSession};
use crate::error::{Error, Result};
use crate::mission::{Mission, MissionConfig};
use crate::preprocessing::{assemble_feature_vector, FormValues};

/// Runs predictions against lazily loaded, per-mission model sessions.
///
/// Each mission has one session slot. The first prediction for a mission loads its model;
/// concurrent first predictions wait on that same load rather than starting another.
/// A failed load leaves the slot empty, so the next prediction tries again from scratch.
/// Once loaded, a session is kept for the life of the invoker, even if a later run fails.
///
/// Loading and running models are blocking calls, so both happen on tokio's blocking pool.
/// A run that times out cannot be interrupted. Until it returns, further runs for that
/// mission are refused, so a model that hangs on every input holds at most one pool thread.
pub struct ModelInvoker<B: InferenceBackend>
{
    backend: Arc<B>,
    sessions: FxHashMap<Mission, OnceCell<Arc<B::Session>>>,
    /// Per mission, the completion flag of a run that timed out, if any.
    abandoned_runs: FxHashMap<Mission, Mutex<Option<Arc<AtomicBool>>>>,
    inference_timeout: Option<Duration>,
}

impl<B: InferenceBackend> ModelInvoker<B>
{
    pub fn new(backend: B) -> Self
    {
        let sessions = Mission::ALL.iter().map(|m| (*m, OnceCell::new())).collect();
        let abandoned_runs = Mission::ALL.iter().map(|m| (*m, Mutex::new(None))).collect();
        ModelInvoker
        {
            backend: Arc::new(backend),
            sessions,
            abandoned_runs,
            inference_timeout: None,
        }
    }

    /// Bounds how long a single model run may take before it is reported as an inference error.
    /// The run itself cannot be interrupted; the session stays cached either way.
    pub fn with_inference_timeout(mut self, timeout: Option<Duration>) -> Self
    {
        self.inference_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B
    {
        &self.backend
    }

    pub fn is_loaded(&self, mission: Mission) -> bool
    {
        self.sessions.get(&mission).map(|cell| cell.initialized()).unwrap_or(false)
    }

    /// True while a timed-out run for the mission has not yet returned.
    pub fn has_stuck_run(&self, mission: Mission) -> bool
    {
        self.abandoned_runs.get(&mission)
            .map(|slot| {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().map_or(false, |finished| finished.load(Ordering::SeqCst))
                {
                    *slot = None;
                }
                slot.is_some()
            })
            .unwrap_or(false)
    }

    fn abandon_run(&self, mission: Mission, finished: Arc<AtomicBool>)
    {
        if let Some(slot) = self.abandoned_runs.get(&mission)
        {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(finished);
        }
    }

    /// Returns the cached session for the mission, loading it first if necessary.
    pub async fn session(&self, config: &MissionConfig) -> Result<Arc<B::Session>>
    {
        let cell = self.sessions.get(&config.mission)
            .ok_or_else(|| Error::Config(format!("no session slot for {}", config.mission)))?;

        let session = cell.get_or_try_init(|| self.load(config)).await?;
        Ok(session.clone())
    }

    async fn load(&self, config: &MissionConfig) -> Result<Arc<B::Session>>
    {
        let backend = self.backend.clone();
        let path = config.model_path.clone();
        info!("Loading {} model from {:?}...", config.mission, path);
        let now = Instant::now();

        let loaded = tokio::task::spawn_blocking(move || backend.load(&path)).await;
        let session = match loaded
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(Error::ModelLoad { path: config.model_path.clone(), reason: format!("{:#}", e) }),
            Err(e) => return Err(Error::ModelLoad { path: config.model_path.clone(), reason: e.to_string() }),
        };

        info!("{} model loaded in {:?}", config.mission, now.elapsed());
        debug!("{} session inputs: {:?}", config.mission, session.input_names());
        debug!("{} session outputs: {:?}", config.mission, session.output_names());
        Ok(Arc::new(session))
    }

    /// Classifies one set of form values with the mission's model.
    ///
    /// Errors:
    /// - `ModelLoad` if the artifact cannot be loaded (nothing is cached).
    /// - `InvalidInput` naming the first missing or unparseable field; the model is not run.
    /// - `Inference` if the run fails or exceeds the timeout.
    /// - `OutputShape` if the selected output cannot be classified by the mission's rule.
    pub async fn predict(&self, config: &MissionConfig, values: &FormValues) -> Result<Label>
    {
        let session = self.session(config).await?;

        let features = assemble_feature_vector(&config.fields, values)?;

        if self.has_stuck_run(config.mission)
        {
            return Err(Error::Inference(format!("an earlier {} run timed out and has not finished yet", config.mission)));
        }

        let input_name = config.input_name.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let run_finished = finished.clone();
        let run = tokio::task::spawn_blocking(move || {
            let outputs = session.run(&input_name, features);
            run_finished.store(true, Ordering::SeqCst);
            outputs
        });
        let joined = match self.inference_timeout
        {
            Some(limit) => match tokio::time::timeout(limit, run).await
            {
                Ok(joined) => joined,
                Err(_) =>
                {
                    self.abandon_run(config.mission, finished);
                    return Err(Error::Inference(format!("{} model gave no result within {:?}", config.mission, limit)));
                },
            },
            None => run.await,
        };
        let outputs = joined
            .map_err(|e| Error::Inference(e.to_string()))?
            .map_err(|e| Error::Inference(format!("{:#}", e)))?;

        let label = normalize(&outputs, &config.output_names, &config.decision_rule)?;
        info!("{} prediction: {}", config.mission, label);
        Ok(label)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::mpsc;

    use crate::decision::LabelDecisionRule;
    use crate::engine::stub::{float_output, int_output, RunHold, StubBackend};

    use super::*;

    const KEPLER_MODEL: &str = "Kepler_KOI_rf_model.onnx";
    const TESS_MODEL: &str = "TESS_lightGBM_model.onnx";
    const K2_MODEL: &str = "random_forest_K2_model.onnx";

    fn kepler() -> MissionConfig
    {
        MissionConfig::builtin(Mission::Kepler)
    }

    fn kepler_values() -> FormValues
    {
        [
            ("koi_prad", "2.5"),
            ("koi_period", "10.3"),
            ("koi_score", "0.98"),
            ("koi_teq", "550"),
            ("koi_depth_log", "3.1"),
            ("koi_steff", "5700"),
            ("koi_duration", "4.2"),
        ].into_iter().collect()
    }

    fn k2_values() -> FormValues
    {
        MissionConfig::builtin(Mission::K2).feature_order()
            .map(|name| (name, "1.5"))
            .collect()
    }

    fn tess_values() -> FormValues
    {
        MissionConfig::builtin(Mission::Tess).feature_order()
            .map(|name| (name, "3"))
            .collect()
    }

    #[tokio::test]
    async fn high_score_is_a_candidate()
    {
        let invoker = ModelInvoker::new(StubBackend::new().with_score(KEPLER_MODEL, 0.91));
        let label = invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        assert_eq!(label, Label::Candidate);
    }

    #[tokio::test]
    async fn low_score_is_not_a_candidate()
    {
        let invoker = ModelInvoker::new(StubBackend::new().with_score(KEPLER_MODEL, 0.12));
        let label = invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        assert_eq!(label, Label::NotCandidate);
    }

    #[tokio::test]
    async fn features_reach_the_engine_in_order()
    {
        let backend = StubBackend::new().with_score(KEPLER_MODEL, 0.91);
        let seen = backend.seen_inputs.clone();
        let invoker = ModelInvoker::new(backend);
        invoker.predict(&kepler(), &kepler_values()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![2.5, 10.3, 0.98, 550.0, 3.1, 5700.0, 4.2]);
    }

    #[tokio::test]
    async fn session_is_loaded_once()
    {
        let backend = StubBackend::new().with_score(KEPLER_MODEL, 0.91);
        let counters = backend.counters.clone();
        let invoker = ModelInvoker::new(backend);
        assert!(!invoker.is_loaded(Mission::Kepler));

        for _ in 0..5
        {
            invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        }
        assert_eq!(counters.loads(), 1);
        assert_eq!(counters.runs(), 5);
        assert!(invoker.is_loaded(Mission::Kepler));
    }

    #[tokio::test]
    async fn concurrent_first_predictions_share_one_load()
    {
        let backend = StubBackend::new().with_score(KEPLER_MODEL, 0.91);
        let counters = backend.counters.clone();
        let invoker = ModelInvoker::new(backend);
        let config = kepler();
        let values = kepler_values();

        let (a, b) = tokio::join!(invoker.predict(&config, &values), invoker.predict(&config, &values));
        assert_eq!(a.unwrap(), Label::Candidate);
        assert_eq!(b.unwrap(), Label::Candidate);
        assert_eq!(counters.loads(), 1);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_labels()
    {
        let invoker = ModelInvoker::new(StubBackend::new().with_score(KEPLER_MODEL, 0.5));
        let first = invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        let second = invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_engine()
    {
        let backend = StubBackend::new().with_score(K2_MODEL, 0.91);
        let counters = backend.counters.clone();
        let invoker = ModelInvoker::new(backend);
        let values = k2_values().with_field("k2-campaigns", "abc");

        let result = invoker.predict(&MissionConfig::builtin(Mission::K2), &values).await;
        match result
        {
            Err(Error::InvalidInput { field, .. }) => assert_eq!(field, "k2-campaigns"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
        assert_eq!(counters.runs(), 0);
    }

    #[tokio::test]
    async fn failed_load_is_retried()
    {
        let backend = StubBackend::new()
            .with_score(KEPLER_MODEL, 0.91)
            .failing_load(KEPLER_MODEL);
        let counters = backend.counters.clone();
        let invoker = ModelInvoker::new(backend);

        let result = invoker.predict(&kepler(), &kepler_values()).await;
        assert!(matches!(result, Err(Error::ModelLoad { .. })));
        assert!(!invoker.is_loaded(Mission::Kepler));

        invoker.backend().heal(std::path::Path::new(KEPLER_MODEL));
        let label = invoker.predict(&kepler(), &kepler_values()).await.unwrap();
        assert_eq!(label, Label::Candidate);
        assert_eq!(counters.loads(), 2);
    }

    #[tokio::test]
    async fn failed_load_does_not_affect_other_missions()
    {
        let backend = StubBackend::new()
            .failing_load(KEPLER_MODEL)
            .with_score(TESS_MODEL, 0.8);
        let invoker = ModelInvoker::new(backend);

        let kepler_result = invoker.predict(&kepler(), &kepler_values()).await;
        assert!(matches!(kepler_result, Err(Error::ModelLoad { .. })));

        let tess = invoker.predict(&MissionConfig::builtin(Mission::Tess), &tess_values()).await.unwrap();
        assert_eq!(tess, Label::Candidate);
        assert!(invoker.is_loaded(Mission::Tess));
        assert!(!invoker.is_loaded(Mission::Kepler));
    }

    #[tokio::test]
    async fn failed_run_keeps_the_session()
    {
        let backend = StubBackend::new().with_score(KEPLER_MODEL, 0.91).failing_runs();
        let counters = backend.counters.clone();
        let invoker = ModelInvoker::new(backend);

        for _ in 0..2
        {
            let result = invoker.predict(&kepler(), &kepler_values()).await;
            assert!(matches!(result, Err(Error::Inference(_))));
        }
        assert!(invoker.is_loaded(Mission::Kepler));
        assert_eq!(counters.loads(), 1);
    }

    #[tokio::test]
    async fn declared_output_and_rule_are_honored()
    {
        let backend = StubBackend::new().with_outputs(KEPLER_MODEL, vec![
            int_output("label", &[0]),
            float_output("probabilities", &[0.2, 0.8]),
        ]);
        let invoker = ModelInvoker::new(backend);

        let mut by_label = kepler();
        by_label.decision_rule = LabelDecisionRule::Equals { value: 1.0 };
        assert_eq!(invoker.predict(&by_label, &kepler_values()).await.unwrap(), Label::NotCandidate);

        let mut by_probability = kepler();
        by_probability.output_names = vec!["probabilities".to_string()];
        by_probability.decision_rule = LabelDecisionRule::Argmax { candidate_class: 1 };
        assert_eq!(invoker.predict(&by_probability, &kepler_values()).await.unwrap(), Label::Candidate);
    }

    #[tokio::test]
    async fn model_without_outputs_is_a_shape_error()
    {
        let invoker = ModelInvoker::new(StubBackend::new().with_outputs(KEPLER_MODEL, vec![]));
        let result = invoker.predict(&kepler(), &kepler_values()).await;
        assert!(matches!(result, Err(Error::OutputShape(_))));
    }

    #[tokio::test]
    async fn hung_inference_times_out()
    {
        let backend = StubBackend::new().with_score(KEPLER_MODEL, 0.91);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *backend.hold.lock().unwrap() = Some(RunHold { started: started_tx, release: release_rx });
        let invoker = ModelInvoker::new(backend)
            .with_inference_timeout(Some(Duration::from_millis(50)));

        let result = invoker.predict(&kepler(), &kepler_values()).await;
        assert!(matches!(result, Err(Error::Inference(_))));
        assert!(started_rx.recv().is_ok());
        assert!(invoker.is_loaded(Mission::Kepler));
        assert!(invoker.has_stuck_run(Mission::Kepler));
        assert!(!invoker.has_stuck_run(Mission::Tess));

        // Nothing new is started on the engine while the first run is stuck.
        let result = invoker.predict(&kepler(), &kepler_values()).await;
        assert!(matches!(result, Err(Error::Inference(_))));
        assert_eq!(invoker.backend().counters.runs(), 1);

        // Invalid input is still reported as such.
        let result = invoker.predict(&kepler(), &kepler_values().with_field("koi_teq", "")).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        drop(release_tx);
        let mut label = None;
        for _ in 0..200
        {
            if let Ok(l) = invoker.predict(&kepler(), &kepler_values()).await
            {
                label = Some(l);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(label, Some(Label::Candidate));
        assert!(!invoker.has_stuck_run(Mission::Kepler));
        assert_eq!(invoker.backend().counters.runs(), 2);
        assert_eq!(invoker.backend().counters.loads(), 1);
    }
}
