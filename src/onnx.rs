/// ONNX Runtime backend for the mission classifiers.
///
/// The models are scikit-learn / LightGBM classifiers exported with skl2onnx or onnxmltools.
/// They take one `float32` tensor of shape `[1, n_features]` and report a `label` (int64)
/// output followed by class probabilities. Depending on the exporter options the probabilities
/// are either a float tensor or a ZipMap sequence of maps; the latter is surfaced as
/// `OutputValue::NonNumeric` rather than an error, since the label output is still usable.

use std::path::Path;

use anyhow::Context;
use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::config::DEFAULT_INTRA_THREADS;
use crate::engine::{InferenceBackend, ModelSession, NamedOutput, OutputValue};

pub struct OrtBackend
{
    intra_threads: usize,
}

impl Default for OrtBackend
{
    fn default() -> Self
    {
        OrtBackend { intra_threads: DEFAULT_INTRA_THREADS }
    }
}

impl OrtBackend
{
    pub fn with_intra_threads(intra_threads: usize) -> Self
    {
        OrtBackend { intra_threads }
    }
}

pub struct OnnxSession
{
    session: Session,
    /// (name, type description) of each output, in the order the model declares them.
    outputs: Vec<(String, String)>,
}

impl InferenceBackend for OrtBackend
{
    type Session = OnnxSession;

    fn load(&self, model_path: &Path) -> anyhow::Result<OnnxSession>
    {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .commit_from_file(model_path)
            .with_context(|| format!("Unable to create an ONNX session from {:?}", model_path))?;

        let outputs = session.outputs.iter()
            .map(|o| (o.name.clone(), format!("{:?}", o.output_type)))
            .collect();

        Ok(OnnxSession { session, outputs })
    }
}

impl ModelSession for OnnxSession
{
    fn input_names(&self) -> Vec<String>
    {
        self.session.inputs.iter().map(|i| i.name.clone()).collect()
    }

    fn output_names(&self) -> Vec<String>
    {
        self.outputs.iter().map(|(name, _)| name.clone()).collect()
    }

    fn run(&self, input_name: &str, features: Array2<f32>) -> anyhow::Result<Vec<NamedOutput>>
    {
        let tensor = Tensor::from_array(features)?;
        let results = self.session.run(ort::inputs![input_name => tensor]?)?;

        // Walk the declared outputs rather than the result map so the model's order is kept.
        let mut outputs = Vec::with_capacity(self.outputs.len());
        for (name, type_description) in &self.outputs
        {
            let value = match results.get(name.as_str())
            {
                Some(value) => extract(value, type_description),
                None => continue,
            };
            outputs.push(NamedOutput { name: name.clone(), value });
        }
        Ok(outputs)
    }
}

fn extract(value: &DynValue, type_description: &str) -> OutputValue
{
    if let Ok(array) = value.try_extract_tensor::<f32>()
    {
        return OutputValue::Float(array.to_owned());
    }
    if let Ok(array) = value.try_extract_tensor::<i64>()
    {
        return OutputValue::Int(array.to_owned());
    }
    if let Ok(array) = value.try_extract_tensor::<f64>()
    {
        return OutputValue::Float(array.mapv(|x| x as f32));
    }
    OutputValue::NonNumeric(type_description.to_string())
}
