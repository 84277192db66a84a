/// The seam between the prediction logic and whatever numeric inference engine
/// actually executes the exported models.
///
/// The engine is treated as an opaque capability: load an artifact from a path,
/// run it on a `[1, n]` float tensor, get back named outputs. The ONNX Runtime
/// implementation lives in the `onnx` module; tests use the stub backend below.

use std::path::Path;

use ndarray::{Array2, ArrayD};

/// The raw value of one named model output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue
{
    Float(ArrayD<f32>),
    Int(ArrayD<i64>),
    /// The engine produced something that is not a numeric tensor,
    /// e.g. the sequence-of-maps a ZipMap node emits for class probabilities.
    NonNumeric(String),
}

impl OutputValue
{
    /// All elements in logical (row-major) order, widened to f64.
    /// None if the output is not numeric.
    pub fn values(&self) -> Option<Vec<f64>>
    {
        match self
        {
            OutputValue::Float(array) => Some(array.iter().map(|x| *x as f64).collect()),
            OutputValue::Int(array) => Some(array.iter().map(|x| *x as f64).collect()),
            OutputValue::NonNumeric(_) => None,
        }
    }

    /// The first element of the output, if it is numeric and non-empty.
    pub fn first_scalar(&self) -> Option<f64>
    {
        match self
        {
            OutputValue::Float(array) => array.iter().next().map(|x| *x as f64),
            OutputValue::Int(array) => array.iter().next().map(|x| *x as f64),
            OutputValue::NonNumeric(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedOutput
{
    pub name: String,
    pub value: OutputValue,
}

/// A loaded, runnable model.
/// Implementations must report outputs in the order the model declares them.
pub trait ModelSession: Send + Sync + 'static
{
    fn input_names(&self) -> Vec<String>;

    fn output_names(&self) -> Vec<String>;

    /// Runs a single forward pass on `features`, fed as the input called `input_name`.
    fn run(&self, input_name: &str, features: Array2<f32>) -> anyhow::Result<Vec<NamedOutput>>;
}

/// Creates sessions from model artifacts.
pub trait InferenceBackend: Send + Sync + 'static
{
    type Session: ModelSession;

    fn load(&self, model_path: &Path) -> anyhow::Result<Self::Session>;
}


#[cfg(test)]
mod tests
{
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn first_scalar_reads_row_major()
    {
        let value = OutputValue::Float(ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![0.25, 0.75]).unwrap());
        assert_eq!(value.first_scalar(), Some(0.25));
        assert_eq!(value.values(), Some(vec![0.25, 0.75]));
    }

    #[test]
    fn int_labels_widen_to_float()
    {
        let value = OutputValue::Int(ArrayD::from_shape_vec(IxDyn(&[1]), vec![1]).unwrap());
        assert_eq!(value.first_scalar(), Some(1.0));
    }

    #[test]
    fn empty_and_non_numeric_have_no_scalar()
    {
        let empty = OutputValue::Float(ArrayD::from_shape_vec(IxDyn(&[0]), vec![]).unwrap());
        assert_eq!(empty.first_scalar(), None);
        let map = OutputValue::NonNumeric("seq(map(int64,tensor(float)))".to_string());
        assert_eq!(map.first_scalar(), None);
        assert_eq!(map.values(), None);
    }
}
