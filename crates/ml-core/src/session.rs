use std::path::Path;

use anyhow::{Context, Result, bail};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

/// Open an ONNX model for CPU inference.
pub(crate) fn load_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads.max(1))?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model {}", model_path.display()))?;
    Ok(session)
}

/// Run a single-input model and copy the requested outputs out as flat `f32` buffers.
pub(crate) fn run_f32<D: ndarray::Dimension + 'static>(
    session: &mut Session,
    input: ndarray::Array<f32, D>,
    output_indices: &[usize],
) -> Result<Vec<Vec<f32>>> {
    let input_tensor = Tensor::from_array(input)?;
    let outputs = session
        .run(ort::inputs![input_tensor])
        .context("Inference failed")?;

    let mut buffers = Vec::with_capacity(output_indices.len());
    for &index in output_indices {
        if index >= outputs.len() {
            bail!(
                "model produced {} outputs, output #{index} is missing",
                outputs.len()
            );
        }
        let view: ndarray::ArrayViewD<f32> = outputs[index]
            .try_extract_array()
            .with_context(|| format!("output #{index} is not an f32 tensor"))?;
        buffers.push(view.iter().copied().collect());
    }
    Ok(buffers)
}
