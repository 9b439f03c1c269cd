//! ML model backends

pub mod classifier;
pub mod loader;
pub mod onnx;
pub mod softmax;

pub use classifier::{Classifier, Trainable};
pub use loader::{ModelFormat, ModelLoader};
pub use onnx::OnnxClassifier;
pub use softmax::SoftmaxRegression;
