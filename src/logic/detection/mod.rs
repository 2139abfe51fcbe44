//! Detection - classifiers and verdict aggregation

pub mod gateway;
pub mod types;

pub use gateway::{Classifier, ClassifierError, ClassifierProfile, CommandClassifier, DetectionGateway, RawDetection};
pub use types::{Finding, Verdict};
