//! function prediction : processing modes, model capabilities, routing and output table

pub mod mode;
pub mod output;
pub mod predictor;
pub mod registry;
pub mod router;

pub use mode::ProcessingMode;
pub use output::{NetworkType, PredictionRow, PredictionWriter};
pub use predictor::{Annotation, ExternalPredictor, FunctionPredictor, GraphQuery, SequenceQuery};
pub use registry::ModelRegistry;
pub use router::{PredictionRouter, Route, RoutingSummary, TemplateAlignment};
