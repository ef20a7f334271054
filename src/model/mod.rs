pub mod error;
pub mod topology;
pub mod model_metadata;
pub mod model_storage;
pub mod config;

pub use error::FixError;
pub use topology::{classify_inbound_nodes, normalize, normalize_in_place, InboundShape, NodeArgs, NormalizeReport};
pub use model_metadata::{ModelSummary, print_summary_info};
pub use model_storage::{read_document, write_document, copy_weight_files, fix_model_file, FixOptions, FixOutcome};
pub use config::{AppConfig, ModelSettings, ClassifierSettings, DEFAULT_CLASS_NAMES, DEFAULT_MEAN_PIXEL_BGR};
