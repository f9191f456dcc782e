pub mod binder;
pub mod constant_extractor;
pub mod graph_importer;
pub mod graph_loader;

// Re-export key types from the parser module
pub use binder::{Binding, DeferredImportBinder};
pub use constant_extractor::{ConstantExtractor, ValueAttributeExtractor};
pub use graph_importer::{GraphImporter, ImportOutcome};
pub use graph_loader::GraphLoader;
