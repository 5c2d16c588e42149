pub mod error;
pub mod vocab;
pub mod window;
pub mod model;
pub mod train;
pub mod similarity;
pub mod table;
pub mod subspace;
pub mod debias;
pub mod measure;
pub mod weat;
pub mod config;
mod pipeline;

pub use config::files_handling;
pub use error::{EmbeddingError, Result};
pub use model::{ModelKind, SharedEmbedding};
pub use pipeline::Pipeline;
pub use similarity::Similarity;
pub use table::EmbeddingTable;
pub use vocab::Vocab;
