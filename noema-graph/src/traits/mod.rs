pub mod knowledge_graph;

pub use knowledge_graph::GraphLayer;
