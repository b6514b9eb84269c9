//! JSON节点编辑库
//!
//! 按路径寻址JSON文档中的节点，提供规范化展示、类型还原与原位编辑，
//! 以及保存后在重建的节点集合中找回被编辑节点的选择重同步。
//! 文档文本是唯一数据源，每次读写都重新解析。

pub mod config;
pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use config::EditorConfig;
pub use model::caster::{cast, CastError, ValueType};
pub use model::data_core::{
    text_fingerprint, DocumentStore, EditError, MemoryDocumentStore, MemoryNodeStore, NodeStore,
    Regenerated,
};
pub use model::mutation::{
    apply_object_edit, apply_primitive_edit, extract_subtree_pretty, read_node, MutationEngine,
};
pub use model::path::{path_to_display_string, resolve_parent, resolve_target, Path, Segment};
pub use model::projector::{normalize, project, Editability, Projection};
pub use model::shadow_tree::{build_shadow_tree, Node, Row};
pub use vm::session::{Draft, DraftState, EditSession};
