//! 纯数据层：路径寻址、类型转换、节点投影与文档变更
//!
//! 本层不持有任何跨操作的可变树，每次读写都从规范文本重新解析。

pub mod caster;
pub mod data_core;
pub mod mutation;
pub mod path;
pub mod projector;
pub mod shadow_tree;
