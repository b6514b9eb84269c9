//! 错误类型与外部协作者接口：文档存储、节点存储及其内存实现

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path as FsPath, PathBuf};

use thiserror::Error;

use crate::config::EditorConfig;
use crate::model::caster::CastError;
use crate::model::mutation::parse_document;
use crate::model::path::Path;
use crate::model::shadow_tree::{build_shadow_tree, Node, DEFAULT_PREVIEW_CHARS};
use crate::utils::fs::{read_document_text, write_document_text};

#[derive(Error, Debug)]
pub enum EditError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("文档无法解析: {0}")]
    InvalidDocument(#[source] serde_json::Error),
    #[error("文档序列化失败: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("路径不存在: 第{position}段 \"{segment}\"")]
    PathNotFound { segment: String, position: usize },
    #[error("目标不是对象: {path}")]
    NotAnObject { path: String },
    #[error("{}", cast_message(.key.as_deref(), .source))]
    Cast {
        key: Option<String>,
        #[source]
        source: CastError,
    },
    #[error("JSONPath错误: {0}")]
    JsonPath(String),
    #[error("配置无效: {0}")]
    Config(#[source] serde_json::Error),
    #[error("状态错误: {0}")]
    State(String),
}

fn cast_message(key: Option<&str>, source: &CastError) -> String {
    match key {
        Some(k) => format!("属性 \"{}\" {}", k, source),
        None => source.to_string(),
    }
}

/// 规范 JSON 文本的持有者
pub trait DocumentStore {
    fn document_text(&self) -> String;
    /// 写入新文本；下游重建由实现方负责触发
    fn set_document_text(&mut self, text: String);
}

/// 节点集合与当前选中节点的持有者
pub trait NodeStore {
    fn nodes(&self) -> &[Node];
    fn selected_node(&self) -> Option<&Node>;
    fn set_selected_node(&mut self, node: Option<Node>);

    fn find_by_path(&self, path: &Path) -> Option<&Node> {
        self.nodes().iter().find(|n| &n.path == path)
    }
}

type Subscriber = Box<dyn FnMut(&str)>;

/// 内存文档存储：每次写入递增修订号并通知订阅者
#[derive(Default)]
pub struct MemoryDocumentStore {
    text: String,
    revision: u64,
    source_path: Option<PathBuf>,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("len", &self.text.len())
            .field("revision", &self.revision)
            .field("source_path", &self.source_path)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl MemoryDocumentStore {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn source_path(&self) -> Option<&FsPath> {
        self.source_path.as_deref()
    }

    /// 注册变更回调，参数为写入后的完整文本
    pub fn subscribe(&mut self, subscriber: impl FnMut(&str) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// 加载JSON文件（校验可解析后才替换当前文本）
    pub fn load_file(&mut self, p: &FsPath) -> Result<(), EditError> {
        let text = read_document_text(p)?;
        self.source_path = Some(p.to_path_buf());
        self.set_document_text(text);
        tracing::info!("文件加载完成: {} (修订 {})", p.display(), self.revision);
        Ok(())
    }

    /// 将当前文本原子写入指定路径
    pub fn save_to_file(&self, p: &FsPath) -> Result<(), EditError> {
        write_document_text(p, &self.text)
    }

    /// 写回原始文件路径
    pub fn save_to_original_file(&self) -> Result<(), EditError> {
        let original = self
            .source_path
            .as_ref()
            .ok_or_else(|| EditError::State("原始文件路径未设置".into()))?;
        self.save_to_file(original)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn document_text(&self) -> String {
        self.text.clone()
    }

    fn set_document_text(&mut self, text: String) {
        self.text = text;
        self.revision += 1;
        for subscriber in &mut self.subscribers {
            subscriber(&self.text);
        }
    }
}

/// 文档文本指纹，用于把重建信号与某次写入对应起来
pub fn text_fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// 一次节点集合重建完成的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regenerated {
    pub node_count: usize,
    /// 重建所依据文档文本的 [`text_fingerprint`]
    pub source: u64,
}

/// 内存节点存储：从文档文本重建影子树，并持有当前选择
#[derive(Debug, Clone)]
pub struct MemoryNodeStore {
    nodes: Vec<Node>,
    selected: Option<Node>,
    preview_chars: usize,
    last_regenerated: Option<Regenerated>,
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::with_preview_chars(DEFAULT_PREVIEW_CHARS)
    }
}

impl MemoryNodeStore {
    pub fn with_preview_chars(preview_chars: usize) -> Self {
        Self {
            nodes: Vec::new(),
            selected: None,
            preview_chars,
            last_regenerated: None,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::with_preview_chars(config.preview_chars)
    }

    /// 最近一次成功重建的信号
    pub fn last_regenerated(&self) -> Option<Regenerated> {
        self.last_regenerated
    }

    /// 从文档文本全量重建节点集合。选择不会自动迁移，由重同步负责。
    pub fn regenerate(&mut self, document_text: &str) -> Result<Regenerated, EditError> {
        let dom = parse_document(document_text)?;
        self.nodes = build_shadow_tree(&dom, self.preview_chars);
        tracing::debug!("节点集合已重建: {} 个节点", self.nodes.len());
        let signal = Regenerated {
            node_count: self.nodes.len(),
            source: text_fingerprint(document_text),
        };
        self.last_regenerated = Some(signal);
        Ok(signal)
    }

    /// 按路径选中节点，返回是否命中
    pub fn select_path(&mut self, path: &Path) -> bool {
        let found = self.find_by_path(path).cloned();
        let hit = found.is_some();
        self.selected = found;
        hit
    }
}

impl NodeStore for MemoryNodeStore {
    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn selected_node(&self) -> Option<&Node> {
        self.selected.as_ref()
    }

    fn set_selected_node(&mut self, node: Option<Node>) {
        self.selected = node;
    }
}
