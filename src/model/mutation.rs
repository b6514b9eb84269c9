//! 变更引擎：解析 → 按路径写入 → 整体重新序列化
//!
//! 每次调用都解析一份私有副本，失败时不会产生任何部分写入。

use std::collections::{BTreeMap, HashMap};

use jsonpath_rust::JsonPath;
use serde_json::Value;

use crate::model::caster::{cast, ValueType};
use crate::model::data_core::EditError;
use crate::model::path::{resolve_parent, resolve_target, resolve_target_mut, Path, Segment};
use crate::model::projector::to_pretty;

pub const DEFAULT_INDENT: usize = 2;

pub fn parse_document(text: &str) -> Result<Value, EditError> {
    serde_json::from_str(text).map_err(EditError::InvalidDocument)
}

/// 读取路径处的值（pretty 字符串）
pub fn read_node(document_text: &str, path: &Path) -> Result<String, EditError> {
    let dom = parse_document(document_text)?;
    let target = resolve_target(&dom, path)?;
    serde_json::to_string_pretty(target).map_err(EditError::Serialize)
}

/// 按 JSONPath 提取第一个匹配节点的 pretty 字符串
pub fn extract_subtree_pretty(document_text: &str, json_path: &str) -> Result<String, EditError> {
    let dom = parse_document(document_text)?;
    let hits: Vec<&Value> = dom
        .query(json_path)
        .map_err(|e| EditError::JsonPath(e.to_string()))?;
    let first = hits
        .into_iter()
        .next()
        .ok_or_else(|| EditError::JsonPath("未匹配到任何节点".into()))?;
    serde_json::to_string_pretty(first).map_err(EditError::Serialize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEngine {
    indent: usize,
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::with_indent(DEFAULT_INDENT)
    }
}

impl MutationEngine {
    pub fn with_indent(indent: usize) -> Self {
        Self { indent }
    }

    fn serialize(&self, dom: &Value) -> Result<String, EditError> {
        if self.indent == DEFAULT_INDENT {
            serde_json::to_string_pretty(dom).map_err(EditError::Serialize)
        } else {
            Ok(to_pretty(dom, self.indent))
        }
    }

    /// 用已转换好的值覆盖路径处的槽位；根路径替换整个文档
    pub fn apply_primitive_edit(
        &self,
        document_text: &str,
        path: &Path,
        new_value: Value,
    ) -> Result<String, EditError> {
        let mut dom = parse_document(document_text)?;
        if path.is_root() {
            tracing::debug!("整体替换文档，新类型: {}", ValueType::of(&new_value));
            return self.serialize(&new_value);
        }

        let last_position = path.len() - 1;
        let (parent, last) = resolve_parent(&mut dom, path)?;
        let missing = || EditError::PathNotFound {
            segment: last.to_string(),
            position: last_position,
        };
        match parent {
            Value::Object(map) => {
                map.insert(last.to_string(), new_value);
            }
            Value::Array(arr) => {
                let idx = match last {
                    Segment::Index(i) => Some(*i),
                    Segment::Key(k) => k.parse::<usize>().ok(),
                };
                let slot = idx.and_then(|i| arr.get_mut(i)).ok_or_else(missing)?;
                *slot = new_value;
            }
            _ => return Err(missing()),
        }
        tracing::debug!("已写入 {}", path);
        self.serialize(&dom)
    }

    /// 按原始行类型逐个转换并覆盖属性；未出现在 `edits` 中的属性保持不变，
    /// 在 `row_types` 中找不到或类型为容器的键被忽略。
    pub fn apply_object_edit(
        &self,
        document_text: &str,
        path: &Path,
        edits: &BTreeMap<String, String>,
        row_types: &HashMap<String, ValueType>,
    ) -> Result<String, EditError> {
        let mut dom = parse_document(document_text)?;
        let target = resolve_target_mut(&mut dom, path)?;

        let mut casted = Vec::with_capacity(edits.len());
        for (key, text) in edits {
            let Some(kind) = row_types.get(key).copied() else {
                tracing::debug!("忽略未知属性: {}", key);
                continue;
            };
            if kind.is_container() {
                continue;
            }
            let value = cast(text, kind).map_err(|source| EditError::Cast {
                key: Some(key.clone()),
                source,
            })?;
            casted.push((key, value));
        }

        match target {
            Value::Object(map) => {
                for (key, value) in casted {
                    map.insert(key.clone(), value);
                }
            }
            Value::Array(arr) => {
                for (key, value) in casted {
                    if let Some(slot) = key.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
                        *slot = value;
                    }
                }
            }
            _ => {
                return Err(EditError::NotAnObject {
                    path: path.to_display_string(),
                })
            }
        }
        tracing::debug!("已更新 {} 的属性", path);
        self.serialize(&dom)
    }
}

/// 使用默认缩进的 [`MutationEngine::apply_primitive_edit`]
pub fn apply_primitive_edit(
    document_text: &str,
    path: &Path,
    new_value: Value,
) -> Result<String, EditError> {
    MutationEngine::default().apply_primitive_edit(document_text, path, new_value)
}

/// 使用默认缩进的 [`MutationEngine::apply_object_edit`]
pub fn apply_object_edit(
    document_text: &str,
    path: &Path,
    edits: &BTreeMap<String, String>,
    row_types: &HashMap<String, ValueType>,
) -> Result<String, EditError> {
    MutationEngine::default().apply_object_edit(document_text, path, edits, row_types)
}
