//! 节点投影：规范化展示文本与可编辑性分类

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::caster::to_draft_text;
use crate::model::shadow_tree::{Node, Row};

/// 节点的可编辑性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editability {
    /// 单行、无键、非容器
    PrimitiveLeaf,
    /// 多行且至少一行是带键的标量
    Object,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection<'a> {
    pub rows: &'a [Row],
    pub is_primitive_leaf: bool,
    pub is_object_editable: bool,
}

impl Projection<'_> {
    pub fn editability(&self) -> Editability {
        if self.is_primitive_leaf {
            Editability::PrimitiveLeaf
        } else if self.is_object_editable {
            Editability::Object
        } else {
            Editability::None
        }
    }
}

pub fn is_primitive_leaf(rows: &[Row]) -> bool {
    matches!(rows, [row] if row.key.is_none() && !row.kind.is_container())
}

pub fn is_object_editable(rows: &[Row]) -> bool {
    rows.len() > 1
        && rows
            .iter()
            .any(|row| row.key.is_some() && !row.kind.is_container())
}

pub fn project(node: &Node) -> Projection<'_> {
    Projection {
        rows: &node.rows,
        is_primitive_leaf: is_primitive_leaf(&node.rows),
        is_object_editable: is_object_editable(&node.rows),
    }
}

/// 展示文本：无行为 `{}`；单个无键行为裸值；否则为只含标量行的两空格缩进 JSON
pub fn normalize(rows: &[Row]) -> String {
    match rows {
        [] => "{}".to_string(),
        [row] if row.key.is_none() => row.value.as_ref().map(to_draft_text).unwrap_or_default(),
        _ => {
            let mut map = Map::new();
            for row in rows.iter().filter(|r| !r.kind.is_container()) {
                if let (Some(key), Some(value)) = (&row.key, &row.value) {
                    map.insert(key.clone(), value.clone());
                }
            }
            to_pretty(&Value::Object(map), 2)
        }
    }
}

/// 以指定缩进宽度序列化
pub(crate) fn to_pretty(value: &Value, indent: usize) -> String {
    let indent_bytes = vec![b' '; indent];
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent_bytes);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}
