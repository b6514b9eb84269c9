//! 影子树（Shadow Tree）：把文档展开为可寻址节点，每个节点由若干行描述

use serde_json::Value;

use crate::model::caster::ValueType;
use crate::model::path::Path;

pub const DEFAULT_PREVIEW_CHARS: usize = 32;

/// 节点的一行：一个标量事实或一个容器摘要
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 属性名 / 数组下标；根或数组元素上的标量为 None
    pub key: Option<String>,
    pub kind: ValueType,
    /// 仅标量有值
    pub value: Option<Value>,
    /// 仅容器有子元素数量
    pub children: Option<usize>,
}

impl Row {
    pub fn of(key: Option<String>, v: &Value) -> Self {
        let kind = ValueType::of(v);
        let children = match v {
            Value::Object(m) => Some(m.len()),
            Value::Array(a) => Some(a.len()),
            _ => None,
        };
        Self {
            key,
            kind,
            value: if kind.is_container() { None } else { Some(v.clone()) },
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub path: Path,
    pub rows: Vec<Row>,
    /// 轻量预览（字符串截断、容器摘要）
    pub preview: String,
    /// 节点深度（即路径长度）
    pub depth: usize,
}

impl Node {
    pub fn new(path: Path, rows: Vec<Row>) -> Self {
        let depth = path.len();
        Self {
            path,
            rows,
            preview: String::new(),
            depth,
        }
    }

    /// 按节点自身的值填充预览：字符串最多保留 `max_chars` 个字符，容器只给出类型与行数
    fn with_preview(mut self, v: &Value, max_chars: usize) -> Self {
        self.preview = match v {
            Value::String(s) => {
                let s = s.trim();
                match s.char_indices().nth(max_chars) {
                    Some((cut, _)) => format!("\"{}...\"", &s[..cut]),
                    None => format!("\"{}\"", s),
                }
            }
            Value::Object(_) | Value::Array(_) => {
                format!("{} ({})", ValueType::of(v), self.rows.len())
            }
            scalar => scalar.to_string(),
        };
        self
    }
}

/// 从根 Value 构建节点集合（先序）。
///
/// 对象节点的行对应其全部属性，标量属性不再单独成节点；数组节点的行以下标为键，
/// 每个元素再各自成节点，因此数组中的标量是单行、无键的原始叶子。
pub fn build_shadow_tree(root: &Value, preview_chars: usize) -> Vec<Node> {
    let mut out = Vec::with_capacity(64);

    fn push_node(out: &mut Vec<Node>, path: Path, rows: Vec<Row>, v: &Value, preview_chars: usize) {
        out.push(Node::new(path, rows).with_preview(v, preview_chars));
    }

    fn walk(out: &mut Vec<Node>, v: &Value, path: Path, preview_chars: usize) {
        match v {
            Value::Object(map) => {
                let rows = map
                    .iter()
                    .map(|(k, child)| Row::of(Some(k.clone()), child))
                    .collect();
                push_node(out, path.clone(), rows, v, preview_chars);
                for (k, child) in map {
                    if ValueType::of(child).is_container() {
                        walk(out, child, path.child(k.as_str()), preview_chars);
                    }
                }
            }
            Value::Array(arr) => {
                let rows = arr
                    .iter()
                    .enumerate()
                    .map(|(idx, child)| Row::of(Some(idx.to_string()), child))
                    .collect();
                push_node(out, path.clone(), rows, v, preview_chars);
                for (idx, child) in arr.iter().enumerate() {
                    walk(out, child, path.child(idx), preview_chars);
                }
            }
            _ => push_node(out, path, vec![Row::of(None, v)], v, preview_chars),
        }
    }

    walk(&mut out, root, Path::root(), preview_chars);
    out
}
