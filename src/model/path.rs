//! Path：对象键 / 数组下标组成的寻址序列，以及基于它的导航器

use std::fmt;

use serde_json::Value;

use crate::model::data_core::EditError;

/// 路径中的单个段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// 从根出发的寻址路径；空路径即根
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 追加一段，返回新路径（原路径不变）
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// 拆分为 (父路径, 末段)；根路径返回 None
    pub fn split_last(&self) -> Option<(&[Segment], &Segment)> {
        self.0.split_last().map(|(last, parent)| (parent, last))
    }

    /// 渲染为展示用 JSONPath：`$`、`[N]`、`["key"]`
    pub fn to_display_string(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.0 {
            match segment {
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
                Segment::Key(k) => {
                    out.push('[');
                    out.push_str(&quote_key(k));
                    out.push(']');
                }
            }
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl<S: Into<Segment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// `None` 与空路径都渲染为 `$`
pub fn path_to_display_string(path: Option<&Path>) -> String {
    path.map(Path::to_display_string)
        .unwrap_or_else(|| "$".to_string())
}

fn quote_key(key: &str) -> String {
    // JSON 字符串转义同时是合法的 RFC 9535 双引号名
    serde_json::to_string(key).unwrap_or_else(|_| format!("\"{}\"", key))
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Key(k)) => map.get(k),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(arr), Segment::Index(i)) => arr.get(*i),
        (Value::Array(arr), Segment::Key(k)) => k.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(current: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Key(k)) => map.get_mut(k),
        (Value::Object(map), Segment::Index(i)) => map.get_mut(&i.to_string()),
        (Value::Array(arr), Segment::Index(i)) => arr.get_mut(*i),
        (Value::Array(arr), Segment::Key(k)) => {
            k.parse::<usize>().ok().and_then(move |i| arr.get_mut(i))
        }
        _ => None,
    }
}

fn not_found(segment: &Segment, position: usize) -> EditError {
    EditError::PathNotFound {
        segment: segment.to_string(),
        position,
    }
}

/// 按路径定位目标值；任何一段缺失都报告该段及其位置
pub fn resolve_target<'a>(document: &'a Value, path: &Path) -> Result<&'a Value, EditError> {
    let mut current = document;
    for (position, segment) in path.segments().iter().enumerate() {
        current = step(current, segment).ok_or_else(|| not_found(segment, position))?;
    }
    Ok(current)
}

/// 可变版本的 [`resolve_target`]
pub fn resolve_target_mut<'a>(
    document: &'a mut Value,
    path: &Path,
) -> Result<&'a mut Value, EditError> {
    let mut current = document;
    for (position, segment) in path.segments().iter().enumerate() {
        current = step_mut(current, segment).ok_or_else(|| not_found(segment, position))?;
    }
    Ok(current)
}

/// 定位末段的父容器，返回 (父容器, 末段)。末段在父容器中的值不读取。
///
/// 根路径没有父容器，调用方需先单独处理“整体替换文档”。
pub fn resolve_parent<'a, 'p>(
    document: &'a mut Value,
    path: &'p Path,
) -> Result<(&'a mut Value, &'p Segment), EditError> {
    let (parents, last) = path
        .split_last()
        .ok_or_else(|| EditError::State("根路径没有父容器".into()))?;
    let mut current = document;
    for (position, segment) in parents.iter().enumerate() {
        current = step_mut(current, segment).ok_or_else(|| not_found(segment, position))?;
    }
    Ok((current, last))
}
