//! 编辑器配置

use serde::Deserialize;

use crate::model::data_core::EditError;
use crate::model::mutation::DEFAULT_INDENT;
use crate::model::shadow_tree::DEFAULT_PREVIEW_CHARS;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// 回写文档时的缩进宽度
    pub indent: usize,
    /// 节点预览中字符串的最大字符数
    pub preview_chars: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl EditorConfig {
    /// 从JSON文本读取配置，缺省字段取默认值
    pub fn from_json_str(text: &str) -> Result<Self, EditError> {
        serde_json::from_str(text).map_err(EditError::Config)
    }
}
