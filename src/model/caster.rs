//! 类型转换：把用户输入的文本按原始声明类型还原为 JSON 值

use serde_json::{Number, Value};
use thiserror::Error;

/// JSON 值类型（封闭枚举，新增类型必须在各处显式处理）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Number,
    Boolean,
    String,
    Object,
    Array,
}

impl ValueType {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::Array(_) => ValueType::Array,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ValueType::Object | ValueType::Array)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无法将 \"{input}\" 转换为 {expected}")]
pub struct CastError {
    pub expected: ValueType,
    pub input: String,
}

// 2^53：超出此范围的整数浮点不再折叠为整数
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// 按声明类型转换输入文本
pub fn cast(raw: &str, declared: ValueType) -> Result<Value, CastError> {
    let text = raw.trim();
    match declared {
        ValueType::Null => Ok(Value::Null),
        ValueType::Number => parse_number(text)
            .map(Value::Number)
            .ok_or_else(|| CastError {
                expected: declared,
                input: raw.to_string(),
            }),
        ValueType::Boolean => {
            if text.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(CastError {
                    expected: declared,
                    input: raw.to_string(),
                })
            }
        }
        ValueType::String => Ok(Value::String(text.to_string())),
        // 容器类型没有文本编辑形式，按字符串原样写入
        ValueType::Object | ValueType::Array => Ok(Value::String(text.to_string())),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Some(Number::from(u));
    }
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

/// 值的可编辑文本形式：字符串不加引号，其余为 JSON 文本
pub fn to_draft_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
