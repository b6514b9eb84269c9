//! VM桥接层常量：编辑界面的状态文本

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_EDITING: &str = "编辑中";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_CANCELLED: &str = "已取消编辑";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";
