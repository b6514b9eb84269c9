//! tracing 订阅者初始化

use tracing_subscriber::fmt::SubscriberBuilder;

/// 安装全局 fmt 订阅者；已安装时返回 false
pub fn init_tracing(level: tracing::Level) -> bool {
    SubscriberBuilder::default()
        .with_max_level(level)
        .try_init()
        .is_ok()
}
