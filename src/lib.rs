// 演示文稿 AI 后端库
//
// 本库提供生成类后端与应用之间的中间层，包括：
// - API 路由
// - 数据库操作
// - 外部后端集成（图片生成、搜索、翻译、文本生成）
// - 内容缓存与图片生成任务队列
// - 图片处理

pub mod api;
pub mod config;
pub mod database;
pub mod external;
pub mod models;
pub mod services;
