// ==========================================
// 平面文件导入器 - 实体句柄与键元组
// ==========================================
// 职责: 核心只持有实体句柄，实体本身归持久化后端所有
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// EntityRef - 实体句柄
// ==========================================
// 用途: 后端分配的不透明句柄，可复制、可哈希
// 生命周期: 仅在一次导入运行内有效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(usize);

impl EntityRef {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ==========================================
// KeyTuple - 有序键元组
// ==========================================
// 用途: 主实体缓存键 / 从属实体匹配键
// 相等性: 按顺序逐对比较（属性名 + 原始值）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyTuple(Vec<(String, String)>);

/// 主键元组（同一次运行内，相等的元组指向同一个主实体）
pub type PrimaryKeyTuple = KeyTuple;

impl KeyTuple {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.0.push((attribute.into(), value.into()));
    }

    /// 所有值均为空白（含纯空格）时视为空键
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|(_, value)| value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == attribute)
            .map(|(_, v)| v.as_str())
    }

    pub fn values(&self) -> Vec<&str> {
        self.0.iter().map(|(_, v)| v.as_str()).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for KeyTuple
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}
