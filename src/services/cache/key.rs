// 缓存键生成
//
// key = 命名空间 + ":" + sha256(规范化 JSON)
// 规范化时递归地按字段名排序，保证字段顺序不同但语义相同的输入得到同一个键

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::error::CacheError;

pub struct KeyDeriver;

impl KeyDeriver {
    /// 生成带命名空间的缓存键
    ///
    /// # 参数
    /// - `namespace`: 命名空间，如 `ai`、`image`、`translation`
    /// - `inputs`: 任意可序列化的输入
    ///
    /// # 返回
    /// - `Ok(String)`: `namespace:<64 位十六进制>`
    /// - `Err(CacheError::Json)`: 输入无法序列化（例如 Map 的键不是字符串）
    pub fn derive<T: Serialize + ?Sized>(namespace: &str, inputs: &T) -> Result<String, CacheError> {
        Ok(format!("{}:{}", namespace, Self::fingerprint(inputs)?))
    }

    /// 输入的确定性指纹
    pub fn fingerprint<T: Serialize + ?Sized>(inputs: &T) -> Result<String, CacheError> {
        let value = serde_json::to_value(inputs)?;
        let canonical = serde_json::to_string(&canonicalize(value))?;
        Ok(Self::hash_text(&canonical))
    }

    /// 文本的 sha256 十六进制摘要
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// 不依赖 serde_json 的 Map 实现是否有序，显式排序后重新插入
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_key_format() {
        let key = KeyDeriver::derive("ai", &json!({"prompt": "hello"})).unwrap();
        let (namespace, digest) = key.split_once(':').unwrap();
        assert_eq!(namespace, "ai");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a = KeyDeriver::derive("ai", &json!({"prompt": "p", "model": "m", "opts": {"x": 1, "y": 2}}))
            .unwrap();
        let b = KeyDeriver::derive("ai", &json!({"opts": {"y": 2, "x": 1}, "model": "m", "prompt": "p"}))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_namespace_separates_keys() {
        let inputs = json!({"text": "hello"});
        assert_ne!(
            KeyDeriver::derive("ai", &inputs).unwrap(),
            KeyDeriver::derive("image", &inputs).unwrap()
        );
    }

    #[test]
    fn test_hash_text_known_value() {
        assert_eq!(
            KeyDeriver::hash_text("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    proptest! {
        #[test]
        fn prop_key_independent_of_insertion_order(
            fields in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..8)
        ) {
            let forward: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let reversed: Map<String, Value> = fields
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();

            prop_assert_eq!(
                KeyDeriver::derive("image", &Value::Object(forward)).unwrap(),
                KeyDeriver::derive("image", &Value::Object(reversed)).unwrap()
            );
        }

        #[test]
        fn prop_different_text_different_key(a in ".{0,32}", b in ".{0,32}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                KeyDeriver::derive("ai", &json!({"prompt": a})).unwrap(),
                KeyDeriver::derive("ai", &json!({"prompt": b})).unwrap()
            );
        }
    }
}
