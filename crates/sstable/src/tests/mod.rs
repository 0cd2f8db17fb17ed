
use memtable::Value;

pub(crate) fn live(bytes: &[u8]) -> Value {
    Value::Live(bytes.to_vec())
}

/// `(k, "v<k>")` for every key in `keys`.
pub(crate) fn records<I: IntoIterator<Item = u64>>(keys: I) -> Vec<(u64, Value)> {
    keys.into_iter()
        .map(|k| (k, Value::Live(format!("v{}", k).into_bytes())))
        .collect()
}
