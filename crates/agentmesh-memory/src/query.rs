use crate::entry::MemoryEntry;

#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    /// Only match entries whose value (serialized) contains this substring
    /// — a simple filter, not a semantic search (vector-service lookups go
    /// through the opaque connector instead).
    pub value_contains: Option<String>,
}

impl MemoryQuery {
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(prefix) = &self.prefix {
            if !entry.key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.value_contains {
            let haystack = entry.value.to_string();
            if !haystack.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}
