use serde_json::Value;

/// One unit of work, identified by its dispatch position.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    index: usize,
    value: Value,
}

impl Item {
    pub fn new(index: usize, value: Value) -> Self {
        Self { index, value }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}
