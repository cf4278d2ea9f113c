use serde::{Deserialize, Serialize};

/// A class a document classifier may assign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocClass {
    pub class_name: String,
}

impl DocClass {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Date,
    Number,
}

/// A field a document extractor pulls out of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionField {
    pub name: String,
    pub field_name: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
}

impl ExtractionField {
    pub fn new(name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            field_type: FieldType::String,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocProcTask {
    TextExtraction,
}

/// How extracted plain text is ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingOrder {
    /// Follow groups of text such as columns, left to right within each
    #[default]
    BlockStructure,
    /// Strict left-to-right, top-to-bottom lines
    SimpleLine,
}
