use async_trait::async_trait;
use serde_json::{json, Value};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::ToolHandler;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn description(&self) -> &'static str {
        match self {
            Operation::Add => "Add two numbers together. Use this for addition operations.",
            Operation::Subtract => {
                "Subtract the second number from the first number. Use this for subtraction operations."
            }
            Operation::Multiply => {
                "Multiply two numbers together. Use this for multiplication operations."
            }
            Operation::Divide => {
                "Divide the first number by the second number. Use this for division operations."
            }
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> AgentResult<f64> {
        match self {
            Operation::Add => Ok(a + b),
            Operation::Subtract => Ok(a - b),
            Operation::Multiply => Ok(a * b),
            Operation::Divide if b == 0.0 => {
                Err(AgentError::ExecutionError("division by zero".to_string()))
            }
            Operation::Divide => Ok(a / b),
        }
    }
}

/// One binary arithmetic operation over `{a, b}`
pub struct ArithmeticTool {
    operation: Operation,
    tool: Tool,
}

impl ArithmeticTool {
    pub fn new(operation: Operation) -> Self {
        let tool = Tool::new(
            operation.to_string(),
            operation.description(),
            json!({
                "type": "object",
                "required": ["a", "b"],
                "properties": {
                    "a": {"type": "number", "description": "The first operand."},
                    "b": {"type": "number", "description": "The second operand."}
                }
            }),
        );
        Self { operation, tool }
    }
}

/// All four arithmetic tools in their conventional order
pub fn all() -> Vec<ArithmeticTool> {
    Operation::iter().map(ArithmeticTool::new).collect()
}

fn operand(arguments: &Value, key: &str) -> AgentResult<f64> {
    arguments.get(key).and_then(Value::as_f64).ok_or_else(|| {
        AgentError::InvalidParameters(format!("The parameter '{}' must be a number", key))
    })
}

#[async_trait]
impl ToolHandler for ArithmeticTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn invoke(&self, arguments: Value) -> AgentResult<String> {
        let a = operand(&arguments, "a")?;
        let b = operand(&arguments, "b")?;
        // f64 Display drops the fraction of integral values: 5.0 prints as "5"
        Ok(self.operation.apply(a, b)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_operations() -> anyhow::Result<()> {
        let args = json!({"a": 2, "b": 3});
        assert_eq!(ArithmeticTool::new(Operation::Add).invoke(args.clone()).await?, "5");
        assert_eq!(ArithmeticTool::new(Operation::Subtract).invoke(args.clone()).await?, "-1");
        assert_eq!(ArithmeticTool::new(Operation::Multiply).invoke(args.clone()).await?, "6");
        assert_eq!(ArithmeticTool::new(Operation::Divide).invoke(args).await?, "0.6666666666666666");
        Ok(())
    }

    #[tokio::test]
    async fn test_fractional_operands() -> anyhow::Result<()> {
        let result = ArithmeticTool::new(Operation::Add)
            .invoke(json!({"a": 1.5, "b": 2.25}))
            .await?;
        assert_eq!(result, "3.75");
        Ok(())
    }

    #[tokio::test]
    async fn test_divide_by_zero() {
        let result = ArithmeticTool::new(Operation::Divide)
            .invoke(json!({"a": 4, "b": 0}))
            .await;
        assert_eq!(
            result,
            Err(AgentError::ExecutionError("division by zero".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_operand() {
        let result = ArithmeticTool::new(Operation::Add)
            .invoke(json!({"a": 4, "b": "four"}))
            .await;
        assert!(matches!(result, Err(AgentError::InvalidParameters(_))));
    }

    #[test]
    fn test_all_tools() {
        let names: Vec<String> = all().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["add", "subtract", "multiply", "divide"]);
        assert_eq!(Operation::from_str("divide").ok(), Some(Operation::Divide));
    }
}
