//! Calculator tool set
//!
//! A small, complete tool set that exercises the whole engine: typed data
//! parameters, defaults, list parameters, a shared collaborator, templated
//! resources, and a prompt.
//!
//! Tools:
//! - `add`, `subtract`, `multiply`, `divide`: binary arithmetic
//! - `sum`: total of a list of numbers
//! - `power`: `base` raised to an integer `exponent` (default 2)
//!
//! Resources:
//! - `calculator://history`: every recorded calculation
//! - `calculator://operation/{id}`: one recorded calculation
//!
//! Prompts:
//! - `explain_calculation`: ask for a step-by-step explanation
//!
//! # Example
//!
//! ```rust,no_run
//! use toolgate_mcp::{calculator, McpServer, ServerConfig};
//!
//! let registry = calculator::registry().expect("calculator tools register");
//! let server = McpServer::new(ServerConfig::from_env(), registry);
//! println!("Available tools: {}", server.list_tools().len());
//! ```

pub mod history;

pub use history::{Operation, OperationLog};

use crate::handler::{from_fn, prompt_fn, Arguments, HandlerResult, Invocation};
use crate::introspect::Signature;
use crate::registry::{RegistrationError, Registry, RegistryBuilder};
use anyhow::{anyhow, bail};

/// Build a registry holding only the calculator set.
pub fn registry() -> Result<Registry, RegistrationError> {
    let mut builder = RegistryBuilder::new();
    register(&mut builder)?;
    Ok(builder.build())
}

/// Register the calculator tools, resources, and prompt.
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.collaborator::<OperationLog>();

    binary_tool(builder, "add", "Add two numbers", |a, b| Ok(a + b))?;
    binary_tool(builder, "subtract", "Subtract b from a", |a, b| Ok(a - b))?;
    binary_tool(builder, "multiply", "Multiply two numbers", |a, b| Ok(a * b))?;
    binary_tool(builder, "divide", "Divide a by b", |a, b| {
        if b == 0.0 {
            bail!("Division by zero");
        }
        Ok(a / b)
    })?;

    builder.tool(
        "sum",
        "Add up a list of numbers",
        Signature::new()
            .param::<Vec<f64>>("values")
            .describe("Numbers to add")
            .client::<OperationLog>("log")
            .returns::<f64>(),
        from_fn(|inv: &Invocation| {
            let values: Vec<f64> = inv.arg("values")?;
            let result = finite(values.iter().sum())?;
            inv.client::<OperationLog>()?.record("sum", values, result);
            Ok(result)
        }),
    )?;

    builder.tool(
        "power",
        "Raise base to an integer exponent",
        Signature::new()
            .param::<f64>("base")
            .describe("Base")
            .param_with_default("exponent", 2_i64)
            .describe("Integer exponent")
            .client::<OperationLog>("log")
            .returns::<f64>(),
        from_fn(|inv: &Invocation| {
            let base: f64 = inv.arg("base")?;
            let exponent: i64 = inv.arg("exponent")?;
            let exp = i32::try_from(exponent)
                .map_err(|_| anyhow!("Exponent {} is out of range", exponent))?;
            let result = finite(base.powi(exp))?;
            inv.client::<OperationLog>()?
                .record("power", vec![base, exponent as f64], result);
            Ok(result)
        }),
    )?;

    builder.resource_with_mime(
        "calculator://history",
        "Every calculation recorded in this process",
        "application/json",
        Signature::new().client::<OperationLog>("log"),
        from_fn(|inv: &Invocation| {
            let log = inv.client::<OperationLog>()?;
            Ok(serde_json::to_string_pretty(&log.all())?)
        }),
    )?;

    builder.resource_with_mime(
        "calculator://operation/{id}",
        "One recorded calculation",
        "application/json",
        Signature::new()
            .param::<u64>("id")
            .describe("Operation id")
            .client::<OperationLog>("log"),
        from_fn(|inv: &Invocation| {
            let id: u64 = inv.arg("id")?;
            let operation = inv
                .client::<OperationLog>()?
                .get(id)
                .ok_or_else(|| anyhow!("Operation {} not found", id))?;
            Ok(serde_json::to_string_pretty(&operation)?)
        }),
    )?;

    builder.prompt(
        "explain_calculation",
        "Ask for a step-by-step explanation of a calculation",
        Signature::new()
            .param::<String>("expression")
            .describe("Expression to explain, e.g. 2 + 3 * 4")
            .param_with_default("audience", "student".to_string())
            .describe("Who the explanation is for"),
        prompt_fn(|args: &Arguments| {
            let expression: String = args.get("expression")?;
            let audience: String = args.get("audience")?;
            Ok(format!(
                "Explain how to evaluate `{}` step by step for a {}. \
                 State the order of operations you apply and the final result.",
                expression, audience
            ))
        }),
    )?;

    Ok(())
}

fn binary_tool(
    builder: &mut RegistryBuilder,
    name: &'static str,
    description: &str,
    op: fn(f64, f64) -> HandlerResult<f64>,
) -> Result<(), RegistrationError> {
    builder.tool(
        name,
        description,
        Signature::new()
            .param::<f64>("a")
            .describe("First operand")
            .param::<f64>("b")
            .describe("Second operand")
            .client::<OperationLog>("log")
            .returns::<f64>(),
        from_fn(move |inv: &Invocation| {
            let a: f64 = inv.arg("a")?;
            let b: f64 = inv.arg("b")?;
            let result = finite(op(a, b)?)?;
            inv.client::<OperationLog>()?.record(name, vec![a, b], result);
            Ok(result)
        }),
    )?;
    Ok(())
}

/// Non-finite results have no JSON representation.
fn finite(result: f64) -> HandlerResult<f64> {
    if result.is_finite() {
        Ok(result)
    } else {
        bail!("Result is not a finite number")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calculator_catalogs() {
        let registry = registry().unwrap();

        let tools: Vec<_> = registry.list_tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(tools, vec!["add", "subtract", "multiply", "divide", "sum", "power"]);
        assert_eq!(registry.list_resources().len(), 2);
        assert_eq!(registry.list_prompts().len(), 1);
        assert_eq!(registry.collaborators().len(), 1);
    }

    #[test]
    fn test_schemas_hide_collaborators() {
        let registry = registry().unwrap();

        let add = registry.find_tool("add").unwrap();
        assert_eq!(add.input_schema()["required"], json!(["a", "b"]));
        assert!(add.input_schema()["properties"].get("log").is_none());

        let power = registry.find_tool("power").unwrap();
        assert_eq!(power.input_schema()["required"], json!(["base"]));
        assert_eq!(
            power.input_schema()["properties"]["exponent"]["default"],
            json!(2)
        );

        let sum = registry.find_tool("sum").unwrap();
        assert_eq!(
            sum.input_schema()["properties"]["values"]["items"]["type"],
            json!("number")
        );
    }

    #[test]
    fn test_finite() {
        assert_eq!(finite(1.5).unwrap(), 1.5);
        assert!(finite(f64::INFINITY).is_err());
        assert!(finite(f64::NAN).is_err());
    }
}
