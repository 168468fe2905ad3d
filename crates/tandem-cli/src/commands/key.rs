use anyhow::{Context, Result};
use serde_json::Value;
use tandem_core::{CallArgs, EntityScope, InvalidationPolicy, OperationName};

use crate::cli::KeyArgs;
use crate::config::AppConfig;
use crate::output::print_field;

/// Parses a command-line argument as JSON, falling back to a plain string.
pub fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn call_args(raw: &[String]) -> CallArgs {
    raw.iter()
        .map(|arg| parse_arg(arg))
        .fold(CallArgs::new(), |args, value| args.arg(&value))
}

pub fn run(config: &AppConfig, args: &KeyArgs) -> Result<()> {
    let scope = EntityScope::parse(&args.scope).context("invalid --scope")?;
    let operation = OperationName::new(args.operation.as_str()).context("invalid --operation")?;
    let call = call_args(&args.args);

    let key = config.cache.codec().build_key(&scope, &operation, &call);
    println!("{}", key.as_str());

    if args.invalidation {
        let policy = config.cache.policy()?;
        let id = InvalidationPolicy::identifier_of(&call);
        for pattern in policy.patterns_for(&scope, id.as_deref()) {
            print_field("invalidates", pattern);
        }
    }
    Ok(())
}
