//! Entries built into the `veer` binary.
//!
//! They exist to exercise the machinery end to end: `veer call loopback`
//! really spawns `veer` again as the child.

use serde_json::{Map, Value};
use veer_session::{ArgumentError, CallArgs, Registry};

/// Prefix of every demo entry name.
pub const PREFIX: &str = module_path!();

/// Error raised by [`fail`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ValueError(pub String);

/// Return the arguments unchanged as `[positional, keyword]`.
pub fn loopback(args: CallArgs) -> Result<(Vec<Value>, Map<String, Value>), ArgumentError> {
    Ok((args.positional, args.keyword))
}

/// Process id of whoever runs the entry.
pub fn pid(_args: CallArgs) -> Result<u32, ArgumentError> {
    Ok(std::process::id())
}

/// Always fails with `ValueError: bad input`.
pub fn fail(_args: CallArgs) -> Result<(), ValueError> {
    Err(ValueError("bad input".to_string()))
}

/// Sum of the positional arguments.
pub fn sum(args: CallArgs) -> Result<f64, ArgumentError> {
    Ok(args.all::<f64>()?.into_iter().sum())
}

/// Panics with the message in keyword `message`.
pub fn boom(args: CallArgs) -> Result<(), ArgumentError> {
    let message: Option<String> = args.get_kw_opt("message")?;
    panic!("{}", message.unwrap_or_else(|| "boom".to_string()));
}

/// Registry holding every demo entry under `veer::demo::<name>`.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(format!("{PREFIX}::loopback"), loopback)
        .register(format!("{PREFIX}::pid"), pid)
        .register(format!("{PREFIX}::fail"), fail)
        .register(format!("{PREFIX}::sum"), sum)
        .register(format!("{PREFIX}::boom"), boom);
    registry
}

/// Find an entry by full name, or by its last path segment when that is
/// unambiguous.
pub fn resolve<'a>(registry: &'a Registry, name: &str) -> Option<&'a str> {
    if let Some(entry) = registry.get(name) {
        return Some(entry.name());
    }

    let suffix = format!("::{name}");
    let mut matches = registry.names().filter(|full| full.ends_with(&suffix));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use veer_session::Reply;

    use super::*;

    #[test]
    fn names_carry_module_path() {
        let registry = registry();
        assert!(registry.get("veer::demo::loopback").is_some());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn short_names_resolve() {
        let registry = registry();
        assert_eq!(resolve(&registry, "sum"), Some("veer::demo::sum"));
        assert_eq!(resolve(&registry, "veer::demo::pid"), Some("veer::demo::pid"));
        assert_eq!(resolve(&registry, "nope"), None);
    }

    #[test]
    fn ambiguous_short_name_does_not_resolve() {
        let mut registry = registry();
        registry.register("other::sum", sum);
        assert_eq!(resolve(&registry, "sum"), None);
        assert_eq!(resolve(&registry, "other::sum"), Some("other::sum"));
    }

    #[test]
    fn in_process_behaviour() {
        let registry = registry();
        let call = |name: &str, args: CallArgs| registry.get(name).unwrap().invoke(args);

        assert_eq!(
            call("veer::demo::sum", CallArgs::new().arg(3).arg(7).arg(19)),
            Reply::Return(json!(29.0))
        );
        assert_eq!(
            call("veer::demo::pid", CallArgs::new()),
            Reply::Return(json!(std::process::id()))
        );

        let err = call("veer::demo::fail", CallArgs::new())
            .into_result()
            .unwrap_err();
        assert_eq!(err.original_kind, "ValueError");
        assert_eq!(err.original_message, "bad input");

        let err = call("veer::demo::boom", CallArgs::new().kwarg("message", "kaput"))
            .into_result()
            .unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.original_message, "kaput");
    }
}
